//! Operator exit requests
//!
//! Reading stdin blocks, so a background thread forwards each line over a
//! channel and the frame loop polls the channel without waiting.

use crate::core::session::ExitSignal;
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use log::{debug, warn};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// True for the line that asks the scanner to quit
pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

/// Exit when the operator types `q` or the shutdown flag is raised
pub struct KeyboardExit {
    lines: Receiver<String>,
    shutdown: Arc<AtomicBool>,
}

impl KeyboardExit {
    /// Start forwarding stdin lines
    pub fn spawn(shutdown: Arc<AtomicBool>) -> Self {
        let (tx, rx) = unbounded();
        let spawned = thread::Builder::new()
            .name("stdin-exit".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                debug!("stdin closed");
            });
        if let Err(e) = spawned {
            warn!("Keyboard exit unavailable ({}); use Ctrl+C to quit", e);
        }
        Self::from_channel(rx, shutdown)
    }

    pub fn from_channel(lines: Receiver<String>, shutdown: Arc<AtomicBool>) -> Self {
        Self { lines, shutdown }
    }
}

impl ExitSignal for KeyboardExit {
    fn exit_requested(&mut self) -> bool {
        if self.shutdown.load(Ordering::SeqCst) {
            return true;
        }
        loop {
            match self.lines.try_recv() {
                Ok(line) if is_quit_command(&line) => return true,
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quit_command() {
        assert!(is_quit_command("q"));
        assert!(is_quit_command(" Q \r"));
        assert!(!is_quit_command("quit"));
        assert!(!is_quit_command(""));
    }

    #[test]
    fn test_quit_line_requests_exit() {
        let (tx, rx) = unbounded();
        let mut exit = KeyboardExit::from_channel(rx, Arc::new(AtomicBool::new(false)));

        assert!(!exit.exit_requested());
        tx.send("hello".to_string()).unwrap();
        assert!(!exit.exit_requested());
        tx.send("q".to_string()).unwrap();
        assert!(exit.exit_requested());
    }

    #[test]
    fn test_shutdown_flag_requests_exit() {
        let (_tx, rx) = unbounded::<String>();
        let flag = Arc::new(AtomicBool::new(false));
        let mut exit = KeyboardExit::from_channel(rx, Arc::clone(&flag));
        assert!(!exit.exit_requested());
        flag.store(true, Ordering::SeqCst);
        assert!(exit.exit_requested());
    }
}
