//! Configuration module for the barcode scanner
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\barcode_scanner\config.toml
//! - Linux: ~/.config/barcode_scanner/config.toml
//! - macOS: ~/Library/Application Support/barcode_scanner/config.toml

use crate::core::catalog::DEFAULT_UNASSIGNED_LABEL;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config directory
const APP_NAME: &str = "barcode_scanner";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Local file names checked before the standard location
const LOCAL_CONFIG_FILES: &[&str] = &["./scanner.toml", "./config.toml"];

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// With `reset`, an existing file is overwritten with the defaults.
/// Returns the path to the config file.
pub fn init_config(reset: bool) -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if reset || !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Open the configuration file in the default application.
pub fn open_config_in_editor() -> Result<PathBuf, ConfigError> {
    let config_path = init_config(false)?;
    open::that(&config_path)
        .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;
    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source settings
    pub capture: CaptureConfig,

    /// Verification timing and display window
    pub scanning: ScanningConfig,

    /// Product catalog
    pub catalog: CatalogConfig,

    /// Scan log storage
    pub storage: StorageConfig,

    /// Operator feedback
    pub feedback: FeedbackConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory of PNG/JPEG frames replayed as the capture device
    pub frames_dir: PathBuf,

    /// Minimum time between frames in milliseconds (0 = as fast as possible)
    pub frame_interval_ms: u64,

    /// Restart from the first frame when the sequence ends
    pub loop_playback: bool,
}

/// Scan verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Continuous visibility required before a scan is verified
    pub stability_seconds: f64,

    /// Time after a verification during which the same code is ignored
    pub cooldown_seconds: f64,

    /// Number of distinct items shown in the history sidebar
    pub history_window: usize,

    /// Pause between loop iterations in milliseconds
    pub loop_idle_ms: u64,
}

impl ScanningConfig {
    /// Stability window as a `Duration`
    pub fn stability(&self) -> Result<Duration, ConfigError> {
        seconds_to_duration("scanning.stability_seconds", self.stability_seconds)
    }

    /// Cooldown window as a `Duration`
    pub fn cooldown(&self) -> Result<Duration, ConfigError> {
        seconds_to_duration("scanning.cooldown_seconds", self.cooldown_seconds)
    }
}

/// Positive number of seconds that fits in a `Duration`
fn seconds_to_duration(key: &str, value: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be a positive number of seconds, got {}", value),
        )),
    }
}

/// Product catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Label for codes that are not in the catalog
    pub unassigned_label: String,

    /// Extra products (code -> label), merged over the built-in table
    pub products: BTreeMap<String, String>,
}

/// Scan log storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the scan log database
    pub log_path: PathBuf,
}

/// Operator feedback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Ring the terminal bell on each verified scan
    pub beep: bool,

    /// Write the last annotated frame here on shutdown
    pub snapshot_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("./frames"),
            frame_interval_ms: 33,
            loop_playback: false,
        }
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            stability_seconds: crate::core::scan_state::STABILITY_SECONDS,
            cooldown_seconds: crate::core::scan_state::COOLDOWN_SECONDS,
            history_window: 8,
            loop_idle_ms: 10,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            unassigned_label: DEFAULT_UNASSIGNED_LABEL.to_string(),
            products: BTreeMap::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("./scan_logs.db"),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            beep: true,
            snapshot_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./barcode_scanner.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./scanner.toml
    /// 2. ./config.toml
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in LOCAL_CONFIG_FILES {
            let path = Path::new(path);
            if path.exists() {
                return Self::load(path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        for path in LOCAL_CONFIG_FILES {
            let path = PathBuf::from(path);
            if path.exists() {
                return path;
            }
        }

        get_config_path().unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILES[0]))
    }

    /// Reject values the scanner cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scanning.stability()?;
        self.scanning.cooldown()?;
        if self.scanning.history_window == 0 {
            return Err(ConfigError::InvalidValue(
                "scanning.history_window".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
    /// Failed to open config file in editor
    OpenError(PathBuf, String),
    /// A setting has a value the scanner cannot use
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::OpenError(path, err) => {
                write!(
                    f,
                    "Failed to open config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::InvalidValue(key, err) => {
                write!(f, "Invalid value for '{}': {}", key, err)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::core::error::ScanError {
    fn from(err: ConfigError) -> Self {
        crate::core::error::ScanError::Config(err.to_string())
    }
}
