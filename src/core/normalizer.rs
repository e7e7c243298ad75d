//! Payload normalization
//!
//! Barcode symbols carry raw bytes. The scanner works with text, so every
//! payload goes through [`normalize`] before it reaches the catalog or the
//! scan state machine.

/// Convert raw payload bytes to canonical text.
///
/// UTF-8 is tried first. If the bytes are not valid UTF-8 the payload is
/// decoded as ISO-8859-1, which maps every byte to the code point of the
/// same value, so distinct byte strings always give distinct text. This
/// function never fails.
pub fn normalize(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_single_byte(bytes),
    }
}

fn decode_single_byte(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(b""), "");
    }

    #[test]
    fn test_utf8_round_trip() {
        assert_eq!(normalize(b"12345678"), "12345678");
        let text = "Crème brûlée – 7501055301323";
        assert_eq!(normalize(text.as_bytes()), text);
    }

    #[test]
    fn test_invalid_utf8_falls_back() {
        let result = normalize(b"\xff\xfe\x00\x00");
        assert_eq!(result.chars().count(), 4);
        assert_eq!(result, "\u{ff}\u{fe}\u{0}\u{0}");
    }

    #[test]
    fn test_c1_bytes_keep_their_code_points() {
        let result = normalize(b"AB\x85\xe9");
        assert_eq!(result, "AB\u{85}\u{e9}");
    }

    #[test]
    fn test_distinct_invalid_payloads_stay_distinct() {
        assert_ne!(normalize(b"\xff\x80"), normalize(b"\xff\x81"));
        assert_ne!(normalize(b"\x9f\xff"), normalize(b"\x90\xff"));
    }

    #[test]
    fn test_every_byte_value_is_handled() {
        let all: Vec<u8> = (0..=255u8).collect();
        let result = normalize(&all);
        assert_eq!(result.chars().count(), 256);
    }
}
