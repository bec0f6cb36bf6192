//! Front panel text carried by `FL` responses

use crate::error::{ProtocolError, Result};

/// Decode the 30 hex digit `FL` parameter into the displayed text.
///
/// The first byte holds display flags and is skipped; every following pair
/// of hex digits is one ASCII character.
pub fn decode_display_information(parameter: &str) -> Result<String> {
    if parameter.len() < 2 || parameter.len() % 2 != 0 || !parameter.is_ascii() {
        return Err(ProtocolError::UnexpectedValue {
            field: "display information",
            value: parameter.to_string(),
        });
    }

    parameter[2..]
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).unwrap_or_default();
            u8::from_str_radix(digits, 16)
                .map(char::from)
                .map_err(|_| ProtocolError::InvalidNumber(digits.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_skips_flag_byte() {
        let text = decode_display_information("02202048444D492031202020202020").unwrap();
        assert_eq!(text, "  HDMI 1      ");
        assert_eq!(text.trim(), "HDMI 1");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_display_information("0").is_err());
        assert!(decode_display_information("02ZZ").is_err());
        assert!(decode_display_information("020").is_err());
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(decode_display_information("00").unwrap(), "");
    }
}
