use crate::core::error::InputError;

/// Parse a hex string into bytes.
/// Whitespace anywhere in the string is ignored and digits may be in either case:
/// - "00A40400"
/// - "00 a4 04 00"
pub fn parse_hex(hex_str: &str) -> Result<Vec<u8>, InputError> {
    let cleaned = clean_hex_string(hex_str);

    if cleaned.len() % 2 != 0 {
        return Err(InputError::InvalidHex(format!(
            "odd number of hex digits in '{}'",
            hex_str.trim()
        )));
    }

    hex::decode(&cleaned).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, .. } => {
            InputError::InvalidHex(format!("invalid hex character '{c}'"))
        }
        other => InputError::InvalidHex(other.to_string()),
    })
}

/// Remove all whitespace from a hex string
fn clean_hex_string(hex_str: &str) -> String {
    hex_str.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Format bytes as a hex string
pub fn format_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Format bytes as a hex string with spaces
pub fn format_hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_various_formats() {
        assert_eq!(parse_hex("00A40400").unwrap(), vec![0x00, 0xA4, 0x04, 0x00]);
        assert_eq!(
            parse_hex("00 A4 04 00").unwrap(),
            vec![0x00, 0xA4, 0x04, 0x00]
        );
        assert_eq!(
            parse_hex("\t00A4\n04 00\r").unwrap(),
            vec![0x00, 0xA4, 0x04, 0x00]
        );
        assert_eq!(parse_hex("0 0A 4").unwrap(), vec![0x00, 0xA4]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_hex_case_insensitive() {
        assert_eq!(parse_hex("abcdef").unwrap(), vec![0xAB, 0xCD, 0xEF]);
        assert_eq!(parse_hex("ABCDEF").unwrap(), vec![0xAB, 0xCD, 0xEF]);
        assert_eq!(parse_hex("aBcDeF").unwrap(), vec![0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_parse_hex_invalid() {
        assert!(matches!(parse_hex("0102030"), Err(InputError::InvalidHex(_))));
        assert!(matches!(parse_hex("0102G30A"), Err(InputError::InvalidHex(_))));
        assert!(matches!(parse_hex("ZZ"), Err(InputError::InvalidHex(_))));
        // Separators other than whitespace are not accepted
        assert!(parse_hex("01:02").is_err());
        assert!(parse_hex("0x01").is_err());
    }

    #[test]
    fn test_parse_hex_error_message() {
        let err = parse_hex("0G").unwrap_err();
        assert_eq!(err.to_string(), "invalid hex: invalid hex character 'G'");

        let err = parse_hex("123").unwrap_err();
        assert!(err.to_string().contains("odd number of hex digits"));
    }

    #[test]
    fn test_format_functions() {
        let bytes = vec![0x01, 0x02, 0x03, 0x0A];
        assert_eq!(format_hex(&bytes), "0102030A");
        assert_eq!(format_hex_spaced(&bytes), "01 02 03 0A");

        assert_eq!(format_hex(&[]), "");
        assert_eq!(format_hex_spaced(&[]), "");

        assert_eq!(format_hex_spaced(&[0xFF]), "FF");
    }

    #[test]
    fn test_spaced_round_trip() {
        let input = "00 a4 0400 0A";
        let bytes = parse_hex(input).unwrap();
        assert_eq!(format_hex_spaced(&bytes), "00 A4 04 00 0A");
        assert_eq!(parse_hex(&format_hex_spaced(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_clean_hex_string() {
        assert_eq!(clean_hex_string("01 02 03"), "010203");
        assert_eq!(clean_hex_string("\t01\n02\r"), "0102");
        assert_eq!(clean_hex_string("  ab  "), "ab");
    }
}
