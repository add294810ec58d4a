//! Leverage common functionality across the extension block primitives.

/// Converts bytes to a hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Converts a hexadecimal string to bytes.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Converts a hexadecimal string to bytes, stripping whitespace and/or a `0x` prefix. Commonly used
/// in testing to encode external test vectors without modification.
pub fn from_hex_formatted(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.replace(['\t', '\n', '\r', ' '], "");
    let res = hex.strip_prefix("0x").unwrap_or(&hex);
    from_hex(res)
}

/// Returns the number of bytes required to hold `bits` bits.
#[inline]
pub const fn bytes_for_bits(bits: u64) -> u64 {
    bits.div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        // Test case 0: empty bytes
        let b = &[];
        let h = hex(b);
        assert_eq!(h, "");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Test case 1: single byte
        let b = &[0x01];
        let h = hex(b);
        assert_eq!(h, "01");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Test case 2: multiple bytes
        let b = &[0x01, 0x02, 0xff];
        let h = hex(b);
        assert_eq!(h, "0102ff");
        assert_eq!(from_hex(&h).unwrap(), b.to_vec());

        // Test case 3: odd number of characters
        assert!(from_hex("0102030").is_none());

        // Test case 4: invalid hexadecimal character
        assert!(from_hex("01g3").is_none());

        // Test case 5: non-ascii input must not panic on a char boundary
        assert!(from_hex("éé").is_none());
    }

    #[test]
    fn test_from_hex_formatted() {
        let h = "0x01 02\n03\t04";
        assert_eq!(from_hex_formatted(h).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(from_hex_formatted("").unwrap(), Vec::<u8>::new());
        assert!(from_hex_formatted("0x0").is_none());
    }

    #[test]
    fn test_bytes_for_bits() {
        assert_eq!(bytes_for_bits(0), 0);
        assert_eq!(bytes_for_bits(1), 1);
        assert_eq!(bytes_for_bits(8), 1);
        assert_eq!(bytes_for_bits(9), 2);
        assert_eq!(bytes_for_bits(10), 2);
    }
}
