/// Number of hex digits in an address, excluding the optional `0x` prefix.
pub const ADDRESS_HEX_LEN: usize = 40;

/// Returns `true` if `address` is a 20-byte hex address.
///
/// Accepts an optional `0x` or `0X` prefix followed by exactly
/// [`ADDRESS_HEX_LEN`] hex digits of either case. No checksum is enforced.
///
/// ```
/// use provisioner_core::is_hex_address;
///
/// assert!(is_hex_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
/// assert!(!is_hex_address("0x123"));
/// ```
pub fn is_hex_address(address: &str) -> bool {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);

    digits.len() == ADDRESS_HEX_LEN && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_prefixed_and_bare_addresses() {
        assert!(is_hex_address("0x0000000000000000000000000000000000000000"));
        assert!(is_hex_address("0XABCDEFabcdef0123456789abcdefABCDEF012345"));
        assert!(is_hex_address("abcdefabcdef0123456789abcdefabcdef012345"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_hex_address(""));
        assert!(!is_hex_address("0x"));
        assert!(!is_hex_address("0x123"));
        // 41 digits
        assert!(!is_hex_address("0x00000000000000000000000000000000000000001"));
        // non-hex digit
        assert!(!is_hex_address("0xg000000000000000000000000000000000000000"));
        // double prefix
        assert!(!is_hex_address("0x0x00000000000000000000000000000000000000"));
        assert!(!is_hex_address(" 0x0000000000000000000000000000000000000000"));
    }
}
