//! Address format validation for the EIP-1559 account-based adapter: `0x` + 40 hex
//! digits, with EIP-55 checksum casing accepted case-insensitively but required to
//! round-trip if mixed case is used.

use alloy_primitives::Address;

use crate::errors::AdapterError;

/// Validates `s` as an EIP-1559 address and returns the parsed [`Address`].
///
/// - All-lowercase and all-uppercase (ignoring the `0x` prefix) are accepted unchecked.
/// - Mixed-case input must be exactly the EIP-55 checksummed rendering of the address;
///   otherwise it is rejected rather than silently corrected, since a wrong checksum is
///   most often a transcription error.
pub fn validate_address(s: &str) -> crate::errors::Result<Address> {
    if s.is_empty() {
        return Err(AdapterError::InvalidAddress("address is empty".into()));
    }
    let hex_part = s.strip_prefix("0x").unwrap_or(s);
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AdapterError::InvalidAddress(format!(
            "{s} is not a 20-byte hex address"
        )));
    }

    let address: Address = s
        .parse()
        .map_err(|e| AdapterError::InvalidAddress(format!("{s}: {e}")))?;

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(address);
    }

    let checksummed = address.to_checksum(None);
    if checksummed == s {
        Ok(address)
    } else {
        Err(AdapterError::InvalidAddress(format!(
            "{s} does not match its EIP-55 checksum {checksummed}"
        )))
    }
}

/// Normalizes an address for equality comparison: strips `0x` and lowercases.
pub fn normalize(address: &str) -> String {
    address.strip_prefix("0x").unwrap_or(address).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED_CASE: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0";
    const LOWER: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0";

    #[test]
    fn accepts_all_lowercase() {
        assert!(validate_address(LOWER).is_ok());
    }

    #[test]
    fn accepts_all_uppercase() {
        let upper = format!("0x{}", &LOWER[2..].to_ascii_uppercase());
        assert!(validate_address(&upper).is_ok());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate_address("0x1234").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(validate_address("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn rejects_wrong_mixed_case_checksum() {
        // Flip the case of the mixed-case example so it no longer matches its checksum.
        let mangled: String = MIXED_CASE
            .chars()
            .map(|c| {
                if c.is_ascii_alphabetic() {
                    if c.is_ascii_uppercase() {
                        c.to_ascii_lowercase()
                    } else {
                        c.to_ascii_uppercase()
                    }
                } else {
                    c
                }
            })
            .collect();
        assert!(validate_address(&mangled).is_err());
    }

    #[test]
    fn normalize_strips_prefix_and_lowercases() {
        assert_eq!(normalize(MIXED_CASE), normalize(LOWER));
    }
}
