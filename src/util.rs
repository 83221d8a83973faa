//! Small shared helpers: hex parsing for raw JSON-RPC results.

use alloy_primitives::U256;
use serde_json::Value;

use crate::errors::AdapterError;

/// Parses a `"0x..."`-prefixed hex quantity (as returned by every Ethereum JSON-RPC
/// integer field) into a `u64`.
pub fn parse_hex_u64(value: &Value) -> crate::errors::Result<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| AdapterError::RpcParse(format!("expected hex string, got {value}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| AdapterError::RpcParse(format!("invalid hex u64 {s}: {e}")))
}

/// Parses a `"0x..."`-prefixed hex quantity into a [`U256`].
pub fn parse_hex_u256(value: &Value) -> crate::errors::Result<U256> {
    let s = value
        .as_str()
        .ok_or_else(|| AdapterError::RpcParse(format!("expected hex string, got {value}")))?;
    U256::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16)
        .map_err(|e| AdapterError::RpcParse(format!("invalid hex u256 {s}: {e}")))
}

/// Encodes a `u64` as a `"0x..."` hex quantity for outgoing RPC params.
pub fn to_hex_u64(value: u64) -> String {
    format!("0x{value:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hex_u64() {
        assert_eq!(parse_hex_u64(&json!("0x5")).unwrap(), 5);
        assert_eq!(parse_hex_u64(&json!("0x0")).unwrap(), 0);
    }

    #[test]
    fn parses_hex_u256() {
        assert_eq!(parse_hex_u256(&json!("0x3b9aca00")).unwrap(), U256::from(1_000_000_000u64));
    }

    #[test]
    fn rejects_non_string() {
        assert!(parse_hex_u64(&json!(5)).is_err());
    }

    #[test]
    fn round_trips_through_to_hex() {
        assert_eq!(to_hex_u64(5), "0x5");
        assert_eq!(parse_hex_u64(&json!(to_hex_u64(12345))).unwrap(), 12345);
    }
}
