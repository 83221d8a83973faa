//! The `Sign` step: validates the external [`Signer`] against the unsigned transaction,
//! invokes it, and applies EIP-155 replay-protected `v` encoding.
//!
//! The engine never sees private key material — [`crate::chain::Signer`] is the entire
//! surface it depends on.

use std::time::SystemTime;

use alloy_primitives::{Address, B256, Signature, U256};

use super::address::normalize;
use crate::chain::Signer;
use crate::errors::{AdapterError, Result};
use crate::types::{SignedTransaction, UnsignedTransaction};

/// Runs the `Sign` contract for the EIP-1559 adapter: address match, chain match,
/// non-empty payload, then delegates to `signer.sign` and rewrites the recovery byte for
/// EIP-155 replay protection.
pub fn sign(
    unsigned: &UnsignedTransaction,
    signer: &dyn Signer,
    network_id: u64,
) -> Result<SignedTransaction> {
    let signer_address = signer.get_address();
    if normalize(&signer_address) != normalize(&unsigned.from) {
        return Err(AdapterError::InvalidAddress(format!(
            "signer controls {signer_address}, unsigned tx is from {}",
            unsigned.from
        )));
    }

    let unsigned_network_id: u64 = unsigned
        .chain_specific
        .get("network_id")
        .and_then(|v| v.as_u64())
        .unwrap_or(network_id);
    if unsigned_network_id != network_id {
        return Err(AdapterError::ChainMismatch {
            unsigned: unsigned_network_id.to_string(),
            adapter: network_id.to_string(),
        });
    }

    if unsigned.signing_payload.is_empty() {
        return Err(AdapterError::InvalidPayload("signing payload is empty".into()));
    }

    let raw_signature = signer
        .sign(&unsigned.signing_payload, &signer_address)
        .map_err(AdapterError::SigningFailed)?;
    if raw_signature.len() != 65 {
        return Err(AdapterError::SigningFailed(format!(
            "signer returned {} bytes, expected 65 (r || s || v)",
            raw_signature.len()
        )));
    }

    let recovery_v = raw_signature[64];
    let eip155_v = eip155_v(recovery_v, network_id);
    let mut serialized = unsigned.signing_payload.clone();
    serialized.extend_from_slice(&raw_signature[..64]);
    serialized.push(eip155_v);

    let checksummed_signer: Address = signer_address
        .parse()
        .map_err(|e| AdapterError::InvalidAddress(format!("{signer_address}: {e}")))?;

    Ok(SignedTransaction {
        unsigned_tx: unsigned.clone(),
        signature: {
            let mut sig = raw_signature.clone();
            sig[64] = eip155_v;
            sig
        },
        signed_by: checksummed_signer.to_checksum(None),
        tx_hash: unsigned.id.clone(),
        serialized_tx: serialized,
        signed_at: SystemTime::now(),
    })
}

/// Rewrites a `{0,1}` ECDSA recovery id into EIP-155's replay-protected `v`:
/// `v + chain_id * 2 + 35`.
fn eip155_v(recovery_v: u8, chain_id: u64) -> u8 {
    let base = (recovery_v % 2) as u64;
    (base + chain_id * 2 + 35) as u8
}

/// Recovers the signer address from `(signing_payload, signature)` and checks it matches
/// `expected_address`, case-insensitively. Handles both EIP-155 (`v >= 35`) and legacy
/// (`v in {27, 28}`) recovery-id encodings.
pub fn verify_signature(
    signing_payload: &[u8; 32],
    signature: &[u8],
    expected_address: &str,
) -> Result<bool> {
    if signature.len() != 65 {
        return Err(AdapterError::InvalidPayload(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let v = signature[64];
    let parity = if v >= 35 {
        ((v as u64 - 35) % 2) as u8
    } else if v == 27 || v == 28 {
        v - 27
    } else {
        v % 2
    };

    let mut rs = [0u8; 64];
    rs.copy_from_slice(&signature[..64]);
    let sig = Signature::from_bytes_and_parity(&rs, parity == 1);
    let hash = B256::from(*signing_payload);
    let recovered = sig
        .recover_address_from_prehash(&hash)
        .map_err(|e| AdapterError::InvalidPayload(format!("signature recovery failed: {e}")))?;

    Ok(normalize(&recovered.to_string()) == normalize(expected_address))
}

/// Exposed for chain-mismatch detection in tests and callers that need the raw `U256`
/// chain id embedded in `v` without a full verify pass.
pub fn chain_id_from_v(v: u8) -> Option<u64> {
    if v >= 35 {
        Some((v as u64 - 35) / 2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSigner {
        address: String,
        signature: Vec<u8>,
    }

    impl Signer for FakeSigner {
        fn get_address(&self) -> String {
            self.address.clone()
        }
        fn sign(&self, _payload: &[u8], _address: &str) -> std::result::Result<Vec<u8>, String> {
            Ok(self.signature.clone())
        }
    }

    fn unsigned_for(from: &str, network_id: u64) -> UnsignedTransaction {
        use std::collections::HashMap;
        UnsignedTransaction {
            id: "0xdead".into(),
            chain_id: crate::chain::ChainId::new("ethereum"),
            from: from.to_string(),
            to: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into(),
            amount: U256::from(1u64),
            fee: U256::from(1u64),
            nonce: Some(0),
            signing_payload: vec![0xab; 32],
            human_readable: crate::types::HumanReadable {
                summary: "test".into(),
                from: from.to_string(),
                to: "to".into(),
                amount: "1".into(),
                fee: "1".into(),
            },
            chain_specific: {
                let mut m = HashMap::new();
                m.insert("network_id".to_string(), serde_json::json!(network_id));
                m
            },
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn rejects_mismatched_signer_address() {
        let signer = FakeSigner {
            address: "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            signature: vec![0u8; 65],
        };
        let unsigned = unsigned_for("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB", 1);
        let result = sign(&unsigned, &signer, 1);
        assert!(matches!(result, Err(AdapterError::InvalidAddress(_))));
    }

    #[test]
    fn rejects_chain_mismatch() {
        let address = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let signer = FakeSigner {
            address: address.into(),
            signature: vec![0u8; 65],
        };
        let unsigned = unsigned_for(address, 5);
        let result = sign(&unsigned, &signer, 1);
        assert!(matches!(result, Err(AdapterError::ChainMismatch { .. })));
    }

    #[test]
    fn eip155_v_byte_differs_by_chain_but_not_by_recovery_parity_alone() {
        assert_eq!(eip155_v(0, 1), 37);
        assert_eq!(eip155_v(1, 1), 38);
        assert_eq!(eip155_v(0, 5), 45);
        assert_eq!(eip155_v(1, 5), 46);
    }

    #[test]
    fn chain_id_from_v_recovers_eip155_chain() {
        assert_eq!(chain_id_from_v(37), Some(1));
        assert_eq!(chain_id_from_v(45), Some(5));
        assert_eq!(chain_id_from_v(27), None);
    }
}
