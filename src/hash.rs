//! Hash primitives used by scripts, addresses and transactions

use bitcoin_hashes::{sha256d as bh_sha256d, Hash as BitcoinHash};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::types::{Hash, Hash160};

pub fn sha256(data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// SHA256(SHA256(x)), the transaction and block hash function
pub fn sha256d(data: &[u8]) -> Hash {
    bh_sha256d::Hash::hash(data).into_inner()
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha256_hash = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha256_hash));
    out
}

/// Convert between hash order and display order
pub fn reversed(hash: &Hash) -> Hash {
    let mut out = *hash;
    out.reverse();
    out
}

/// Hex string of a hash in display order
pub fn to_display_hex(hash: &Hash) -> String {
    hex::encode(reversed(hash))
}

/// Parse a display-order hex string into a hash in hash order
pub fn from_display_hex(s: &str) -> crate::Result<Hash> {
    let bytes = hex::decode(s).map_err(|e| crate::TxError::MalformedInput(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(crate::TxError::MalformedInput(format!(
            "hash must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    hash.reverse();
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256d_empty() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_hash160_redeem_script() {
        assert_eq!(
            hex::encode(hash160(&[22, 33, 44, 55, 66, 77])),
            "729efae5d22b26dc48f9544fc8f03e21d3e2c7c5"
        );
    }

    #[test]
    fn test_display_hex_roundtrip() {
        let display = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
        let hash = from_display_hex(display).unwrap();
        assert_eq!(hash[0], 0x3b);
        assert_eq!(to_display_hex(&hash), display);
    }

    #[test]
    fn test_from_display_hex_wrong_length() {
        assert!(from_display_hex("abcd").is_err());
        assert!(from_display_hex("zz").is_err());
    }
}
