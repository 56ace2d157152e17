//! Core value types shared across modules

use serde::{Deserialize, Serialize};

/// Hash type: 256-bit hash, stored in hash (internal) byte order
pub type Hash = [u8; 32];

/// HASH160 digest: RIPEMD-160(SHA-256(x))
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// The null outpoint referenced by coinbase inputs
    pub fn is_null(&self) -> bool {
        self.hash == [0u8; 32] && self.index == crate::constants::COINBASE_OUT_INDEX
    }
}
