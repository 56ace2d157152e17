//! Block container: an 80-byte header followed by its transactions.
//!
//! Only enough structure to hand `verify_input` the transactions a block
//! carries; header fields are not interpreted.

use crate::address::Network;
use crate::codec::Reader;
use crate::constants::BLOCK_HEADER_SIZE;
use crate::error::{Result, TxError};
use crate::hash::{sha256d, to_display_hex};
use crate::transaction::{PreviousOutputs, Transaction};
use crate::types::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: [u8; BLOCK_HEADER_SIZE],
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_network(bytes, Network::Mainnet)
    }

    pub fn from_bytes_with_network(bytes: &[u8], network: Network) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let header = reader.read_array::<BLOCK_HEADER_SIZE>()?;
        let count = reader.read_count()?;
        let mut transactions = Vec::with_capacity(count);
        for _ in 0..count {
            transactions.push(Transaction::read_from(&mut reader, network)?);
        }
        if !reader.is_empty() {
            return Err(TxError::MalformedInput(format!(
                "{} trailing bytes after block",
                reader.remaining()
            )));
        }
        Ok(Block { header, transactions })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| TxError::MalformedInput(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Double SHA-256 of the header, in hash order
    pub fn hash(&self) -> Hash {
        sha256d(&self.header)
    }

    pub fn hash_hex(&self) -> String {
        to_display_hex(&self.hash())
    }
}

impl PreviousOutputs for Block {
    fn find_transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.transactions.as_slice().find_transaction(hash)
    }
}
