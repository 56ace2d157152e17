//! Scripts: raw opcode streams, template classification and push chunks
//!
//! Classification recognises exactly three scriptPubKey templates:
//! - P2SH:  `OP_HASH160 <20> <hash> OP_EQUAL`
//! - P2PKH: `OP_DUP OP_HASH160 <20> <hash> OP_EQUALVERIFY OP_CHECKSIG`
//! - P2PK:  `<33|65> <pubkey> OP_CHECKSIG`
//!
//! Anything else, including a P2PK template whose key is not a valid curve
//! point, is `Unknown`. Classification never fails.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::{Address, Network};
use crate::constants::*;
use crate::error::{Result, TxError};
use crate::keys::is_valid_public_key;
use crate::types::{ByteString, Hash160};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptKind {
    Unknown,
    P2PK,
    P2PKH,
    P2SH,
}

/// Immutable script bytes with their classification computed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    bytes: ByteString,
    kind: ScriptKind,
    address: Option<Address>,
}

impl Script {
    /// Classify `bytes` as a scriptPubKey, deriving mainnet addresses
    pub fn new(bytes: ByteString) -> Self {
        Self::with_network(bytes, Network::Mainnet)
    }

    pub fn with_network(bytes: ByteString, network: Network) -> Self {
        let (kind, address) = classify(&bytes, network);
        Script { bytes, kind, address }
    }

    /// Raw bytes with no classification, for scriptSigs
    pub fn unclassified(bytes: ByteString) -> Self {
        Script {
            bytes,
            kind: ScriptKind::Unknown,
            address: None,
        }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| TxError::MalformedInput(e.to_string()))?;
        Ok(Self::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> ByteString {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Public key embedded in a P2PK template
    pub fn public_key(&self) -> Option<&[u8]> {
        match self.kind {
            ScriptKind::P2PK => Some(&self.bytes[1..self.bytes.len() - 1]),
            _ => None,
        }
    }

    /// HASH160 committed to by a P2PKH or P2SH template
    pub fn committed_hash(&self) -> Option<Hash160> {
        let range = match self.kind {
            ScriptKind::P2PKH => 3..23,
            ScriptKind::P2SH => 2..22,
            _ => return None,
        };
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.bytes[range]);
        Some(hash)
    }

    pub fn chunks(&self) -> Result<Vec<ScriptChunk>> {
        decode_chunks(&self.bytes)
    }

    pub fn disassemble(&self) -> crate::disasm::Disassembly {
        crate::disasm::disassemble_script(self)
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Classify script bytes against the three templates, in P2SH, P2PKH, P2PK order
pub fn classify(bytes: &[u8], network: Network) -> (ScriptKind, Option<Address>) {
    if bytes.len() == P2SH_SCRIPT_SIZE
        && bytes[0] == OP_HASH160
        && bytes[1] == HASH160_SIZE as u8
        && bytes[22] == OP_EQUAL
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[2..22]);
        return (ScriptKind::P2SH, Some(Address::from_hash(hash, false, network)));
    }

    if bytes.len() == P2PKH_SCRIPT_SIZE
        && bytes[0] == OP_DUP
        && bytes[1] == OP_HASH160
        && bytes[2] == HASH160_SIZE as u8
        && bytes[23] == OP_EQUALVERIFY
        && bytes[24] == OP_CHECKSIG
    {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[3..23]);
        return (ScriptKind::P2PKH, Some(Address::from_hash(hash, true, network)));
    }

    if let Some((&last, rest)) = bytes.split_last() {
        if last == OP_CHECKSIG && !rest.is_empty() {
            let key_len = rest[0] as usize;
            let key = &rest[1..];
            if (key_len == COMPRESSED_PUBKEY_SIZE || key_len == UNCOMPRESSED_PUBKEY_SIZE)
                && key.len() == key_len
                && is_valid_public_key(key)
            {
                return (ScriptKind::P2PK, Some(Address::from_public_key(key, network)));
            }
        }
    }

    (ScriptKind::Unknown, None)
}

/// One element of a script: an opcode, or a push opcode with its data.
///
/// `data` is set only for the data-carrying push opcodes (0x01..=0x4b and
/// OP_PUSHDATA1/2/4, possibly with zero bytes). OP_0, OP_1NEGATE and
/// OP_1..OP_16 decode as bare opcodes with no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk {
    pub op: u8,
    pub data: Option<ByteString>,
}

impl ScriptChunk {
    /// True for data-carrying pushes; false for OP_0 and the small-integer opcodes
    pub fn is_push(&self) -> bool {
        self.data.is_some()
    }
}

/// Split script bytes into chunks; truncated pushes are `MalformedInput`
pub fn decode_chunks(bytes: &[u8]) -> Result<Vec<ScriptChunk>> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (chunk, next) = next_chunk(bytes, pos)?;
        chunks.push(chunk);
        pos = next;
    }
    Ok(chunks)
}

/// Decode the chunk at `pos`, returning it and the position after it
pub(crate) fn next_chunk(bytes: &[u8], pos: usize) -> Result<(ScriptChunk, usize)> {
    let op = bytes[pos];
    let (prefix, len) = match op {
        0x01..=OP_PUSHBYTES_75 => (1, op as usize),
        OP_PUSHDATA1 => (2, read_push_len(bytes, pos + 1, 1)?),
        OP_PUSHDATA2 => (3, read_push_len(bytes, pos + 1, 2)?),
        OP_PUSHDATA4 => (5, read_push_len(bytes, pos + 1, 4)?),
        _ => return Ok((ScriptChunk { op, data: None }, pos + 1)),
    };
    let start = pos + prefix;
    if len > bytes.len() - start {
        return Err(TxError::MalformedInput(format!(
            "push of {} bytes at offset {} runs past end of script",
            len, pos
        )));
    }
    let data = bytes[start..start + len].to_vec();
    Ok((ScriptChunk { op, data: Some(data) }, start + len))
}

fn read_push_len(bytes: &[u8], at: usize, width: usize) -> Result<usize> {
    if at + width > bytes.len() {
        return Err(TxError::MalformedInput(format!(
            "truncated push length at offset {}",
            at - 1
        )));
    }
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&bytes[at..at + width]);
    Ok(u32::from_le_bytes(buf) as usize)
}

/// Append a minimal push of `data` to `script`
pub fn push_data(script: &mut ByteString, data: &[u8]) {
    let len = data.len();
    if len <= OP_PUSHBYTES_75 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Size in bytes of a minimal push of `len` bytes
pub fn push_size(len: usize) -> usize {
    let prefix = if len <= OP_PUSHBYTES_75 as usize {
        1
    } else if len <= 0xff {
        2
    } else if len <= 0xffff {
        3
    } else {
        5
    };
    prefix + len
}
