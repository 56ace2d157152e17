//! Protocol constants for scripts, signatures and transactions

/// Push empty byte vector
pub const OP_0: u8 = 0x00;
/// Maximum opcode value that pushes its own value as a length
pub const OP_PUSHBYTES_75: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// The only signature hash type this crate signs or accepts
pub const SIGHASH_ALL: u8 = 0x01;

/// DER SEQUENCE tag
pub const DER_SEQUENCE: u8 = 0x30;
/// DER INTEGER tag
pub const DER_INTEGER: u8 = 0x02;

/// Size of a HASH160 digest
pub const HASH160_SIZE: usize = 20;
/// Compressed secp256k1 public key length
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;
/// Uncompressed secp256k1 public key length
pub const UNCOMPRESSED_PUBKEY_SIZE: usize = 65;

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub const P2PKH_SCRIPT_SIZE: usize = 25;
/// `OP_HASH160 <20> OP_EQUAL`
pub const P2SH_SCRIPT_SIZE: usize = 23;

/// Upper bound of a DER signature plus its sighash byte
pub const MAX_SIGNATURE_SIZE: usize = 73;

/// Segwit marker byte that replaces the input count
pub const WITNESS_MARKER: u8 = 0x00;
/// Segwit flag byte following the marker
pub const WITNESS_FLAG: u8 = 0x01;

/// Sequence number for final inputs
pub const SEQUENCE_FINAL: u32 = 0xffffffff;
/// Default transaction version used by the builder
pub const DEFAULT_TX_VERSION: i32 = 1;

/// Previous output index used by coinbase inputs
pub const COINBASE_OUT_INDEX: u32 = 0xffffffff;

/// Serialized block header size
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Nested scripts deeper than this are rendered as raw data
pub const MAX_DISASSEMBLY_DEPTH: usize = 4;

/// Base58Check version bytes
pub const MAINNET_PUBKEY_HASH_VERSION: u8 = 0x00;
pub const MAINNET_SCRIPT_HASH_VERSION: u8 = 0x05;
pub const TESTNET_PUBKEY_HASH_VERSION: u8 = 0x6f;
pub const TESTNET_SCRIPT_HASH_VERSION: u8 = 0xc4;
