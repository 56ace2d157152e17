//! # tx-script
//!
//! Script and transaction handling for Bitcoin-protocol clients: template
//! classification, DER signatures, scriptSig construction and verification,
//! the transaction wire format with legacy signature hashing, and a signing
//! transaction builder.
//!
//! ## Scope
//!
//! Three scriptPubKey templates are understood: pay-to-pubkey,
//! pay-to-pubkey-hash and pay-to-script-hash. There is no general script
//! interpreter. Segwit transactions parse and round-trip, but witness data is
//! neither hashed nor authenticated.
//!
//! ## Design Principles
//!
//! 1. **Byte exactness**: parsed transactions re-serialize to the bytes they came from
//! 2. **Strict decoding**: malformed signatures and scripts are errors, never guesses
//! 3. **Exact Version Pinning**: cryptographic dependencies pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use tx_script::{build_script_pubkey, build_script_sig, verify, KeyPair, Network};
//!
//! let key = KeyPair::from_secret_bytes(&[7u8; 32], true).unwrap();
//! let script_pubkey = build_script_pubkey(&key.address(Network::Mainnet));
//! let digest = [1u8; 32];
//! let script_sig = build_script_sig(&script_pubkey, &digest, &key).unwrap();
//! assert!(verify(&script_sig, &script_pubkey, &digest).unwrap());
//! ```

pub mod address;
pub mod block;
pub mod builder;
pub mod codec;
pub mod config;
pub mod constants;
pub mod disasm;
pub mod error;
pub mod hash;
pub mod keys;
pub mod script;
pub mod signature;
pub mod transaction;
pub mod types;
pub mod verify;

// Re-export commonly used types
pub use address::{Address, AddressKind, Network};
pub use block::Block;
pub use builder::{plan_change, ChangePlan, PreviousOutput, TxBuilder};
pub use config::ChainParams;
pub use disasm::{disassemble, Disassembly, Token};
pub use error::{Result, TxError};
pub use keys::KeyPair;
pub use script::{classify, Script, ScriptChunk, ScriptKind};
pub use signature::Signature;
pub use transaction::{PreviousOutputs, Transaction, TxInput, TxOutput};
pub use types::*;
pub use verify::{build_script_pubkey, build_script_sig, verify};
