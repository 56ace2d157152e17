//! Best-effort script disassembly for debugging output.
//!
//! Not authoritative: a malformed stream stops the scan and the partial
//! token list is returned together with a description of what went wrong.

use std::fmt;

use crate::address::{Address, Network};
use crate::constants::{MAX_DISASSEMBLY_DEPTH, OP_PUSHDATA4};
use crate::keys::is_valid_public_key;
use crate::script::{classify, next_chunk, Script};
use crate::signature::Signature;

/// Opcode to mnemonic, excluding the direct pushes 0x01-0x4b
static OPCODES: &[(u8, &str)] = &[
    // constants
    (0x00, "OP_0"),
    (0x4c, "OP_PUSHDATA1"),
    (0x4d, "OP_PUSHDATA2"),
    (0x4e, "OP_PUSHDATA4"),
    (0x4f, "OP_1NEGATE"),
    (0x50, "OP_RESERVED"),
    (0x51, "OP_1"),
    (0x52, "OP_2"),
    (0x53, "OP_3"),
    (0x54, "OP_4"),
    (0x55, "OP_5"),
    (0x56, "OP_6"),
    (0x57, "OP_7"),
    (0x58, "OP_8"),
    (0x59, "OP_9"),
    (0x5a, "OP_10"),
    (0x5b, "OP_11"),
    (0x5c, "OP_12"),
    (0x5d, "OP_13"),
    (0x5e, "OP_14"),
    (0x5f, "OP_15"),
    (0x60, "OP_16"),
    // flow control
    (0x61, "OP_NOP"),
    (0x62, "OP_VER"),
    (0x63, "OP_IF"),
    (0x64, "OP_NOTIF"),
    (0x65, "OP_VERIF"),
    (0x66, "OP_VERNOTIF"),
    (0x67, "OP_ELSE"),
    (0x68, "OP_ENDIF"),
    (0x69, "OP_VERIFY"),
    (0x6a, "OP_RETURN"),
    // stack
    (0x6b, "OP_TOALTSTACK"),
    (0x6c, "OP_FROMALTSTACK"),
    (0x6d, "OP_2DROP"),
    (0x6e, "OP_2DUP"),
    (0x6f, "OP_3DUP"),
    (0x70, "OP_2OVER"),
    (0x71, "OP_2ROT"),
    (0x72, "OP_2SWAP"),
    (0x73, "OP_IFDUP"),
    (0x74, "OP_DEPTH"),
    (0x75, "OP_DROP"),
    (0x76, "OP_DUP"),
    (0x77, "OP_NIP"),
    (0x78, "OP_OVER"),
    (0x79, "OP_PICK"),
    (0x7a, "OP_ROLL"),
    (0x7b, "OP_ROT"),
    (0x7c, "OP_SWAP"),
    (0x7d, "OP_TUCK"),
    // splice
    (0x7e, "OP_CAT"),
    (0x7f, "OP_SUBSTR"),
    (0x80, "OP_LEFT"),
    (0x81, "OP_RIGHT"),
    (0x82, "OP_SIZE"),
    // bitwise logic
    (0x83, "OP_INVERT"),
    (0x84, "OP_AND"),
    (0x85, "OP_OR"),
    (0x86, "OP_XOR"),
    (0x87, "OP_EQUAL"),
    (0x88, "OP_EQUALVERIFY"),
    (0x89, "OP_RESERVED1"),
    (0x8a, "OP_RESERVED2"),
    // arithmetic
    (0x8b, "OP_1ADD"),
    (0x8c, "OP_1SUB"),
    (0x8d, "OP_2MUL"),
    (0x8e, "OP_2DIV"),
    (0x8f, "OP_NEGATE"),
    (0x90, "OP_ABS"),
    (0x91, "OP_NOT"),
    (0x92, "OP_0NOTEQUAL"),
    (0x93, "OP_ADD"),
    (0x94, "OP_SUB"),
    (0x95, "OP_MUL"),
    (0x96, "OP_DIV"),
    (0x97, "OP_MOD"),
    (0x98, "OP_LSHIFT"),
    (0x99, "OP_RSHIFT"),
    (0x9a, "OP_BOOLAND"),
    (0x9b, "OP_BOOLOR"),
    (0x9c, "OP_NUMEQUAL"),
    (0x9d, "OP_NUMEQUALVERIFY"),
    (0x9e, "OP_NUMNOTEQUAL"),
    (0x9f, "OP_LESSTHAN"),
    (0xa0, "OP_GREATERTHAN"),
    (0xa1, "OP_LESSTHANOREQUAL"),
    (0xa2, "OP_GREATERTHANOREQUAL"),
    (0xa3, "OP_MIN"),
    (0xa4, "OP_MAX"),
    (0xa5, "OP_WITHIN"),
    // crypto
    (0xa6, "OP_RIPEMD160"),
    (0xa7, "OP_SHA1"),
    (0xa8, "OP_SHA256"),
    (0xa9, "OP_HASH160"),
    (0xaa, "OP_HASH256"),
    (0xab, "OP_CODESEPARATOR"),
    (0xac, "OP_CHECKSIG"),
    (0xad, "OP_CHECKSIGVERIFY"),
    (0xae, "OP_CHECKMULTISIG"),
    (0xaf, "OP_CHECKMULTISIGVERIFY"),
    // expansion
    (0xb0, "OP_NOP1"),
    (0xb1, "OP_CHECKLOCKTIMEVERIFY"),
    (0xb2, "OP_CHECKSEQUENCEVERIFY"),
    (0xb3, "OP_NOP4"),
    (0xb4, "OP_NOP5"),
    (0xb5, "OP_NOP6"),
    (0xb6, "OP_NOP7"),
    (0xb7, "OP_NOP8"),
    (0xb8, "OP_NOP9"),
    (0xb9, "OP_NOP10"),
];

pub fn opcode_name(op: u8) -> Option<&'static str> {
    OPCODES
        .binary_search_by_key(&op, |&(code, _)| code)
        .ok()
        .map(|i| OPCODES[i].1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Op(&'static str),
    Address(Address),
    PublicKey(Vec<u8>),
    Signature(Signature),
    Script(Vec<Token>),
    Data(Vec<u8>),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Op(name) => f.write_str(name),
            Token::Address(address) => write!(f, "{}", address),
            Token::PublicKey(key) => f.write_str(&hex::encode(key)),
            Token::Signature(sig) => match sig.encode() {
                Ok(bytes) => write!(f, "{}[ALL]", hex::encode(&bytes[..bytes.len() - 1])),
                Err(_) => f.write_str("<signature>"),
            },
            Token::Script(tokens) => {
                f.write_str("[")?;
                write_tokens(f, tokens)?;
                f.write_str("]")
            }
            Token::Data(data) => f.write_str(&hex::encode(data)),
        }
    }
}

fn write_tokens(f: &mut fmt::Formatter<'_>, tokens: &[Token]) -> fmt::Result {
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", token)?;
    }
    Ok(())
}

/// Tokens scanned so far, and why scanning stopped early if it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub tokens: Vec<Token>,
    pub error: Option<String>,
}

impl Disassembly {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tokens(f, &self.tokens)?;
        if let Some(error) = &self.error {
            if !self.tokens.is_empty() {
                f.write_str(" ")?;
            }
            write!(f, "<error: {}>", error)?;
        }
        Ok(())
    }
}

/// Disassemble raw bytes, classifying them as a mainnet scriptPubKey first
pub fn disassemble(bytes: &[u8]) -> Disassembly {
    let (_, address) = classify(bytes, Network::Mainnet);
    render(bytes, address.as_ref(), Network::Mainnet, 0)
}

pub fn disassemble_script(script: &Script) -> Disassembly {
    let network = script.address().map(|a| a.network).unwrap_or_default();
    render(script.as_bytes(), script.address(), network, 0)
}

fn render(bytes: &[u8], template: Option<&Address>, network: Network, depth: usize) -> Disassembly {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let op = bytes[pos];
        if (0x01..=OP_PUSHDATA4).contains(&op) {
            match next_chunk(bytes, pos) {
                Ok((chunk, next)) => {
                    let data = chunk.data.unwrap_or_default();
                    tokens.push(match template {
                        Some(address) => Token::Address(*address),
                        None => render_data(data, network, depth),
                    });
                    pos = next;
                }
                Err(e) => return Disassembly { tokens, error: Some(e.to_string()) },
            }
        } else if let Some(name) = opcode_name(op) {
            tokens.push(Token::Op(name));
            pos += 1;
        } else {
            return Disassembly {
                tokens,
                error: Some(format!("unknown opcode {:#04x} at offset {}", op, pos)),
            };
        }
    }
    Disassembly { tokens, error: None }
}

fn render_data(data: Vec<u8>, network: Network, depth: usize) -> Token {
    try_public_key(&data)
        .or_else(|| try_signature(&data))
        .or_else(|| try_nested_script(&data, network, depth))
        .unwrap_or(Token::Data(data))
}

fn try_public_key(data: &[u8]) -> Option<Token> {
    let plausible = matches!(data.len(), 33 | 65);
    (plausible && is_valid_public_key(data)).then(|| Token::PublicKey(data.to_vec()))
}

fn try_signature(data: &[u8]) -> Option<Token> {
    Signature::decode(data).ok().map(Token::Signature)
}

fn try_nested_script(data: &[u8], network: Network, depth: usize) -> Option<Token> {
    if depth + 1 >= MAX_DISASSEMBLY_DEPTH {
        return None;
    }
    let (_, address) = classify(data, network);
    let nested = render(data, address.as_ref(), network, depth + 1);
    (nested.is_complete() && !nested.tokens.is_empty()).then_some(Token::Script(nested.tokens))
}
