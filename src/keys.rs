//! secp256k1 key pairs and the raw ECDSA sign/verify primitives

use std::fmt;
use std::sync::OnceLock;

use secp256k1::ecdsa::Signature as EcdsaSignature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use crate::address::{Address, Network};
use crate::error::{Result, TxError};
use crate::types::Hash;

fn context() -> &'static Secp256k1<All> {
    static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}

/// A signing key with its public key and the serialization form used in scripts
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
    compressed: bool,
}

impl KeyPair {
    pub fn from_secret_bytes(bytes: &[u8], compressed: bool) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(|e| TxError::InvalidKey(e.to_string()))?;
        Ok(Self::from_secret_key(secret, compressed))
    }

    pub fn from_secret_key(secret: SecretKey, compressed: bool) -> Self {
        let public = PublicKey::from_secret_key(context(), &secret);
        KeyPair { secret, public, compressed }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Public key as it appears in scripts: 33 bytes if compressed, 65 otherwise
    pub fn public_key_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.public.serialize().to_vec()
        } else {
            self.public.serialize_uncompressed().to_vec()
        }
    }

    pub fn address(&self, network: Network) -> Address {
        Address::from_public_key(&self.public_key_bytes(), network)
    }

    /// Sign a 32-byte digest, returning the raw big-endian `(r, s)` halves
    pub fn sign(&self, hash: &Hash) -> ([u8; 32], [u8; 32]) {
        ecdsa_sign(hash, &self.secret)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// Deterministic (RFC 6979) low-S ECDSA signature over `hash`
pub fn ecdsa_sign(hash: &Hash, secret: &SecretKey) -> ([u8; 32], [u8; 32]) {
    let message = Message::from_digest(*hash);
    let compact = context().sign_ecdsa(&message, secret).serialize_compact();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);
    (r, s)
}

/// Verify `(r, s)` over `hash` against a serialized public key.
///
/// S is normalised before verification, so high-S signatures from legacy
/// signers are accepted. Any unparsable key or signature verifies as false.
pub fn ecdsa_verify(hash: &Hash, public_key: &[u8], r: &[u8; 32], s: &[u8; 32]) -> bool {
    let public = match PublicKey::from_slice(public_key) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);
    let mut signature = match EcdsaSignature::from_compact(&compact) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    signature.normalize_s();
    let message = Message::from_digest(*hash);
    context().verify_ecdsa(&message, &signature, &public).is_ok()
}

/// True if `bytes` parse as a valid secp256k1 point
pub fn is_valid_public_key(bytes: &[u8]) -> bool {
    PublicKey::from_slice(bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one(compressed: bool) -> KeyPair {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        KeyPair::from_secret_bytes(&secret, compressed).unwrap()
    }

    #[test]
    fn test_public_key_forms() {
        assert_eq!(
            hex::encode(key_one(true).public_key_bytes()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(key_one(false).public_key_bytes().len(), 65);
    }

    #[test]
    fn test_addresses() {
        assert_eq!(
            key_one(true).address(Network::Mainnet).to_string(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
        assert_eq!(
            key_one(false).address(Network::Mainnet).to_string(),
            "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm"
        );
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(matches!(
            KeyPair::from_secret_bytes(&[0u8; 32], true),
            Err(TxError::InvalidKey(_))
        ));
        assert!(KeyPair::from_secret_bytes(&[1u8; 5], true).is_err());
    }

    #[test]
    fn test_sign_verify() {
        let key = key_one(true);
        let hash = [7u8; 32];
        let (r, s) = key.sign(&hash);
        assert!(ecdsa_verify(&hash, &key.public_key_bytes(), &r, &s));
        assert!(!ecdsa_verify(&[8u8; 32], &key.public_key_bytes(), &r, &s));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let key = key_one(false);
        assert_eq!(key.sign(&[3u8; 32]), key.sign(&[3u8; 32]));
    }

    #[test]
    fn test_verify_rejects_garbage_key() {
        let key = key_one(true);
        let (r, s) = key.sign(&[1u8; 32]);
        assert!(!ecdsa_verify(&[1u8; 32], &[0x02, 0x01], &r, &s));
        assert!(!is_valid_public_key(&[0x04; 65]));
    }
}
