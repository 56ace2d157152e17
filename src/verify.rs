//! Building scriptPubKeys and scriptSigs for the three templates, and checking
//! a scriptSig against the scriptPubKey it claims to satisfy.
//!
//! There is no script interpreter here: each template has a fixed shape, so
//! verification is a direct structural and cryptographic check.

use crate::address::Address;
use crate::constants::*;
use crate::error::{Result, TxError};
use crate::hash::hash160;
use crate::keys::KeyPair;
use crate::script::{decode_chunks, push_data, Script, ScriptKind};
use crate::signature::Signature;
use crate::types::{ByteString, Hash};

/// Locking script paying to `address`: P2PKH for pubkey-hash addresses, P2SH otherwise
pub fn build_script_pubkey(address: &Address) -> Script {
    let bytes = if address.is_pub_key_hash() {
        let mut bytes = Vec::with_capacity(P2PKH_SCRIPT_SIZE);
        bytes.push(OP_DUP);
        bytes.push(OP_HASH160);
        push_data(&mut bytes, &address.hash);
        bytes.push(OP_EQUALVERIFY);
        bytes.push(OP_CHECKSIG);
        bytes
    } else {
        let mut bytes = Vec::with_capacity(P2SH_SCRIPT_SIZE);
        bytes.push(OP_HASH160);
        push_data(&mut bytes, &address.hash);
        bytes.push(OP_EQUAL);
        bytes
    };
    Script::with_network(bytes, address.network)
}

/// Sign `hash` with `key` and build the scriptSig spending `previous`.
///
/// Only P2PK and P2PKH outputs can be spent this way. The key must be the
/// one the output commits to.
pub fn build_script_sig(previous: &Script, hash: &Hash, key: &KeyPair) -> Result<Script> {
    let public_key = key.public_key_bytes();
    match previous.kind() {
        ScriptKind::P2PK => {
            if previous.public_key() != Some(public_key.as_slice()) {
                return Err(TxError::KeyMismatch(
                    "key does not match the pay-to-pubkey output".into(),
                ));
            }
        }
        ScriptKind::P2PKH => {
            if previous.committed_hash() != Some(hash160(&public_key)) {
                return Err(TxError::KeyMismatch(
                    "key does not hash to the pay-to-pubkey-hash output".into(),
                ));
            }
        }
        kind => return Err(TxError::UnsupportedScriptKind(kind)),
    }

    let signature = Signature::sign(hash, key).encode()?;
    let mut bytes: ByteString =
        Vec::with_capacity(MAX_SIGNATURE_SIZE + UNCOMPRESSED_PUBKEY_SIZE + 2);
    push_data(&mut bytes, &signature);
    if previous.kind() == ScriptKind::P2PKH {
        push_data(&mut bytes, &public_key);
    }
    Ok(Script::unclassified(bytes))
}

/// Check `script_sig` against `previous` for the signed digest `hash`.
///
/// `Ok(false)` means the scriptSig is well-formed but does not satisfy the
/// output. Structural problems and unsupported output kinds are errors.
///
/// For P2SH only the redeem script's hash is compared; the redeem script is
/// not executed and the signature is not checked against any key in it.
pub fn verify(script_sig: &Script, previous: &Script, hash: &Hash) -> Result<bool> {
    match previous.kind() {
        ScriptKind::P2PK => {
            let [sig] = pushes::<1>(script_sig)?;
            let signature = Signature::decode(&sig)?;
            let public_key = previous.public_key().ok_or_else(|| {
                TxError::MalformedInput("pay-to-pubkey output without a key".into())
            })?;
            Ok(signature.verify(hash, public_key))
        }
        ScriptKind::P2PKH => {
            let [sig, public_key] = pushes::<2>(script_sig)?;
            let signature = Signature::decode(&sig)?;
            if previous.committed_hash() != Some(hash160(&public_key)) {
                return Ok(false);
            }
            Ok(signature.verify(hash, &public_key))
        }
        ScriptKind::P2SH => {
            let [sig, redeem_script] = pushes::<2>(script_sig)?;
            Signature::decode(&sig)?;
            Ok(previous.committed_hash() == Some(hash160(&redeem_script)))
        }
        kind @ ScriptKind::Unknown => Err(TxError::UnsupportedScriptKind(kind)),
    }
}

/// Exactly `N` data pushes and nothing else
fn pushes<const N: usize>(script_sig: &Script) -> Result<[ByteString; N]> {
    let chunks = decode_chunks(script_sig.as_bytes())?;
    if chunks.len() != N {
        return Err(TxError::MalformedInput(format!(
            "scriptSig has {} elements, expected {} pushes",
            chunks.len(),
            N
        )));
    }
    let data = chunks
        .into_iter()
        .map(|chunk| {
            chunk.data.ok_or_else(|| {
                TxError::MalformedInput(format!(
                    "scriptSig opcode {:#04x} is not a push",
                    chunk.op
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    data.try_into()
        .map_err(|_| TxError::MalformedInput("scriptSig push count changed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;

    fn key(n: u8, compressed: bool) -> KeyPair {
        let mut secret = [0u8; 32];
        secret[31] = n;
        KeyPair::from_secret_bytes(&secret, compressed).unwrap()
    }

    fn p2pk(key: &KeyPair) -> Script {
        let mut bytes = Vec::new();
        push_data(&mut bytes, &key.public_key_bytes());
        bytes.push(OP_CHECKSIG);
        Script::new(bytes)
    }

    #[test]
    fn test_build_script_pubkey_roundtrip() {
        let k = key(1, true);
        for network in [Network::Mainnet, Network::Testnet] {
            let address = k.address(network);
            let script = build_script_pubkey(&address);
            assert_eq!(script.kind(), ScriptKind::P2PKH);
            assert_eq!(script.address(), Some(&address));
            assert_eq!(script.len(), P2PKH_SCRIPT_SIZE);

            let p2sh = Address::from_redeem_script(&[22, 33, 44, 55, 66, 77], network);
            let script = build_script_pubkey(&p2sh);
            assert_eq!(script.kind(), ScriptKind::P2SH);
            assert_eq!(script.address(), Some(&p2sh));
        }
    }

    #[test]
    fn test_p2pkh_sign_verify() {
        for compressed in [true, false] {
            let k = key(5, compressed);
            let script = build_script_pubkey(&k.address(Network::Mainnet));
            let hash = [0x11; 32];
            let sig = build_script_sig(&script, &hash, &k).unwrap();
            assert!(verify(&sig, &script, &hash).unwrap());
            assert!(!verify(&sig, &script, &[0x12; 32]).unwrap());

            let other = build_script_pubkey(&key(6, compressed).address(Network::Mainnet));
            assert!(!verify(&sig, &other, &hash).unwrap());
        }
    }

    #[test]
    fn test_p2pk_sign_verify() {
        let k = key(7, false);
        let script = p2pk(&k);
        assert_eq!(script.kind(), ScriptKind::P2PK);
        let hash = [0x22; 32];
        let sig = build_script_sig(&script, &hash, &k).unwrap();
        assert_eq!(sig.chunks().unwrap().len(), 1);
        assert!(verify(&sig, &script, &hash).unwrap());
        assert!(!verify(&sig, &p2pk(&key(8, false)), &hash).unwrap());
    }

    #[test]
    fn test_build_script_sig_key_mismatch() {
        let script = build_script_pubkey(&key(1, true).address(Network::Mainnet));
        let err = build_script_sig(&script, &[0; 32], &key(2, true)).unwrap_err();
        assert!(matches!(err, TxError::KeyMismatch(_)));

        // same secret, other serialization: different hash
        let err = build_script_sig(&script, &[0; 32], &key(1, false)).unwrap_err();
        assert!(matches!(err, TxError::KeyMismatch(_)));

        let err = build_script_sig(&p2pk(&key(3, true)), &[0; 32], &key(4, true)).unwrap_err();
        assert!(matches!(err, TxError::KeyMismatch(_)));
    }

    #[test]
    fn test_build_script_sig_unsupported() {
        let p2sh = build_script_pubkey(&Address::from_redeem_script(&[1, 2, 3], Network::Mainnet));
        let err = build_script_sig(&p2sh, &[0; 32], &key(1, true)).unwrap_err();
        assert_eq!(err, TxError::UnsupportedScriptKind(ScriptKind::P2SH));

        let unknown = Script::new(vec![OP_DUP]);
        let err = build_script_sig(&unknown, &[0; 32], &key(1, true)).unwrap_err();
        assert_eq!(err, TxError::UnsupportedScriptKind(ScriptKind::Unknown));
    }

    #[test]
    fn test_verify_unknown_is_error() {
        let sig = Script::unclassified(vec![0x01, 0x01]);
        let err = verify(&sig, &Script::new(vec![OP_DUP]), &[0; 32]).unwrap_err();
        assert_eq!(err, TxError::UnsupportedScriptKind(ScriptKind::Unknown));
    }

    #[test]
    fn test_verify_wrong_shape() {
        let k = key(9, true);
        let script = build_script_pubkey(&k.address(Network::Mainnet));
        let hash = [0x33; 32];
        let sig = build_script_sig(&script, &hash, &k).unwrap();

        // P2PKH scriptSig against P2PK output has one push too many
        let err = verify(&sig, &p2pk(&k), &hash).unwrap_err();
        assert!(matches!(err, TxError::MalformedInput(_)));

        let mut extra = sig.as_bytes().to_vec();
        extra.push(OP_DUP);
        let err = verify(&Script::unclassified(extra), &script, &hash).unwrap_err();
        assert!(matches!(err, TxError::MalformedInput(_)));

        let err = verify(&Script::unclassified(vec![]), &script, &hash).unwrap_err();
        assert!(matches!(err, TxError::MalformedInput(_)));
    }

    #[test]
    fn test_verify_rejects_other_sighash_type() {
        let k = key(10, true);
        let script = p2pk(&k);
        let hash = [0x44; 32];
        let sig = build_script_sig(&script, &hash, &k).unwrap();
        let mut bytes = sig.into_bytes();
        *bytes.last_mut().unwrap() = 0x03;
        let err = verify(&Script::unclassified(bytes), &script, &hash).unwrap_err();
        assert!(matches!(err, TxError::SignatureInvalid(_)));
    }

    #[test]
    fn test_verify_rejects_padded_signature() {
        let k = key(12, true);
        let script = build_script_pubkey(&k.address(Network::Mainnet));
        let hash = [0x66; 32];
        let script_sig = build_script_sig(&script, &hash, &k).unwrap();
        let chunks = script_sig.chunks().unwrap();
        let sig = chunks[0].data.as_ref().unwrap();

        // same r and s, with a redundant 0x00 in front of r
        let mut padded = vec![DER_SEQUENCE, sig[1] + 1, DER_INTEGER, sig[3] + 1, 0x00];
        padded.extend_from_slice(&sig[4..]);
        let mut bytes = Vec::new();
        push_data(&mut bytes, &padded);
        push_data(&mut bytes, chunks[1].data.as_ref().unwrap());

        assert!(verify(&script_sig, &script, &hash).unwrap());
        assert!(matches!(
            verify(&Script::unclassified(bytes), &script, &hash),
            Err(TxError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_op_0_is_not_a_signature_push() {
        let k = key(13, true);
        let script = p2pk(&k);
        let err = verify(&Script::unclassified(vec![OP_0]), &script, &[0; 32]).unwrap_err();
        assert!(matches!(err, TxError::MalformedInput(_)));
    }

    #[test]
    fn test_p2sh_checks_only_script_hash() {
        let redeem = [22u8, 33, 44, 55, 66, 77];
        let previous = build_script_pubkey(&Address::from_redeem_script(&redeem, Network::Mainnet));
        let signature = Signature::sign(&[0x55; 32], &key(11, true)).encode().unwrap();

        let mut bytes = Vec::new();
        push_data(&mut bytes, &signature);
        push_data(&mut bytes, &redeem);
        let sig = Script::unclassified(bytes);
        // the signature was made over a different digest; still accepted
        assert!(verify(&sig, &previous, &[0; 32]).unwrap());

        let mut bytes = Vec::new();
        push_data(&mut bytes, &signature);
        push_data(&mut bytes, &[1, 2, 3]);
        assert!(!verify(&Script::unclassified(bytes), &previous, &[0; 32]).unwrap());
    }
}
