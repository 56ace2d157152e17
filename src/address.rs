//! Base58Check payment addresses for pay-to-pubkey-hash and pay-to-script-hash

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::*;
use crate::error::{Result, TxError};
use crate::hash::{hash160, sha256d};
use crate::types::Hash160;

/// Network selecting the address version bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    fn version_byte(self, kind: AddressKind) -> u8 {
        match (self, kind) {
            (Network::Mainnet, AddressKind::PubKeyHash) => MAINNET_PUBKEY_HASH_VERSION,
            (Network::Mainnet, AddressKind::ScriptHash) => MAINNET_SCRIPT_HASH_VERSION,
            (Network::Testnet, AddressKind::PubKeyHash) => TESTNET_PUBKEY_HASH_VERSION,
            (Network::Testnet, AddressKind::ScriptHash) => TESTNET_SCRIPT_HASH_VERSION,
        }
    }

    fn from_version_byte(version: u8) -> Option<(Network, AddressKind)> {
        match version {
            MAINNET_PUBKEY_HASH_VERSION => Some((Network::Mainnet, AddressKind::PubKeyHash)),
            MAINNET_SCRIPT_HASH_VERSION => Some((Network::Mainnet, AddressKind::ScriptHash)),
            TESTNET_PUBKEY_HASH_VERSION => Some((Network::Testnet, AddressKind::PubKeyHash)),
            TESTNET_SCRIPT_HASH_VERSION => Some((Network::Testnet, AddressKind::ScriptHash)),
            _ => None,
        }
    }
}

/// What the address's 20-byte hash commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    PubKeyHash,
    ScriptHash,
}

/// A payment address: network, kind and the committed HASH160
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub network: Network,
    pub kind: AddressKind,
    pub hash: Hash160,
}

impl Address {
    pub fn from_hash(hash: Hash160, is_pub_key_hash: bool, network: Network) -> Self {
        let kind = if is_pub_key_hash {
            AddressKind::PubKeyHash
        } else {
            AddressKind::ScriptHash
        };
        Address { network, kind, hash }
    }

    /// Pay-to-pubkey-hash address of a serialized public key (compressed or not)
    pub fn from_public_key(public_key: &[u8], network: Network) -> Self {
        Self::from_hash(hash160(public_key), true, network)
    }

    /// Pay-to-script-hash address of a redeem script
    pub fn from_redeem_script(script: &[u8], network: Network) -> Self {
        Self::from_hash(hash160(script), false, network)
    }

    pub fn is_pub_key_hash(&self) -> bool {
        self.kind == AddressKind::PubKeyHash
    }

    fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(25);
        payload.push(self.network.version_byte(self.kind));
        payload.extend_from_slice(&self.hash);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);
        payload
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.payload()).into_string())
    }
}

impl FromStr for Address {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|e| TxError::InvalidAddress(format!("{}: {}", s, e)))?;
        if decoded.len() != 25 {
            return Err(TxError::InvalidAddress(format!(
                "{}: decoded length {} (expected 25)",
                s,
                decoded.len()
            )));
        }
        let checksum = sha256d(&decoded[..21]);
        if decoded[21..] != checksum[..4] {
            return Err(TxError::InvalidAddress(format!("{}: checksum mismatch", s)));
        }
        let (network, kind) = Network::from_version_byte(decoded[0]).ok_or_else(|| {
            TxError::InvalidAddress(format!("{}: unknown version byte {:#04x}", s, decoded[0]))
        })?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&decoded[1..21]);
        Ok(Address { network, kind, hash })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_from_public_key_compressed() {
        let pubkey = hex::decode(GENERATOR_COMPRESSED).unwrap();
        let address = Address::from_public_key(&pubkey, Network::Mainnet);
        assert_eq!(address.to_string(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(hex::encode(address.hash), "751e76e8199196d454941c45d1b3a323f1433bd6");
    }

    #[test]
    fn test_testnet_pubkey_hash() {
        let pubkey = hex::decode(GENERATOR_COMPRESSED).unwrap();
        let address = Address::from_public_key(&pubkey, Network::Testnet);
        assert_eq!(address.to_string(), "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r");
    }

    #[test]
    fn test_script_hash_addresses() {
        let script = [22u8, 33, 44, 55, 66, 77];
        assert_eq!(
            Address::from_redeem_script(&script, Network::Mainnet).to_string(),
            "3C95QYM9MRruWTNTRpP8sJkfb8LoYopffG"
        );
        assert_eq!(
            Address::from_redeem_script(&script, Network::Testnet).to_string(),
            "2N3hHUHHAxtNFiF116x11VFjvoUYyM4WT3m"
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for s in [
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "3C95QYM9MRruWTNTRpP8sJkfb8LoYopffG",
            "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r",
            "2N3hHUHHAxtNFiF116x11VFjvoUYyM4WT3m",
        ] {
            let address: Address = s.parse().unwrap();
            assert_eq!(address.to_string(), s);
        }
        let p2sh: Address = "3C95QYM9MRruWTNTRpP8sJkfb8LoYopffG".parse().unwrap();
        assert_eq!(p2sh.kind, AddressKind::ScriptHash);
        assert_eq!(p2sh.network, Network::Mainnet);
    }

    #[test]
    fn test_parse_bad_checksum() {
        let result = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb".parse::<Address>();
        assert!(matches!(result, Err(TxError::InvalidAddress(_))));
    }

    #[test]
    fn test_parse_bad_length_and_chars() {
        assert!("1A1zP1".parse::<Address>().is_err());
        assert!("0OIl".parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let address: Address = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
