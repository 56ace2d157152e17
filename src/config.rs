//! Chain parameters used when deriving addresses and assembling transactions

use serde::{Deserialize, Serialize};

use crate::address::Network;
use crate::constants::{DEFAULT_TX_VERSION, SEQUENCE_FINAL};
use crate::error::{Result, TxError};

/// Network and transaction-level fields. Missing JSON fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainParams {
    pub network: Network,
    pub tx_version: i32,
    pub lock_time: u32,
    /// Sequence number given to every built input
    pub sequence: u32,
}

impl Default for ChainParams {
    fn default() -> Self {
        ChainParams {
            network: Network::Mainnet,
            tx_version: DEFAULT_TX_VERSION,
            lock_time: 0,
            sequence: SEQUENCE_FINAL,
        }
    }
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self::default()
    }

    pub fn testnet() -> Self {
        ChainParams {
            network: Network::Testnet,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TxError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TxError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ChainParams::default();
        assert_eq!(params.network, Network::Mainnet);
        assert_eq!(params.tx_version, 1);
        assert_eq!(params.lock_time, 0);
        assert_eq!(params.sequence, 0xffffffff);
    }

    #[test]
    fn test_from_json_partial() {
        let params = ChainParams::from_json(r#"{"network": "testnet", "lock_time": 500}"#).unwrap();
        assert_eq!(params.network, Network::Testnet);
        assert_eq!(params.lock_time, 500);
        assert_eq!(params.tx_version, DEFAULT_TX_VERSION);
        assert_eq!(ChainParams::from_json("{}").unwrap(), ChainParams::mainnet());
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            ChainParams::from_json(r#"{"network": "regtest"}"#),
            Err(TxError::Config(_))
        ));
        assert!(ChainParams::from_json(r#"{"fee": 1}"#).is_err());
        assert!(ChainParams::from_json("not json").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let params = ChainParams::testnet();
        let json = params.to_json().unwrap();
        assert_eq!(ChainParams::from_json(&json).unwrap(), params);
    }
}
