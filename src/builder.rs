//! Transaction assembly: accumulate inputs, outputs and a change target, then
//! sign everything in one `build()`.
//!
//! `TxBuilder` is a plain single-owner accumulator with no internal locking.
//! Share it across threads only behind your own synchronization.

use tracing::debug;

use crate::address::Address;
use crate::codec::VarInt;
use crate::config::ChainParams;
use crate::constants::*;
use crate::error::{Result, TxError};
use crate::hash::to_display_hex;
use crate::keys::KeyPair;
use crate::script::{Script, ScriptKind};
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::types::Hash;
use crate::verify::{build_script_pubkey, build_script_sig};

/// An output being spent: where it is, what it holds, and what locks it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousOutput {
    pub tx_hash: Hash,
    pub index: u32,
    pub value: u64,
    pub script_pubkey: Script,
}

impl PreviousOutput {
    pub fn new(tx_hash: Hash, index: u32, value: u64, script_pubkey: Script) -> Self {
        PreviousOutput {
            tx_hash,
            index,
            value,
            script_pubkey,
        }
    }

    pub fn from_transaction(tx: &Transaction, index: u32) -> Result<Self> {
        let output = tx.output(index).ok_or(TxError::OutputIndexOutOfRange {
            index,
            count: tx.outputs().len(),
        })?;
        Ok(Self::new(tx.hash(), index, output.value, output.script_pubkey.clone()))
    }
}

/// Fee and change for a given size estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangePlan {
    pub fee: i64,
    pub change: i64,
}

/// Change paying `input_total - output_total - fee_per_byte * size`; the fee is whatever remains
pub fn plan_change(
    input_total: u64,
    output_total: u64,
    fee_per_byte: u64,
    size: usize,
) -> ChangePlan {
    let surplus = input_total as i128 - output_total as i128;
    let change = surplus - fee_per_byte as i128 * size as i128;
    ChangePlan {
        fee: saturate(surplus - change),
        change: saturate(change),
    }
}

fn saturate(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[derive(Debug, Clone)]
struct PlannedInput {
    previous: PreviousOutput,
    key: KeyPair,
    // set by the last successful build(), cleared by any change to the builder
    script_sig: Option<Script>,
}

impl PlannedInput {
    fn script_sig_len(&self, use_signed: bool) -> Result<usize> {
        if let (true, Some(script_sig)) = (use_signed, &self.script_sig) {
            return Ok(script_sig.len());
        }
        let signature = 1 + MAX_SIGNATURE_SIZE;
        match self.previous.script_pubkey.kind() {
            ScriptKind::P2PK => Ok(signature),
            ScriptKind::P2PKH => {
                let key_len = if self.key.is_compressed() {
                    COMPRESSED_PUBKEY_SIZE
                } else {
                    UNCOMPRESSED_PUBKEY_SIZE
                };
                Ok(signature + 1 + key_len)
            }
            kind => Err(TxError::UnsupportedScriptKind(kind)),
        }
    }
}

#[derive(Debug, Clone)]
struct ChangeTarget {
    fee_per_byte: u64,
    address: Address,
}

fn output_size(address: &Address) -> usize {
    let script_len = if address.is_pub_key_hash() {
        P2PKH_SCRIPT_SIZE
    } else {
        P2SH_SCRIPT_SIZE
    };
    8 + VarInt::size_of(script_len) + script_len
}

#[derive(Debug, Clone, Default)]
pub struct TxBuilder {
    params: ChainParams,
    inputs: Vec<PlannedInput>,
    outputs: Vec<(u64, Address)>,
    change: Option<ChangeTarget>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ChainParams) -> Self {
        TxBuilder {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Spend `previous` with `key`
    pub fn add_input(&mut self, previous: PreviousOutput, key: KeyPair) -> &mut Self {
        self.clear_signed();
        self.inputs.push(PlannedInput {
            previous,
            key,
            script_sig: None,
        });
        self
    }

    pub fn add_output(&mut self, value: u64, address: Address) -> &mut Self {
        self.clear_signed();
        self.outputs.push((value, address));
        self
    }

    /// Send whatever is left after `fee_per_byte * estimated_size()` to `address`
    pub fn set_change(&mut self, fee_per_byte: u64, address: Address) -> &mut Self {
        self.clear_signed();
        self.change = Some(ChangeTarget {
            fee_per_byte,
            address,
        });
        self
    }

    fn clear_signed(&mut self) {
        for input in &mut self.inputs {
            input.script_sig = None;
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Payment outputs, not counting change
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_total(&self) -> u64 {
        self.inputs
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.previous.value))
    }

    pub fn output_total(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, (value, _)| acc.saturating_add(*value))
    }

    /// Estimated serialized size, counting a change output when one is configured.
    ///
    /// Inputs already signed by a previous `build()` use their real scriptSig
    /// length; the others use the largest scriptSig their output kind allows.
    pub fn estimated_size(&self) -> Result<usize> {
        self.size_estimate(true)
    }

    fn size_estimate(&self, use_signed: bool) -> Result<usize> {
        let output_count = self.outputs.len() + usize::from(self.change.is_some());
        let mut size =
            4 + 4 + VarInt::size_of(self.inputs.len()) + VarInt::size_of(output_count);

        for input in &self.inputs {
            let script_len = input.script_sig_len(use_signed)?;
            size += 32 + 4 + 4 + VarInt::size_of(script_len) + script_len;
        }
        size += self.outputs.iter().map(|(_, a)| output_size(a)).sum::<usize>();
        if let Some(change) = &self.change {
            size += output_size(&change.address);
        }
        Ok(size)
    }

    /// Change value at the current size estimate, if change is configured
    pub fn change_value(&self) -> Result<Option<i64>> {
        Ok(self.plan(self.estimated_size()?).map(|plan| plan.change))
    }

    /// Inputs minus outputs minus change; negative when underfunded
    pub fn calculate_fee(&self) -> Result<i64> {
        Ok(self.fee_at(self.estimated_size()?))
    }

    fn fee_at(&self, size: usize) -> i64 {
        match self.plan(size) {
            Some(plan) => plan.fee,
            None => saturate(self.input_total() as i128 - self.output_total() as i128),
        }
    }

    fn plan(&self, size: usize) -> Option<ChangePlan> {
        let change = self.change.as_ref()?;
        Some(plan_change(
            self.input_total(),
            self.output_total(),
            change.fee_per_byte,
            size,
        ))
    }

    /// Sign every input and return the finished transaction.
    ///
    /// Signing is deterministic, so building twice from the same state gives
    /// identical bytes. The plan always uses the unsigned size estimate, and
    /// the builder is only updated once every input has signed.
    pub fn build(&mut self) -> Result<Transaction> {
        // 1. Funds
        let input_total = self.input_total();
        let output_total = self.output_total();
        if self.inputs.is_empty() {
            return Err(TxError::InsufficientFunds {
                available: 0,
                required: output_total,
            });
        }
        let size = self.size_estimate(false)?;
        let fee = self.fee_at(size);
        let change = self.plan(size).map(|plan| plan.change);
        let required = match &self.change {
            Some(target) => {
                output_total.saturating_add(target.fee_per_byte.saturating_mul(size as u64))
            }
            None => output_total,
        };
        if fee < 0 || change.is_some_and(|c| c < 0) {
            return Err(TxError::InsufficientFunds {
                available: input_total,
                required,
            });
        }
        debug!(
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            estimated_size = size,
            fee,
            change = change.unwrap_or(0),
            "planned transaction"
        );

        // 2. Finalized outputs, change last and only when positive
        let outputs: Vec<TxOutput> = self
            .outputs
            .iter()
            .map(|(value, address)| (*value, build_script_pubkey(address)))
            .chain(
                self.change
                    .as_ref()
                    .zip(change.filter(|c| *c > 0))
                    .map(|(target, value)| (value as u64, build_script_pubkey(&target.address))),
            )
            .enumerate()
            .map(|(index, (value, script_pubkey))| TxOutput {
                index: index as u32,
                value,
                script_pubkey,
            })
            .collect();

        let unsigned_inputs: Vec<TxInput> = self
            .inputs
            .iter()
            .map(|input| {
                TxInput::new(
                    input.previous.tx_hash,
                    input.previous.index,
                    Script::unclassified(Vec::new()),
                    self.params.sequence,
                )
            })
            .collect();
        let unsigned = Transaction::from_parts(
            self.params.tx_version,
            unsigned_inputs.clone(),
            outputs.clone(),
            self.params.lock_time,
            self.params.network,
        )?;

        // 3. Sign in order; each digest blanks every other scriptSig
        let mut signed_inputs = unsigned_inputs;
        let mut script_sigs = Vec::with_capacity(self.inputs.len());
        for (i, planned) in self.inputs.iter().enumerate() {
            let previous = &planned.previous.script_pubkey;
            let hash = unsigned.signature_hash(i, previous)?;
            let script_sig = build_script_sig(previous, &hash, &planned.key)?;
            debug!(
                input = i,
                previous = %to_display_hex(&planned.previous.tx_hash),
                index = planned.previous.index,
                script_sig_len = script_sig.len(),
                "signed input"
            );
            signed_inputs[i].script_sig = script_sig.clone();
            script_sigs.push(script_sig);
        }

        // 4. Re-parse the signed serialization
        let tx = Transaction::from_parts(
            self.params.tx_version,
            signed_inputs,
            outputs,
            self.params.lock_time,
            self.params.network,
        )?;
        for (planned, script_sig) in self.inputs.iter_mut().zip(script_sigs) {
            planned.script_sig = Some(script_sig);
        }
        debug!(tx = %tx.hash_hex(), size = tx.size(), "built transaction");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::script::push_data;

    fn key(n: u8, compressed: bool) -> KeyPair {
        let mut secret = [0u8; 32];
        secret[31] = n;
        KeyPair::from_secret_bytes(&secret, compressed).unwrap()
    }

    fn p2pkh_output(value: u64, key: &KeyPair) -> PreviousOutput {
        let script = build_script_pubkey(&key.address(Network::Mainnet));
        PreviousOutput::new([0xab; 32], 0, value, script)
    }

    #[test]
    fn test_plan_change_arithmetic() {
        let plan = plan_change(50_000_000, 40_000_000, 100, 112);
        assert_eq!(plan.fee, 11_200);
        assert_eq!(plan.change, 9_988_800);

        let plan = plan_change(1_000, 900, 10, 112);
        assert_eq!(plan.change, -1_020);
        assert_eq!(plan.fee, 1_120);
    }

    #[test]
    fn test_estimated_size_p2pkh() {
        let k = key(1, true);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(50_000_000, &k), k.clone())
            .add_output(40_000_000, key(2, true).address(Network::Mainnet))
            .set_change(100, k.address(Network::Mainnet));
        // 10 fixed, 40 + 1 + 108 input, 2 * 34 outputs
        assert_eq!(builder.estimated_size().unwrap(), 227);
        assert_eq!(builder.calculate_fee().unwrap(), 22_700);
        assert_eq!(builder.change_value().unwrap(), Some(10_000_000 - 22_700));
    }

    #[test]
    fn test_estimated_size_p2pk_and_uncompressed() {
        let k = key(3, false);
        let mut p2pk = Vec::new();
        push_data(&mut p2pk, &k.public_key_bytes());
        p2pk.push(OP_CHECKSIG);

        let mut builder = TxBuilder::new();
        builder
            .add_input(PreviousOutput::new([1; 32], 0, 1_000, Script::new(p2pk)), k.clone())
            .add_input(p2pkh_output(1_000, &k), k.clone());
        // 10 fixed, P2PK input 40 + 1 + 74, uncompressed P2PKH input 40 + 1 + 140
        assert_eq!(builder.estimated_size().unwrap(), 10 + 115 + 181);
    }

    #[test]
    fn test_unsupported_previous_kind() {
        let k = key(4, true);
        let p2sh = build_script_pubkey(&Address::from_redeem_script(&[1, 2], Network::Mainnet));
        let mut builder = TxBuilder::new();
        builder
            .add_input(PreviousOutput::new([1; 32], 0, 10_000, p2sh), k.clone())
            .add_output(1_000, k.address(Network::Mainnet));
        assert_eq!(
            builder.estimated_size(),
            Err(TxError::UnsupportedScriptKind(ScriptKind::P2SH))
        );
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_build_without_inputs() {
        let mut builder = TxBuilder::new();
        builder.add_output(1_000, key(1, true).address(Network::Mainnet));
        assert_eq!(
            builder.build(),
            Err(TxError::InsufficientFunds {
                available: 0,
                required: 1_000
            })
        );
    }

    #[test]
    fn test_build_underfunded() {
        let k = key(5, true);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(1_000, &k), k.clone())
            .add_output(2_000, k.address(Network::Mainnet));
        assert!(matches!(builder.build(), Err(TxError::InsufficientFunds { .. })));

        // enough for the outputs but not the fee
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(1_000, &k), k.clone())
            .add_output(900, k.address(Network::Mainnet))
            .set_change(10, k.address(Network::Mainnet));
        assert!(matches!(
            builder.build(),
            Err(TxError::InsufficientFunds { available: 1_000, .. })
        ));
    }

    #[test]
    fn test_build_with_change() {
        let k = key(6, true);
        let payee = key(7, true).address(Network::Mainnet);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(50_000_000, &k), k.clone())
            .add_output(40_000_000, payee)
            .set_change(100, k.address(Network::Mainnet));
        let expected_change = builder.change_value().unwrap().unwrap();

        let tx = builder.build().unwrap();
        assert_eq!(tx.outputs().len(), 2);
        assert_eq!(tx.outputs()[0].value, 40_000_000);
        assert_eq!(tx.outputs()[0].script_pubkey.address(), Some(&payee));
        assert_eq!(tx.outputs()[1].value as i64, expected_change);
        assert_eq!(tx.inputs()[0].previous_tx_hash, [0xab; 32]);
        assert_eq!(tx.inputs()[0].sequence, SEQUENCE_FINAL);
        assert!(tx.size() <= 227);
        // signed inputs now report their real length
        assert_eq!(builder.estimated_size().unwrap(), tx.size());
    }

    #[test]
    fn test_zero_change_is_omitted() {
        let k = key(8, true);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(10_000, &k), k.clone())
            .add_output(10_000 - 227, k.address(Network::Mainnet))
            .set_change(1, k.address(Network::Mainnet));
        assert_eq!(builder.change_value().unwrap(), Some(0));
        let tx = builder.build().unwrap();
        assert_eq!(tx.outputs().len(), 1);
    }

    #[test]
    fn test_build_is_deterministic() {
        let k = key(9, false);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(20_000, &k), k.clone())
            .add_output(5_000, k.address(Network::Mainnet))
            .set_change(2, k.address(Network::Mainnet));
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_wrong_key_is_key_mismatch() {
        let owner = key(10, true);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(20_000, &owner), key(11, true))
            .add_output(5_000, owner.address(Network::Mainnet));
        assert!(matches!(builder.build(), Err(TxError::KeyMismatch(_))));
    }

    #[test]
    fn test_failed_build_leaves_state_unchanged() {
        let owner = key(13, true);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(50_000, &owner), owner.clone())
            .add_input(p2pkh_output(50_000, &owner), key(14, true))
            .add_output(60_000, key(15, true).address(Network::Mainnet))
            .set_change(10, owner.address(Network::Mainnet));
        let size = builder.estimated_size().unwrap();
        let fee = builder.calculate_fee().unwrap();
        assert_eq!(fee, 10 * size as i64);

        for _ in 0..2 {
            assert!(matches!(builder.build(), Err(TxError::KeyMismatch(_))));
            assert_eq!(builder.estimated_size().unwrap(), size);
            assert_eq!(builder.calculate_fee().unwrap(), fee);
        }
    }

    #[test]
    fn test_changes_after_build_drop_signed_lengths() {
        let k = key(16, true);
        let mut builder = TxBuilder::new();
        builder
            .add_input(p2pkh_output(50_000, &k), k.clone())
            .set_change(10, k.address(Network::Mainnet));
        let unsigned = builder.estimated_size().unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(builder.estimated_size().unwrap(), tx.size());

        builder.add_output(1_000, k.address(Network::Mainnet));
        assert_eq!(builder.estimated_size().unwrap(), unsigned + 34);
    }

    #[test]
    fn test_params_applied() {
        let k = key(12, true);
        let params = ChainParams {
            lock_time: 700_000,
            sequence: 0xfffffffe,
            tx_version: 2,
            ..ChainParams::testnet()
        };
        let mut builder = TxBuilder::with_params(params);
        builder
            .add_input(p2pkh_output(20_000, &k), k.clone())
            .add_output(5_000, k.address(Network::Testnet));
        let tx = builder.build().unwrap();
        assert_eq!(tx.version(), 2);
        assert_eq!(tx.lock_time(), 700_000);
        assert_eq!(tx.inputs()[0].sequence, 0xfffffffe);
        assert_eq!(
            tx.outputs()[0].script_pubkey.address(),
            Some(&k.address(Network::Testnet))
        );
        assert_eq!(builder.calculate_fee().unwrap(), 15_000);
    }
}
