//! Transaction wire format, hashing, legacy signature hashing and per-input verification

use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{trace, warn};

use crate::address::Network;
use crate::codec::{Reader, Writer};
use crate::constants::*;
use crate::error::{Result, TxError};
use crate::hash::{sha256d, to_display_hex};
use crate::script::Script;
use crate::types::{Hash, OutPoint};
use crate::verify::verify;

/// Transaction input. The scriptSig is kept unclassified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Hash of the spent transaction, in hash order (reverse of display order)
    pub previous_tx_hash: Hash,
    pub previous_out_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxInput {
    pub fn new(
        previous_tx_hash: Hash,
        previous_out_index: u32,
        script_sig: Script,
        sequence: u32,
    ) -> Self {
        TxInput {
            previous_tx_hash,
            previous_out_index,
            script_sig,
            sequence,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.previous_tx_hash, self.previous_out_index)
    }

    fn write_with(&self, w: &mut Writer, script_sig: &[u8]) {
        w.write_bytes(&self.previous_tx_hash);
        w.write_u32_le(self.previous_out_index);
        w.write_var_bytes(script_sig);
        w.write_u32_le(self.sequence);
    }
}

/// Transaction output. `index` is its position in the transaction and is not serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub index: u32,
    pub value: u64,
    pub script_pubkey: Script,
}

impl TxOutput {
    fn write_to(&self, w: &mut Writer) {
        w.write_u64_le(self.value);
        w.write_var_bytes(self.script_pubkey.as_bytes());
    }
}

/// A parsed transaction.
///
/// Immutable once parsed. The consumed wire bytes are kept verbatim so that
/// re-serialization reproduces them exactly, witness section included. The
/// hash covers the legacy (witness-free) serialization and is computed on
/// first use.
#[derive(Debug, Clone)]
pub struct Transaction {
    version: i32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    lock_time: u32,
    has_witness: bool,
    raw: Vec<u8>,
    hash: OnceLock<Hash>,
}

impl Transaction {
    /// Parse a complete transaction; trailing bytes are an error
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_network(bytes, Network::Mainnet)
    }

    /// As `from_bytes`, deriving output addresses for `network`
    pub fn from_bytes_with_network(bytes: &[u8], network: Network) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let tx = Self::read_from(&mut reader, network)?;
        if !reader.is_empty() {
            return Err(TxError::MalformedInput(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| TxError::MalformedInput(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Read one transaction from the reader's current position
    pub fn read_from(reader: &mut Reader<'_>, network: Network) -> Result<Self> {
        let start = reader.position();
        let version = reader.read_i32_le()?;

        // A zero input count is the segwit marker
        let mut input_count = reader.read_count()?;
        let has_witness = input_count == WITNESS_MARKER as usize;
        if has_witness {
            let flag = reader.read_u8()?;
            if flag != WITNESS_FLAG {
                return Err(TxError::MalformedInput(format!(
                    "invalid witness flag {:#04x}",
                    flag
                )));
            }
            input_count = reader.read_count()?;
        }

        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let previous_tx_hash = reader.read_array::<32>()?;
            let previous_out_index = reader.read_u32_le()?;
            let script_sig = Script::unclassified(reader.read_var_bytes()?.to_vec());
            let sequence = reader.read_u32_le()?;
            inputs.push(TxInput::new(previous_tx_hash, previous_out_index, script_sig, sequence));
        }

        let output_count = reader.read_count()?;
        let mut outputs = Vec::with_capacity(output_count);
        for index in 0..output_count {
            let value = reader.read_u64_le()?;
            let script_pubkey = Script::with_network(reader.read_var_bytes()?.to_vec(), network);
            outputs.push(TxOutput {
                index: index as u32,
                value,
                script_pubkey,
            });
        }

        // Witness stacks are skipped: kept in the raw bytes only
        if has_witness {
            for _ in 0..input_count {
                let items = reader.read_count()?;
                for _ in 0..items {
                    reader.read_var_bytes()?;
                }
            }
        }

        let lock_time = reader.read_u32_le()?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            has_witness,
            raw: reader.consumed_since(start).to_vec(),
            hash: OnceLock::new(),
        })
    }

    /// Serialize the given fields and parse the result back
    pub fn from_parts(
        version: i32,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        lock_time: u32,
        network: Network,
    ) -> Result<Self> {
        let mut w = Writer::new();
        write_legacy(&mut w, version, &inputs, &outputs, lock_time, |w, _, input| {
            input.write_with(w, input.script_sig.as_bytes())
        });
        Self::from_bytes_with_network(&w.into_bytes(), network)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn output(&self, index: u32) -> Option<&TxOutput> {
        self.outputs.get(index as usize)
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn has_witness(&self) -> bool {
        self.has_witness
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].outpoint().is_null()
    }

    /// Serialized size, witness included
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value))
    }

    /// The exact bytes this transaction was parsed from
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.raw)
    }

    /// Serialization without the segwit marker, flag and witness stacks
    pub fn legacy_bytes(&self) -> Vec<u8> {
        if !self.has_witness {
            return self.raw.clone();
        }
        self.serialize_legacy(|w, _, input| input.write_with(w, input.script_sig.as_bytes()))
    }

    /// Double SHA-256 of the legacy serialization, in hash order
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| sha256d(&self.legacy_bytes()))
    }

    /// Transaction id in display order
    pub fn hash_hex(&self) -> String {
        to_display_hex(&self.hash())
    }

    /// Legacy SIGHASH_ALL digest for spending `previous_script_pubkey` with input `input_index`.
    ///
    /// Every input's scriptSig is replaced: the target's by the previous
    /// output's scriptPubKey, all others by an empty script. The sighash type
    /// is appended as a little-endian u32 before double SHA-256.
    pub fn signature_hash(
        &self,
        input_index: usize,
        previous_script_pubkey: &Script,
    ) -> Result<Hash> {
        if input_index >= self.inputs.len() {
            return Err(TxError::MalformedInput(format!(
                "input index {} out of range: transaction has {} inputs",
                input_index,
                self.inputs.len()
            )));
        }

        let mut bytes = self.serialize_legacy(|w, i, input| {
            if i == input_index {
                input.write_with(w, previous_script_pubkey.as_bytes())
            } else {
                input.write_with(w, &[])
            }
        });
        bytes.extend_from_slice(&(SIGHASH_ALL as u32).to_le_bytes());
        let hash = sha256d(&bytes);
        trace!(input = input_index, sighash = %to_display_hex(&hash), "computed signature hash");
        Ok(hash)
    }

    /// Verify input `input_index` against the output it spends, found in `previous`
    pub fn verify_input<P>(&self, input_index: usize, previous: &P) -> Result<()>
    where
        P: PreviousOutputs + ?Sized,
    {
        let input = self.inputs.get(input_index).ok_or_else(|| {
            TxError::MalformedInput(format!(
                "input index {} out of range: transaction has {} inputs",
                input_index,
                self.inputs.len()
            ))
        })?;

        // 1. Resolve the previous transaction and output
        let previous_tx = previous
            .find_transaction(&input.previous_tx_hash)
            .ok_or_else(|| TxError::UnresolvedPrevious(to_display_hex(&input.previous_tx_hash)))?;
        let output = previous_tx.output(input.previous_out_index).ok_or(
            TxError::OutputIndexOutOfRange {
                index: input.previous_out_index,
                count: previous_tx.outputs.len(),
            },
        )?;

        // 2. Digest this input commits to
        let hash = self.signature_hash(input_index, &output.script_pubkey)?;

        // 3. Check the scriptSig against the previous scriptPubKey
        match verify(&input.script_sig, &output.script_pubkey, &hash) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(
                    tx = %self.hash_hex(),
                    input = input_index,
                    "input signature verification failed"
                );
                Err(TxError::SignatureInvalid(format!(
                    "input {} does not satisfy output {}:{}",
                    input_index,
                    to_display_hex(&input.previous_tx_hash),
                    input.previous_out_index
                )))
            }
            Err(e) => {
                warn!(
                    tx = %self.hash_hex(),
                    input = input_index,
                    error = %e,
                    "input verification error"
                );
                Err(e)
            }
        }
    }

    /// Verify every input in order, stopping at the first failure
    pub fn verify_all_inputs<P>(&self, previous: &P) -> Result<()>
    where
        P: PreviousOutputs + ?Sized,
    {
        (0..self.inputs.len()).try_for_each(|i| self.verify_input(i, previous))
    }

    fn serialize_legacy<F>(&self, write_input: F) -> Vec<u8>
    where
        F: FnMut(&mut Writer, usize, &TxInput),
    {
        let mut w = Writer::with_capacity(self.raw.len() + 4);
        write_legacy(
            &mut w,
            self.version,
            &self.inputs,
            &self.outputs,
            self.lock_time,
            write_input,
        );
        w.into_bytes()
    }
}

fn write_legacy<F>(
    w: &mut Writer,
    version: i32,
    inputs: &[TxInput],
    outputs: &[TxOutput],
    lock_time: u32,
    mut write_input: F,
) where
    F: FnMut(&mut Writer, usize, &TxInput),
{
    w.write_i32_le(version);
    w.write_varint(inputs.len().into());
    for (i, input) in inputs.iter().enumerate() {
        write_input(w, i, input);
    }
    w.write_varint(outputs.len().into());
    for output in outputs {
        output.write_to(w);
    }
    w.write_u32_le(lock_time);
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Transaction {}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Transaction::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Somewhere previous transactions can be looked up by hash
pub trait PreviousOutputs {
    fn find_transaction(&self, hash: &Hash) -> Option<&Transaction>;
}

impl PreviousOutputs for Transaction {
    fn find_transaction(&self, hash: &Hash) -> Option<&Transaction> {
        (self.hash() == *hash).then_some(self)
    }
}

impl PreviousOutputs for [Transaction] {
    fn find_transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.iter().find(|tx| tx.hash() == *hash)
    }
}

impl PreviousOutputs for Vec<Transaction> {
    fn find_transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.as_slice().find_transaction(hash)
    }
}
