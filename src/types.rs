//! Core types for transaction pre-signing

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::constants::LOCKTIME_THRESHOLD;
use crate::encoding::serde_hex;
use crate::error::{Result, SigningError};

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Witness stack of a single input
pub type Witness = Vec<ByteString>;

/// Claims are identified by the outpoint of the input they sign.
pub type ClaimId = OutPoint;

/// Reference to a previous transaction output.
///
/// `hash` is stored in wire (internal) byte order; the conventional txid
/// display reverses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    #[serde(with = "serde_hex::hash")]
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// Parses a txid as displayed by block explorers and node RPCs.
    pub fn from_txid_hex(txid: &str, index: u32) -> Result<Self> {
        let mut hash = [0u8; 32];
        hex::decode_to_slice(txid, &mut hash)
            .map_err(|e| SigningError::InvalidParameters(format!("invalid txid {}: {}", txid, e)))?;
        hash.reverse();
        Ok(Self { hash, index })
    }

    pub fn txid_hex(&self) -> String {
        let mut display = self.hash;
        display.reverse();
        hex::encode(display)
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid_hex(), self.index)
    }
}

/// Transaction lock time: a block height below `LOCKTIME_THRESHOLD`, a Unix
/// timestamp at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockTime(u32);

impl LockTime {
    pub const ZERO: LockTime = LockTime(0);

    pub fn from_consensus(value: u32) -> Self {
        LockTime(value)
    }

    pub fn from_height(height: u32) -> Result<Self> {
        if height >= LOCKTIME_THRESHOLD {
            return Err(SigningError::InvalidParameters(format!(
                "block height {} is not below the lock time threshold",
                height
            )));
        }
        Ok(LockTime(height))
    }

    pub fn from_timestamp(timestamp: u32) -> Result<Self> {
        if timestamp < LOCKTIME_THRESHOLD {
            return Err(SigningError::InvalidParameters(format!(
                "timestamp {} is below the lock time threshold",
                timestamp
            )));
        }
        Ok(LockTime(timestamp))
    }

    pub fn to_consensus_u32(self) -> u32 {
        self.0
    }

    pub fn is_block_height(self) -> bool {
        self.0 < LOCKTIME_THRESHOLD
    }

    pub fn is_timestamp(self) -> bool {
        !self.is_block_height()
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    pub prevout: OutPoint,
    #[serde(with = "serde_hex", default)]
    pub script_sig: ByteString,
    pub sequence: u32,
    #[serde(with = "serde_hex::stack", default)]
    pub witness: Witness,
}

impl TxIn {
    /// Unsigned input with an empty script and witness.
    pub fn new(prevout: OutPoint, sequence: u32) -> Self {
        Self {
            prevout,
            script_sig: Vec::new(),
            sequence,
            witness: Vec::new(),
        }
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    pub value: u64,
    #[serde(with = "serde_hex")]
    pub script_pubkey: ByteString,
}

/// Transaction: ordered inputs, ordered outputs, version and lock time.
///
/// Built only through [`Transaction::new`]; every instance has at least one
/// input and one output, distinct outpoints and an output total that fits
/// in 64 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    version: i32,
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
    lock_time: LockTime,
}

impl Transaction {
    pub fn new(
        version: i32,
        inputs: Vec<TxIn>,
        outputs: Vec<TxOut>,
        lock_time: LockTime,
    ) -> Result<Self> {
        if inputs.is_empty() {
            return Err(SigningError::EmptyInputs);
        }
        if outputs.is_empty() {
            return Err(SigningError::EmptyOutputs);
        }

        outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value))
            .ok_or(SigningError::ValueOverflow)?;

        let mut seen = HashSet::with_capacity(inputs.len());
        for input in &inputs {
            if !seen.insert(&input.prevout) {
                return Err(SigningError::InvalidParameters(format!(
                    "outpoint {} is spent twice",
                    input.prevout
                )));
            }
        }

        Ok(Self { version, inputs, outputs, lock_time })
    }

    /// Builds a signing snapshot that does not have to be a valid transaction
    /// (legacy sighash serializes copies with no outputs or placeholder values).
    pub(crate) fn snapshot(
        version: i32,
        inputs: Vec<TxIn>,
        outputs: Vec<TxOut>,
        lock_time: LockTime,
    ) -> Self {
        Self { version, inputs, outputs, lock_time }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn inputs(&self) -> &[TxIn] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn lock_time(&self) -> LockTime {
        self.lock_time
    }

    /// Position of the input spending `outpoint`.
    pub fn input_index_of(&self, outpoint: &OutPoint) -> Option<usize> {
        self.inputs.iter().position(|input| &input.prevout == outpoint)
    }

    pub fn total_output_value(&self) -> u64 {
        // Checked at construction
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// New transaction with the same skeleton and replaced inputs.
    pub fn with_inputs(&self, inputs: Vec<TxIn>) -> Result<Self> {
        Self::new(self.version, inputs, self.outputs.clone(), self.lock_time)
    }

    pub fn into_parts(self) -> (i32, Vec<TxIn>, Vec<TxOut>, LockTime) {
        (self.version, self.inputs, self.outputs, self.lock_time)
    }
}

/// Which digest algorithm a claim is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningMethod {
    Legacy,
    Segwit,
}

/// Request to sign one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInClaim {
    /// Outpoint of the input being signed
    pub outpoint: OutPoint,
    /// Locking script of the output being spent
    #[serde(with = "serde_hex")]
    pub script_pubkey: ByteString,
    /// Redeem or witness script for P2SH / P2WSH spends
    #[serde(with = "serde_hex::option", default, skip_serializing_if = "Option::is_none")]
    pub script_code: Option<ByteString>,
    /// Value of the output being spent; committed to by segwit digests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    pub sighash_type: u32,
    pub signing_method: SigningMethod,
}

impl TxInClaim {
    /// Claim with the signing method inferred from the locking script.
    pub fn new(
        outpoint: OutPoint,
        script_pubkey: ByteString,
        value: Option<u64>,
        sighash_type: u32,
    ) -> Self {
        let signing_method = Self::infer_method(&script_pubkey);
        Self {
            outpoint,
            script_pubkey,
            script_code: None,
            value,
            sighash_type,
            signing_method,
        }
    }

    pub fn with_script_code(mut self, script_code: ByteString) -> Self {
        self.script_code = Some(script_code);
        self
    }

    pub fn with_signing_method(mut self, signing_method: SigningMethod) -> Self {
        self.signing_method = signing_method;
        self
    }

    /// Native witness programs sign with the segwit digest; everything else
    /// (including P2SH, whose redeem script is not visible here) with legacy.
    pub fn infer_method(script_pubkey: &[u8]) -> SigningMethod {
        use crate::script::{classify, ScriptKind};
        match classify(script_pubkey) {
            ScriptKind::P2wpkh(_) | ScriptKind::P2wsh(_) => SigningMethod::Segwit,
            _ => SigningMethod::Legacy,
        }
    }
}

/// Digest to be signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sighash(#[serde(with = "serde_hex::hash")] pub Hash);

impl Sighash {
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for Sighash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Sighash computed for one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSighash {
    pub claim: ClaimId,
    pub sighash: Sighash,
    pub signing_method: SigningMethod,
    pub sighash_type: u32,
}

/// Ordered sighashes, one per claim, in the order the claims were supplied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreSigningOutput {
    pub sighashes: Vec<ClaimSighash>,
}

/// Final unlocking data for one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Unlocking {
    /// scriptSig `<signature> <public key>`
    P2pkh {
        #[serde(with = "serde_hex")]
        signature: ByteString,
        #[serde(with = "serde_hex", rename = "publicKey")]
        public_key: ByteString,
    },
    /// Witness `[signature, public key]`, empty scriptSig
    P2wpkh {
        #[serde(with = "serde_hex")]
        signature: ByteString,
        #[serde(with = "serde_hex", rename = "publicKey")]
        public_key: ByteString,
    },
    /// Witness `[signature, public key]`, scriptSig pushing the P2WPKH program
    P2shP2wpkh {
        #[serde(with = "serde_hex")]
        signature: ByteString,
        #[serde(with = "serde_hex", rename = "publicKey")]
        public_key: ByteString,
    },
    /// Caller-assembled scriptSig and witness
    Raw {
        #[serde(with = "serde_hex", rename = "scriptSig", default)]
        script_sig: ByteString,
        #[serde(with = "serde_hex::stack", default)]
        witness: Witness,
    },
}

/// Externally produced signature data for one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignature {
    pub claim: ClaimId,
    pub unlocking: Unlocking,
}

/// Broadcast-ready transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedTransaction {
    #[serde(with = "serde_hex")]
    pub encoded: ByteString,
    #[serde(with = "serde_hex::hash")]
    pub txid: Hash,
    #[serde(with = "serde_hex::hash")]
    pub wtxid: Hash,
    pub weight: u64,
    pub vsize: u64,
}

impl SerializedTransaction {
    /// Txid in display (reversed) byte order.
    pub fn txid_hex(&self) -> String {
        let mut display = self.txid;
        display.reverse();
        hex::encode(display)
    }
}
