//! Transaction wire format: legacy and segwit encodings, identifiers and weight

use crate::constants::*;
use crate::encoding::{write_var_bytes, write_varint, Decodable, Encodable, Reader};
use crate::error::{Result, SigningError};
use crate::hashes::sha256d;
use crate::types::*;

impl Encodable for OutPoint {
    fn encode_to(&self, buf: &mut ByteString) {
        buf.extend_from_slice(&self.hash);
        buf.extend_from_slice(&self.index.to_le_bytes());
    }
}

impl Decodable for OutPoint {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(OutPoint {
            hash: reader.read_hash()?,
            index: reader.read_u32_le()?,
        })
    }
}

impl Encodable for LockTime {
    fn encode_to(&self, buf: &mut ByteString) {
        buf.extend_from_slice(&self.to_consensus_u32().to_le_bytes());
    }
}

impl Decodable for LockTime {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(LockTime::from_consensus(reader.read_u32_le()?))
    }
}

/// Outpoint, scriptSig and sequence; the witness is carried by the
/// transaction's segwit section.
impl Encodable for TxIn {
    fn encode_to(&self, buf: &mut ByteString) {
        self.prevout.encode_to(buf);
        write_var_bytes(&self.script_sig, buf);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
    }
}

impl Decodable for TxIn {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(TxIn {
            prevout: OutPoint::decode_from(reader)?,
            script_sig: reader.read_var_bytes()?,
            sequence: reader.read_u32_le()?,
            witness: Vec::new(),
        })
    }
}

impl Encodable for TxOut {
    fn encode_to(&self, buf: &mut ByteString) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(&self.script_pubkey, buf);
    }
}

impl Decodable for TxOut {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(TxOut {
            value: reader.read_u64_le()?,
            script_pubkey: reader.read_var_bytes()?,
        })
    }
}

/// Segwit encoding when any input carries a witness, legacy otherwise.
impl Encodable for Transaction {
    fn encode_to(&self, buf: &mut ByteString) {
        serialize_transaction(self, self.has_witness(), buf);
    }
}

impl Decodable for Transaction {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self> {
        deserialize_transaction(reader)
    }
}

/// Serialize a transaction, with the segwit marker/flag and witness section
/// when `include_witness` is set.
///
/// Serialize(tx) = version ‖ [0x00 0x01] ‖ |ins| ‖ ins ‖ |outs| ‖ outs ‖
/// [witnesses] ‖ lock_time
pub fn serialize_transaction(tx: &Transaction, include_witness: bool, buf: &mut ByteString) {
    buf.extend_from_slice(&tx.version().to_le_bytes());
    if include_witness {
        buf.push(SEGWIT_MARKER);
        buf.push(SEGWIT_FLAG);
    }

    write_varint(tx.inputs().len() as u64, buf);
    for input in tx.inputs() {
        input.encode_to(buf);
    }

    write_varint(tx.outputs().len() as u64, buf);
    for output in tx.outputs() {
        output.encode_to(buf);
    }

    if include_witness {
        for input in tx.inputs() {
            write_varint(input.witness.len() as u64, buf);
            for item in &input.witness {
                write_var_bytes(item, buf);
            }
        }
    }

    tx.lock_time().encode_to(buf);
}

/// Serialization without witness data; the form hashed for the txid.
pub fn serialize_legacy(tx: &Transaction) -> ByteString {
    let mut buf = Vec::new();
    serialize_transaction(tx, false, &mut buf);
    buf
}

/// Parse a transaction in either legacy or segwit encoding.
pub fn deserialize_transaction(reader: &mut Reader<'_>) -> Result<Transaction> {
    let version = reader.read_i32_le()?;

    // A zero input count is the segwit marker; real transactions never have one.
    let segwit = reader.peek_u8()? == SEGWIT_MARKER;
    if segwit {
        reader.read_u8()?;
        let flag = reader.read_u8()?;
        if flag != SEGWIT_FLAG {
            return Err(SigningError::MalformedEncoding(format!(
                "unsupported segwit flag {:#04x}",
                flag
            )));
        }
    }

    // Each input is at least 41 bytes, each output at least 9
    let input_count = reader.read_length()?;
    let mut inputs = Vec::with_capacity(input_count.min(reader.remaining() / 41));
    for _ in 0..input_count {
        inputs.push(TxIn::decode_from(reader)?);
    }

    let output_count = reader.read_length()?;
    let mut outputs = Vec::with_capacity(output_count.min(reader.remaining() / 9));
    for _ in 0..output_count {
        outputs.push(TxOut::decode_from(reader)?);
    }

    if segwit {
        for input in inputs.iter_mut() {
            let items = reader.read_length()?;
            let mut witness = Vec::with_capacity(items);
            for _ in 0..items {
                witness.push(reader.read_var_bytes()?);
            }
            input.witness = witness;
        }
        if inputs.iter().all(|input| input.witness.is_empty()) {
            return Err(SigningError::MalformedEncoding(
                "segwit encoding without witness data".to_string(),
            ));
        }
    }

    let lock_time = LockTime::decode_from(reader)?;
    Transaction::new(version, inputs, outputs, lock_time)
}

/// Decode a complete transaction, optionally accepting non-minimal varints.
pub fn decode_transaction(bytes: &[u8], require_canonical: bool) -> Result<Transaction> {
    let mut reader = Reader::with_canonical(bytes, require_canonical);
    let tx = deserialize_transaction(&mut reader)?;
    reader.finish()?;
    Ok(tx)
}

/// Transaction id: SHA256d of the witness-stripped serialization (wire order).
pub fn compute_txid(tx: &Transaction) -> Hash {
    sha256d(&serialize_legacy(tx))
}

/// Witness transaction id; equals the txid when there is no witness.
pub fn compute_wtxid(tx: &Transaction) -> Hash {
    sha256d(&tx.encode())
}

/// Weight(tx) = 3 × |Serialize(tx ∖ witness)| + |Serialize(tx)|
pub fn calculate_transaction_weight(tx: &Transaction) -> u64 {
    let base_size = serialize_legacy(tx).len() as u64;
    let total_size = tx.encode().len() as u64;
    base_size * (WITNESS_SCALE_FACTOR - 1) + total_size
}

/// Virtual size: weight / 4 rounded up
pub fn calculate_virtual_size(tx: &Transaction) -> u64 {
    (calculate_transaction_weight(tx) + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
}
