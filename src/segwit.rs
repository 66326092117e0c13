//! BIP143 signature hashing for segwit and replay-protected (FORKID) inputs

use tracing::trace;

use crate::encoding::{write_var_bytes, Encodable};
use crate::error::{Result, SigningError};
use crate::hashes::{sha256d, sha256d_concat};
use crate::sighash::{SighashBase, SighashType};
use crate::types::*;

/// Transaction-wide BIP143 midstates, computed once and shared by every claim
/// on the same transaction.
///
/// The cache borrows the transaction it was built from and refuses to hash
/// any other one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SighashCache<'a> {
    tx: &'a Transaction,
    hash_prevouts: Hash,
    hash_sequence: Hash,
    hash_outputs: Hash,
}

impl<'a> SighashCache<'a> {
    pub fn new(tx: &'a Transaction) -> Self {
        let prevouts: Vec<ByteString> = tx.inputs().iter().map(|i| i.prevout.encode()).collect();
        let sequences: Vec<[u8; 4]> =
            tx.inputs().iter().map(|i| i.sequence.to_le_bytes()).collect();
        let outputs: Vec<ByteString> = tx.outputs().iter().map(|o| o.encode()).collect();

        Self {
            tx,
            hash_prevouts: sha256d_concat(prevouts.iter().map(|p| p.as_slice())),
            hash_sequence: sha256d_concat(sequences.iter().map(|s| s.as_slice())),
            hash_outputs: sha256d_concat(outputs.iter().map(|o| o.as_slice())),
        }
    }

    pub fn hash_prevouts(&self) -> &Hash {
        &self.hash_prevouts
    }

    pub fn hash_sequence(&self) -> &Hash {
        &self.hash_sequence
    }

    pub fn hash_outputs(&self) -> &Hash {
        &self.hash_outputs
    }

    pub fn transaction(&self) -> &'a Transaction {
        self.tx
    }

    /// Fails unless `tx` is the transaction the midstates were computed for.
    pub fn check_transaction(&self, tx: &Transaction) -> Result<()> {
        if std::ptr::eq(self.tx, tx) || self.tx == tx {
            Ok(())
        } else {
            Err(SigningError::InvalidParameters(
                "sighash cache was built for a different transaction".to_string(),
            ))
        }
    }
}

/// BIP143 preimage:
///
/// version ‖ hashPrevouts ‖ hashSequence ‖ outpoint ‖ scriptCode ‖ value ‖
/// nSequence ‖ hashOutputs ‖ nLockTime ‖ sighash type
///
/// The type is written as all 32 bits, so FORKID types carry their fork id in
/// the upper 24 bits.
pub fn segwit_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    value: u64,
    sighash_type: SighashType,
    cache: &SighashCache,
) -> Result<ByteString> {
    cache.check_transaction(tx)?;
    let input = tx.inputs().get(input_index).ok_or_else(|| {
        SigningError::InvalidParameters(format!(
            "input index {} out of range (transaction has {} inputs)",
            input_index,
            tx.inputs().len()
        ))
    })?;
    let base = sighash_type.base();
    let anyone_can_pay = sighash_type.anyone_can_pay();

    let hash_prevouts = if anyone_can_pay { [0u8; 32] } else { cache.hash_prevouts };

    let hash_sequence = if !anyone_can_pay && base == SighashBase::All {
        cache.hash_sequence
    } else {
        [0u8; 32]
    };

    let hash_outputs = match base {
        SighashBase::All => cache.hash_outputs,
        SighashBase::Single if input_index < tx.outputs().len() => {
            sha256d(&tx.outputs()[input_index].encode())
        }
        _ => [0u8; 32],
    };

    trace!(
        hash_prevouts = %hex::encode(hash_prevouts),
        hash_sequence = %hex::encode(hash_sequence),
        hash_outputs = %hex::encode(hash_outputs),
        "bip143 components"
    );

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version().to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    input.prevout.encode_to(&mut preimage);
    write_var_bytes(script_code, &mut preimage);
    preimage.extend_from_slice(&value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    tx.lock_time().encode_to(&mut preimage);
    preimage.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    Ok(preimage)
}

/// BIP143 signature hash: SHA256d of [`segwit_preimage`].
pub fn segwit_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    value: u64,
    sighash_type: SighashType,
    cache: &SighashCache,
) -> Result<Sighash> {
    let preimage = segwit_preimage(tx, input_index, script_code, value, sighash_type, cache)?;
    Ok(Sighash(sha256d(&preimage)))
}
