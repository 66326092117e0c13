//! Signature hash computation
//!
//! Legacy digests serialize a modified snapshot of the transaction; segwit and
//! replay-protected (FORKID) digests use the BIP143 preimage in `segwit`.

use tracing::{debug, trace};

use crate::constants::*;
use crate::error::{Result, SigningError};
use crate::hashes::sha256d;
use crate::script::{classify, segwit_script_code, strip_code_separators, ScriptKind};
use crate::segwit::{segwit_sighash, SighashCache};
use crate::transaction::serialize_legacy;
use crate::types::*;

/// Output selection of a sighash type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighashBase {
    All,
    None,
    Single,
}

/// Validated sighash type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SighashType {
    raw: u32,
    base: SighashBase,
}

impl SighashType {
    pub const ALL: SighashType = SighashType { raw: SIGHASH_ALL, base: SighashBase::All };

    /// Accepts ALL, NONE or SINGLE with optional ANYONECANPAY and FORKID bits.
    /// The upper 24 bits may only carry a fork id when FORKID is set.
    pub fn from_u32(raw: u32) -> Result<Self> {
        let low = raw & 0xff;
        let fork_id = raw >> 8;
        let known_bits = SIGHASH_BASE_MASK | SIGHASH_FORKID | SIGHASH_ANYONECANPAY;

        if low & !known_bits != 0 || (fork_id != 0 && low & SIGHASH_FORKID == 0) {
            return Err(SigningError::UnknownSighashFlag(raw));
        }
        let base = match low & SIGHASH_BASE_MASK {
            SIGHASH_ALL => SighashBase::All,
            SIGHASH_NONE => SighashBase::None,
            SIGHASH_SINGLE => SighashBase::Single,
            _ => return Err(SigningError::UnknownSighashFlag(raw)),
        };
        Ok(SighashType { raw, base })
    }

    pub fn to_u32(self) -> u32 {
        self.raw
    }

    pub fn base(self) -> SighashBase {
        self.base
    }

    pub fn anyone_can_pay(self) -> bool {
        self.raw & SIGHASH_ANYONECANPAY != 0
    }

    pub fn has_fork_id(self) -> bool {
        self.raw & SIGHASH_FORKID != 0
    }

    /// Fork id carried in the upper 24 bits.
    pub fn fork_id(self) -> u32 {
        self.raw >> 8
    }

    /// Trailing byte appended to DER signatures.
    pub fn signature_byte(self) -> u8 {
        (self.raw & 0xff) as u8
    }
}

/// Legacy signature hash.
///
/// `SIGHASH_SINGLE` without an output at `input_index` returns
/// [`SIGHASH_SINGLE_BUG`] without hashing anything.
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: SighashType,
) -> Result<Sighash> {
    check_input_index(tx, input_index)?;
    if sighash_type.base() == SighashBase::Single && input_index >= tx.outputs().len() {
        debug!(input_index, "SIGHASH_SINGLE without matching output");
        return Ok(Sighash(SIGHASH_SINGLE_BUG));
    }
    let preimage = legacy_preimage(tx, input_index, script_code, sighash_type)?;
    trace!(preimage = %hex::encode(&preimage), "legacy preimage");
    Ok(Sighash(sha256d(&preimage)))
}

/// Serialized signing snapshot followed by the 4-byte sighash type.
pub fn legacy_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: SighashType,
) -> Result<ByteString> {
    check_input_index(tx, input_index)?;
    if sighash_type.base() == SighashBase::Single && input_index >= tx.outputs().len() {
        return Err(SigningError::InvalidParameters(format!(
            "SIGHASH_SINGLE input {} has no matching output",
            input_index
        )));
    }

    let script_code = strip_code_separators(script_code);
    let snapshot = legacy_snapshot(tx, input_index, &script_code, sighash_type);
    let mut preimage = serialize_legacy(&snapshot);
    preimage.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    Ok(preimage)
}

/// Copy of `tx` as the legacy algorithm serializes it.
fn legacy_snapshot(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: SighashType,
) -> Transaction {
    let base = sighash_type.base();
    let zero_other_sequences = matches!(base, SighashBase::None | SighashBase::Single);

    let inputs: Vec<TxIn> = tx
        .inputs()
        .iter()
        .enumerate()
        .filter(|(i, _)| !sighash_type.anyone_can_pay() || *i == input_index)
        .map(|(i, input)| {
            if i == input_index {
                TxIn {
                    prevout: input.prevout.clone(),
                    script_sig: script_code.to_vec(),
                    sequence: input.sequence,
                    witness: Vec::new(),
                }
            } else {
                TxIn {
                    prevout: input.prevout.clone(),
                    script_sig: Vec::new(),
                    sequence: if zero_other_sequences { 0 } else { input.sequence },
                    witness: Vec::new(),
                }
            }
        })
        .collect();

    let outputs: Vec<TxOut> = match base {
        SighashBase::All => tx.outputs().to_vec(),
        SighashBase::None => Vec::new(),
        SighashBase::Single => tx.outputs()[..=input_index]
            .iter()
            .enumerate()
            .map(|(i, output)| {
                if i == input_index {
                    output.clone()
                } else {
                    // value -1, empty script
                    TxOut { value: u64::MAX, script_pubkey: Vec::new() }
                }
            })
            .collect(),
    };

    Transaction::snapshot(tx.version(), inputs, outputs, tx.lock_time())
}

fn check_input_index(tx: &Transaction, input_index: usize) -> Result<()> {
    if input_index >= tx.inputs().len() {
        return Err(SigningError::InvalidParameters(format!(
            "input index {} out of range (transaction has {} inputs)",
            input_index,
            tx.inputs().len()
        )));
    }
    Ok(())
}

/// Index of the input a claim signs.
pub fn resolve_claim(tx: &Transaction, claim: &TxInClaim) -> Result<usize> {
    tx.input_index_of(&claim.outpoint)
        .ok_or_else(|| SigningError::UnresolvedClaim(claim.outpoint.clone()))
}

/// Compute the sighash for one claim.
///
/// FORKID types always use the BIP143 layout; otherwise the claim's signing
/// method selects legacy or BIP143. BIP143 digests fail unless `cache` was
/// built from `tx`.
pub fn signature_hash(
    tx: &Transaction,
    claim: &TxInClaim,
    cache: &SighashCache,
) -> Result<Sighash> {
    let sighash_type = SighashType::from_u32(claim.sighash_type)?;
    let input_index = resolve_claim(tx, claim)?;
    let kind = classify(&claim.script_pubkey);

    let sighash = if sighash_type.has_fork_id() || claim.signing_method == SigningMethod::Segwit {
        let value = claim
            .value
            .ok_or_else(|| SigningError::MissingValueCommitment(claim.outpoint.clone()))?;
        let script_code = match (&claim.script_code, &kind) {
            (Some(code), _) => segwit_script_code(code),
            (None, ScriptKind::P2sh(_)) | (None, ScriptKind::P2wsh(_)) => {
                return Err(missing_script_code(claim, &kind));
            }
            (None, _) => segwit_script_code(&claim.script_pubkey),
        };
        segwit_sighash(tx, input_index, &script_code, value, sighash_type, cache)?
    } else {
        let script_code = match (&claim.script_code, &kind) {
            (Some(code), _) => code.clone(),
            (None, ScriptKind::P2sh(_)) => return Err(missing_script_code(claim, &kind)),
            (None, _) => claim.script_pubkey.clone(),
        };
        legacy_sighash(tx, input_index, &script_code, sighash_type)?
    };

    debug!(
        claim = %claim.outpoint,
        input_index,
        method = ?claim.signing_method,
        sighash_type = claim.sighash_type,
        sighash = %sighash,
        "computed sighash"
    );
    Ok(sighash)
}

fn missing_script_code(claim: &TxInClaim, kind: &ScriptKind) -> SigningError {
    SigningError::InvalidParameters(format!(
        "claim {} spends a {:?} output and needs an explicit script code",
        claim.outpoint, kind
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::p2pkh_for_public_key;

    fn create_test_transaction(inputs: usize, outputs: usize) -> Transaction {
        Transaction::new(
            1,
            (0..inputs)
                .map(|i| TxIn::new(OutPoint::new([i as u8 + 1; 32], i as u32), 0xfffffffd))
                .collect(),
            (0..outputs)
                .map(|i| TxOut { value: 1000 * (i as u64 + 1), script_pubkey: vec![0x51, i as u8] })
                .collect(),
            LockTime::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn test_sighash_type_parsing() {
        assert_eq!(SighashType::from_u32(0x01).unwrap().base(), SighashBase::All);
        assert_eq!(SighashType::from_u32(0x02).unwrap().base(), SighashBase::None);
        assert_eq!(SighashType::from_u32(0x83).unwrap().base(), SighashBase::Single);
        assert!(SighashType::from_u32(0x81).unwrap().anyone_can_pay());
        assert!(SighashType::from_u32(0x41).unwrap().has_fork_id());

        let btg = SighashType::from_u32(0x4f41).unwrap();
        assert_eq!(btg.fork_id(), 0x4f);
        assert_eq!(btg.signature_byte(), 0x41);
    }

    #[test]
    fn test_sighash_type_rejects_unknown() {
        for raw in [0x00, 0x04, 0x1f, 0x21, 0x84, 0x0101, 0xc0] {
            assert!(
                matches!(
                    SighashType::from_u32(raw),
                    Err(SigningError::UnknownSighashFlag(r)) if r == raw
                ),
                "{:#x} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_single_without_output_returns_one() {
        let tx = create_test_transaction(3, 1);
        let single = SighashType::from_u32(SIGHASH_SINGLE).unwrap();
        let hash = legacy_sighash(&tx, 2, &[0x51], single).unwrap();
        assert_eq!(hash.0, SIGHASH_SINGLE_BUG);
        assert!(legacy_preimage(&tx, 2, &[0x51], single).is_err());
    }

    #[test]
    fn test_legacy_snapshot_none_clears_outputs_and_sequences() {
        let tx = create_test_transaction(2, 2);
        let none = SighashType::from_u32(SIGHASH_NONE).unwrap();
        let snapshot = legacy_snapshot(&tx, 1, &[0xac], none);

        assert!(snapshot.outputs().is_empty());
        assert_eq!(snapshot.inputs()[0].sequence, 0);
        assert!(snapshot.inputs()[0].script_sig.is_empty());
        assert_eq!(snapshot.inputs()[1].sequence, 0xfffffffd);
        assert_eq!(snapshot.inputs()[1].script_sig, vec![0xac]);
    }

    #[test]
    fn test_legacy_snapshot_single_blanks_earlier_outputs() {
        let tx = create_test_transaction(3, 3);
        let single = SighashType::from_u32(SIGHASH_SINGLE).unwrap();
        let snapshot = legacy_snapshot(&tx, 1, &[0xac], single);

        assert_eq!(snapshot.outputs().len(), 2);
        assert_eq!(snapshot.outputs()[0].value, u64::MAX);
        assert!(snapshot.outputs()[0].script_pubkey.is_empty());
        assert_eq!(snapshot.outputs()[1], tx.outputs()[1]);
    }

    #[test]
    fn test_legacy_snapshot_anyone_can_pay_keeps_one_input() {
        let tx = create_test_transaction(3, 3);
        let acp = SighashType::from_u32(SIGHASH_ALL | SIGHASH_ANYONECANPAY).unwrap();
        let snapshot = legacy_snapshot(&tx, 2, &[0xac], acp);

        assert_eq!(snapshot.inputs().len(), 1);
        assert_eq!(snapshot.inputs()[0].prevout, tx.inputs()[2].prevout);
        assert_eq!(snapshot.outputs(), tx.outputs());
    }

    #[test]
    fn test_legacy_preimage_ends_with_type() {
        let tx = create_test_transaction(1, 1);
        let preimage = legacy_preimage(&tx, 0, &[0xac], SighashType::ALL).unwrap();
        assert_eq!(&preimage[preimage.len() - 4..], &[0x01, 0x00, 0x00, 0x00]);
        let sighash = legacy_sighash(&tx, 0, &[0xac], SighashType::ALL).unwrap();
        assert_eq!(sha256d(&preimage), sighash.0);
    }

    #[test]
    fn test_legacy_ignores_code_separators() {
        let tx = create_test_transaction(1, 1);
        let plain = legacy_sighash(&tx, 0, &[0x76, 0xac], SighashType::ALL).unwrap();
        let separated = legacy_sighash(&tx, 0, &[0x76, 0xab, 0xac], SighashType::ALL).unwrap();
        assert_eq!(plain, separated);
    }

    #[test]
    fn test_input_index_out_of_range() {
        let tx = create_test_transaction(1, 1);
        assert!(matches!(
            legacy_sighash(&tx, 1, &[], SighashType::ALL),
            Err(SigningError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_signature_hash_unresolved_claim() {
        let tx = create_test_transaction(1, 1);
        let cache = SighashCache::new(&tx);
        let claim =
            TxInClaim::new(OutPoint::new([9; 32], 9), p2pkh_for_public_key(&[2; 33]), None, 1);
        assert!(matches!(
            signature_hash(&tx, &claim, &cache),
            Err(SigningError::UnresolvedClaim(_))
        ));
    }

    #[test]
    fn test_signature_hash_segwit_requires_value() {
        let tx = create_test_transaction(1, 1);
        let cache = SighashCache::new(&tx);
        let mut program = vec![0x00, 0x14];
        program.extend_from_slice(&[0x42; 20]);
        let claim = TxInClaim::new(tx.inputs()[0].prevout.clone(), program, None, 1);
        assert!(matches!(
            signature_hash(&tx, &claim, &cache),
            Err(SigningError::MissingValueCommitment(_))
        ));
    }

    #[test]
    fn test_signature_hash_fork_id_requires_value() {
        let tx = create_test_transaction(1, 1);
        let cache = SighashCache::new(&tx);
        let claim = TxInClaim::new(
            tx.inputs()[0].prevout.clone(),
            p2pkh_for_public_key(&[2; 33]),
            None,
            SIGHASH_ALL | SIGHASH_FORKID,
        );
        assert!(matches!(
            signature_hash(&tx, &claim, &cache),
            Err(SigningError::MissingValueCommitment(_))
        ));
    }

    #[test]
    fn test_signature_hash_p2sh_needs_script_code() {
        let tx = create_test_transaction(1, 1);
        let cache = SighashCache::new(&tx);
        let p2sh = crate::script::p2sh_for_script(&[0x51]);
        let claim = TxInClaim::new(tx.inputs()[0].prevout.clone(), p2sh, None, 1);
        assert!(matches!(
            signature_hash(&tx, &claim, &cache),
            Err(SigningError::InvalidParameters(_))
        ));

        let claim = claim.with_script_code(vec![0x51]);
        let expected = legacy_sighash(&tx, 0, &[0x51], SighashType::ALL).unwrap();
        assert_eq!(signature_hash(&tx, &claim, &cache).unwrap(), expected);
    }

    #[test]
    fn test_signature_hash_rejects_foreign_cache() {
        let tx = create_test_transaction(1, 1);
        let other = create_test_transaction(1, 2);
        let cache = SighashCache::new(&other);
        let claim = TxInClaim::new(
            tx.inputs()[0].prevout.clone(),
            crate::script::p2wpkh_for_public_key(&[2; 33]),
            Some(1_000),
            SIGHASH_ALL,
        );
        assert!(matches!(
            signature_hash(&tx, &claim, &cache),
            Err(SigningError::InvalidParameters(_))
        ));
        assert!(signature_hash(&tx, &claim, &SighashCache::new(&tx)).is_ok());
    }
}
