//! Compile a transaction and its signatures into broadcast-ready bytes

use secp256k1::{ecdsa::Signature, Context, Message, PublicKey, Secp256k1, Verification};
use tracing::{debug, warn};

use crate::encoding::Encodable;
use crate::error::{Result, SigningError};
use crate::script::{p2pkh_script_sig, p2sh_p2wpkh_script_sig};
use crate::segwit::SighashCache;
use crate::sighash::{signature_hash, SighashType};
use crate::transaction::{
    calculate_transaction_weight, calculate_virtual_size, compute_txid, compute_wtxid,
};
use crate::types::*;

/// Attach unlocking data to every input and serialize the result.
///
/// Every input must be covered by exactly one signature. The segwit encoding
/// is used when any input ends up with a witness.
pub fn compile(tx: &Transaction, signatures: &[ClaimSignature]) -> Result<SerializedTransaction> {
    let expected = tx.inputs().len();
    if signatures.len() != expected {
        warn!(expected, actual = signatures.len(), "signature count mismatch");
        return Err(SigningError::SignatureCountMismatch { expected, actual: signatures.len() });
    }

    let mut inputs = tx.inputs().to_vec();
    let mut covered = vec![false; expected];
    for signature in signatures {
        let index = tx
            .input_index_of(&signature.claim)
            .ok_or_else(|| SigningError::UnresolvedClaim(signature.claim.clone()))?;
        if covered[index] {
            let distinct = covered.iter().filter(|c| **c).count();
            return Err(SigningError::SignatureCountMismatch { expected, actual: distinct });
        }
        covered[index] = true;

        let (script_sig, witness) = unlocking_data(&signature.unlocking);
        inputs[index].script_sig = script_sig;
        inputs[index].witness = witness;
    }

    let signed = tx.with_inputs(inputs)?;
    let encoded = signed.encode();
    let serialized = SerializedTransaction {
        txid: compute_txid(&signed),
        wtxid: compute_wtxid(&signed),
        weight: calculate_transaction_weight(&signed),
        vsize: calculate_virtual_size(&signed),
        encoded,
    };

    debug!(
        txid = %serialized.txid_hex(),
        segwit = signed.has_witness(),
        weight = serialized.weight,
        vsize = serialized.vsize,
        "compiled transaction"
    );
    Ok(serialized)
}

/// scriptSig and witness for one input.
fn unlocking_data(unlocking: &Unlocking) -> (ByteString, Witness) {
    match unlocking {
        Unlocking::P2pkh { signature, public_key } => {
            (p2pkh_script_sig(signature, public_key), Vec::new())
        }
        Unlocking::P2wpkh { signature, public_key } => {
            (Vec::new(), vec![signature.clone(), public_key.clone()])
        }
        Unlocking::P2shP2wpkh { signature, public_key } => {
            (p2sh_p2wpkh_script_sig(public_key), vec![signature.clone(), public_key.clone()])
        }
        Unlocking::Raw { script_sig, witness } => (script_sig.clone(), witness.clone()),
    }
}

/// Check every key-hash signature against the sighash of its claim.
///
/// Signatures are DER with the sighash type byte appended; the byte must
/// match the claim's type. `Raw` unlocking data is not inspected.
pub fn verify_signatures(
    tx: &Transaction,
    claims: &[TxInClaim],
    signatures: &[ClaimSignature],
) -> Result<()> {
    let secp = Secp256k1::verification_only();
    let cache = SighashCache::new(tx);

    for signature in signatures {
        let (sig_bytes, public_key) = match &signature.unlocking {
            Unlocking::P2pkh { signature, public_key }
            | Unlocking::P2wpkh { signature, public_key }
            | Unlocking::P2shP2wpkh { signature, public_key } => (signature, public_key),
            Unlocking::Raw { .. } => {
                debug!(claim = %signature.claim, "skipping raw unlocking data");
                continue;
            }
        };

        let claim = claims
            .iter()
            .find(|claim| claim.outpoint == signature.claim)
            .ok_or_else(|| SigningError::UnresolvedClaim(signature.claim.clone()))?;
        let sighash = signature_hash(tx, claim, &cache)?;
        let sighash_type = SighashType::from_u32(claim.sighash_type)?;

        verify_signature(&secp, &sighash, sighash_type, sig_bytes, public_key).map_err(|reason| {
            warn!(claim = %signature.claim, reason = %reason, "signature rejected");
            SigningError::InvalidSignature(format!("{}: {}", signature.claim, reason))
        })?;
    }
    Ok(())
}

fn verify_signature<C: Context + Verification>(
    secp: &Secp256k1<C>,
    sighash: &Sighash,
    sighash_type: SighashType,
    signature_bytes: &[u8],
    pubkey_bytes: &[u8],
) -> std::result::Result<(), String> {
    let (&type_byte, der) = signature_bytes
        .split_last()
        .ok_or_else(|| "empty signature".to_string())?;
    if type_byte != sighash_type.signature_byte() {
        return Err(format!(
            "sighash byte {:#04x} does not match claim type {:#04x}",
            type_byte,
            sighash_type.signature_byte()
        ));
    }

    let pubkey = PublicKey::from_slice(pubkey_bytes).map_err(|e| format!("public key: {}", e))?;
    let signature = Signature::from_der(der).map_err(|e| format!("DER: {}", e))?;
    let message = Message::from_digest_slice(sighash.as_bytes()).map_err(|e| e.to_string())?;

    // libsecp256k1 rejects high-S signatures here
    secp.verify_ecdsa(&message, &signature, &pubkey).map_err(|e| e.to_string())
}
