//! Pre-signing: turn a transaction and its claims into ordered sighashes

use std::thread;

use tracing::{debug, warn};

use crate::error::{Result, SigningError};
use crate::segwit::SighashCache;
use crate::sighash::signature_hash;
use crate::types::*;

/// Compute one sighash per claim, in claim order.
///
/// The first failing claim aborts the whole batch; its index and outpoint are
/// reported in [`SigningError::ClaimResolutionFailed`].
pub fn pre_sign(tx: &Transaction, claims: &[TxInClaim]) -> Result<PreSigningOutput> {
    if claims.is_empty() {
        return Err(SigningError::NoClaims);
    }
    let cache = SighashCache::new(tx);

    let sighashes = claims
        .iter()
        .enumerate()
        .map(|(index, claim)| claim_sighash(tx, index, claim, &cache))
        .collect::<Result<Vec<_>>>()?;

    debug!(claims = claims.len(), inputs = tx.inputs().len(), "pre-signing complete");
    Ok(PreSigningOutput { sighashes })
}

/// Same result as [`pre_sign`], with claims split across up to `workers`
/// scoped threads. Output order matches claim order and, on failure, the
/// lowest failing claim index is reported.
pub fn pre_sign_parallel(
    tx: &Transaction,
    claims: &[TxInClaim],
    workers: usize,
) -> Result<PreSigningOutput> {
    if claims.is_empty() {
        return Err(SigningError::NoClaims);
    }
    let workers = workers.clamp(1, claims.len());
    if workers == 1 {
        return pre_sign(tx, claims);
    }

    let cache = SighashCache::new(tx);
    let chunk_size = claims.len().div_ceil(workers);

    let chunk_results: Vec<Result<Vec<ClaimSighash>>> = thread::scope(|scope| {
        let handles: Vec<_> = claims
            .chunks(chunk_size)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let cache = &cache;
                scope.spawn(move || {
                    let offset = chunk_index * chunk_size;
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(i, claim)| claim_sighash(tx, offset + i, claim, cache))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(SigningError::InvalidParameters("pre-signing worker panicked".to_string()))
                })
            })
            .collect()
    });

    // Chunks are in claim order, so the first error is the lowest index
    let mut sighashes = Vec::with_capacity(claims.len());
    for result in chunk_results {
        sighashes.extend(result?);
    }

    debug!(claims = claims.len(), workers, "parallel pre-signing complete");
    Ok(PreSigningOutput { sighashes })
}

fn claim_sighash(
    tx: &Transaction,
    index: usize,
    claim: &TxInClaim,
    cache: &SighashCache,
) -> Result<ClaimSighash> {
    let sighash = signature_hash(tx, claim, cache).map_err(|source| {
        warn!(index, claim = %claim.outpoint, error = %source, "claim failed");
        SigningError::ClaimResolutionFailed {
            index,
            claim: claim.outpoint.clone(),
            source: Box::new(source),
        }
    })?;
    Ok(ClaimSighash {
        claim: claim.outpoint.clone(),
        sighash,
        signing_method: claim.signing_method,
        sighash_type: claim.sighash_type,
    })
}
