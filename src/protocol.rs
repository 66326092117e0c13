//! Boundary messages and byte-in / byte-out entry points
//!
//! Messages are JSON with camelCase keys and hex-encoded byte fields. The two
//! entry points never fail; errors come back inside a [`Response`] envelope.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SigningError};
use crate::types::*;
use crate::UtxoCompiler;

/// Request to compute sighashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningInput {
    pub version: i32,
    #[serde(default)]
    pub lock_time: LockTime,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub claims: Vec<TxInClaim>,
}

impl SigningInput {
    pub fn to_transaction(&self) -> Result<Transaction> {
        Transaction::new(self.version, self.inputs.clone(), self.outputs.clone(), self.lock_time)
    }
}

/// Request to compile a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreSerialization {
    pub version: i32,
    #[serde(default)]
    pub lock_time: LockTime,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    /// Claims for key-hash signatures; required when signatures are verified
    #[serde(default)]
    pub claims: Vec<TxInClaim>,
    pub signatures: Vec<ClaimSignature>,
}

impl PreSerialization {
    pub fn to_transaction(&self) -> Result<Transaction> {
        Transaction::new(self.version, self.inputs.clone(), self.outputs.clone(), self.lock_time)
    }
}

/// Error half of a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// Envelope returned by the entry points: exactly one of `result` and
/// `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Response<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Response<T> {
    pub fn into_result(self) -> std::result::Result<T, ErrorBody> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ErrorBody {
                kind: "Serialization".to_string(),
                message: "response carries neither result nor error".to_string(),
            }),
        }
    }
}

pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode a [`SigningInput`] and return a `Response<PreSigningOutput>`.
pub fn pre_image_hashes(request: &[u8]) -> Vec<u8> {
    pre_image_hashes_with(&UtxoCompiler::new(), request)
}

pub fn pre_image_hashes_with(compiler: &UtxoCompiler, request: &[u8]) -> Vec<u8> {
    respond(handle_pre_image_hashes(compiler, request))
}

/// Decode a [`PreSerialization`] and return a `Response<SerializedTransaction>`.
pub fn compile_with_signatures(request: &[u8]) -> Vec<u8> {
    compile_with_signatures_with(&UtxoCompiler::new(), request)
}

pub fn compile_with_signatures_with(compiler: &UtxoCompiler, request: &[u8]) -> Vec<u8> {
    respond(handle_compile(compiler, request))
}

fn handle_pre_image_hashes(
    compiler: &UtxoCompiler,
    request: &[u8],
) -> anyhow::Result<PreSigningOutput> {
    let input: SigningInput = decode_message(request).context("decoding SigningInput")?;
    let tx = input.to_transaction().context("building transaction")?;
    let output = compiler.pre_sign(&tx, &input.claims)?;
    Ok(output)
}

fn handle_compile(
    compiler: &UtxoCompiler,
    request: &[u8],
) -> anyhow::Result<SerializedTransaction> {
    let input: PreSerialization = decode_message(request).context("decoding PreSerialization")?;
    let tx = input.to_transaction().context("building transaction")?;
    // Key-hash signatures without a matching claim fail as unresolved
    let serialized = compiler.compile_verified(&tx, &input.claims, &input.signatures)?;
    Ok(serialized)
}

fn respond<T: Serialize>(outcome: anyhow::Result<T>) -> Vec<u8> {
    let response = match outcome {
        Ok(result) => Response { result: Some(result), error: None },
        Err(err) => {
            let kind = err
                .downcast_ref::<SigningError>()
                .map(SigningError::kind)
                .unwrap_or("Serialization");
            let message = format!("{:#}", err);
            warn!(kind, error = %message, "request rejected");
            Response {
                result: None,
                error: Some(ErrorBody { kind: kind.to_string(), message }),
            }
        }
    };
    // Only fails for maps with non-string keys, which no message contains
    serde_json::to_vec(&response).unwrap_or_default()
}
