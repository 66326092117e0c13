//! # UTXO Compiler
//!
//! Pre-signing and serialization engine for UTXO transactions.
//!
//! Given an unsigned transaction and a list of claims (which inputs to sign,
//! with which locking script, value and sighash type), the engine computes the
//! exact digest each signer must sign. Once the signatures come back it
//! attaches the unlocking data and produces the broadcast-ready encoding.
//! Keys never enter the crate.
//!
//! Supported digests:
//! - Legacy (pre-segwit) signature hashing, including the `SIGHASH_SINGLE`
//!   out-of-range behaviour
//! - BIP143 segwit v0 hashing with cached midstates
//! - FORKID replay-protected hashing for BIP143-style forks
//!
//! [`CoinType`] supplies each supported chain's default sighash type and
//! wallet locking script.
//!
//! ## Usage
//!
//! ```rust
//! use utxo_compiler::UtxoCompiler;
//! use utxo_compiler::types::*;
//! use utxo_compiler::script::p2pkh_for_public_key;
//!
//! let outpoint = OutPoint::new([1; 32], 0);
//! let tx = Transaction::new(
//!     1,
//!     vec![TxIn::new(outpoint.clone(), 0xffffffff)],
//!     vec![TxOut { value: 10_000, script_pubkey: vec![0x51] }],
//!     LockTime::ZERO,
//! )
//! .unwrap();
//!
//! let claim = TxInClaim::new(outpoint, p2pkh_for_public_key(&[2; 33]), None, 0x01);
//! let output = UtxoCompiler::new().pre_sign(&tx, &[claim]).unwrap();
//! assert_eq!(output.sighashes.len(), 1);
//! assert_eq!(output.sighashes[0].signing_method, SigningMethod::Legacy);
//! ```

pub mod coin;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod hashes;
pub mod presign;
pub mod protocol;
pub mod script;
pub mod segwit;
pub mod sighash;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use coin::CoinType;
pub use config::SignerConfig;
pub use constants::*;
pub use error::{Result, SigningError};
pub use types::*;

/// Configured entry point for pre-signing and compiling.
///
/// # Examples
///
/// ```
/// use utxo_compiler::{SignerConfig, UtxoCompiler};
///
/// let config = SignerConfig { verify_signatures: false, ..SignerConfig::default() };
/// let compiler = UtxoCompiler::with_config(config).unwrap();
/// assert!(!compiler.config().verify_signatures);
///
/// let zero_workers = SignerConfig { max_workers: 0, ..SignerConfig::default() };
/// assert!(UtxoCompiler::with_config(zero_workers).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct UtxoCompiler {
    config: SignerConfig,
}

impl UtxoCompiler {
    /// Compiler with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SignerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Compute one sighash per claim, switching to parallel workers for
    /// large claim lists.
    pub fn pre_sign(&self, tx: &Transaction, claims: &[TxInClaim]) -> Result<PreSigningOutput> {
        if self.config.use_parallel(claims.len()) {
            presign::pre_sign_parallel(tx, claims, self.config.max_workers)
        } else {
            presign::pre_sign(tx, claims)
        }
    }

    /// Attach signatures without checking them.
    pub fn compile(
        &self,
        tx: &Transaction,
        signatures: &[ClaimSignature],
    ) -> Result<SerializedTransaction> {
        compiler::compile(tx, signatures)
    }

    /// Verify signatures against their claims when enabled, then compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use utxo_compiler::UtxoCompiler;
    /// use utxo_compiler::types::*;
    ///
    /// let outpoint = OutPoint::new([7; 32], 3);
    /// let tx = Transaction::new(
    ///     2,
    ///     vec![TxIn::new(outpoint.clone(), 0xfffffffd)],
    ///     vec![TxOut { value: 1_000, script_pubkey: vec![0x51] }],
    ///     LockTime::ZERO,
    /// )
    /// .unwrap();
    ///
    /// let signatures = vec![ClaimSignature {
    ///     claim: outpoint,
    ///     unlocking: Unlocking::Raw { script_sig: vec![0x51], witness: vec![] },
    /// }];
    /// let compiled = UtxoCompiler::new().compile_verified(&tx, &[], &signatures).unwrap();
    /// assert_eq!(compiled.weight, 4 * compiled.vsize);
    /// ```
    pub fn compile_verified(
        &self,
        tx: &Transaction,
        claims: &[TxInClaim],
        signatures: &[ClaimSignature],
    ) -> Result<SerializedTransaction> {
        if self.config.verify_signatures {
            compiler::verify_signatures(tx, claims, signatures)?;
        }
        compiler::compile(tx, signatures)
    }

    /// Decode a wire-format transaction, honouring `require_canonical_varints`.
    pub fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction> {
        transaction::decode_transaction(bytes, self.config.require_canonical_varints)
    }
}
