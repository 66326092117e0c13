//! Signer configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, SigningError};

/// Runtime options for [`crate::UtxoCompiler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignerConfig {
    /// Reject non-minimal varints when decoding transactions
    pub require_canonical_varints: bool,
    /// Check key-hash signatures against their sighashes before compiling
    pub verify_signatures: bool,
    /// Claim count at which pre-signing fans out across threads
    pub parallel_threshold: usize,
    pub max_workers: usize,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            require_canonical_varints: true,
            verify_signatures: true,
            parallel_threshold: 64,
            max_workers: 4,
        }
    }
}

impl SignerConfig {
    /// Load from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SignerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(SigningError::InvalidParameters(
                "maxWorkers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn use_parallel(&self, claims: usize) -> bool {
        self.max_workers > 1 && claims >= self.parallel_threshold
    }
}
