//! Per-coin signing defaults
//!
//! Each supported chain fixes the sighash type its signers use and the
//! locking script a single-key wallet holds its coins under.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Result, SigningError};
use crate::script::{p2pkh_for_public_key, p2wpkh_for_public_key};
use crate::types::*;

/// UTXO chains with known signing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoinType {
    Bitcoin,
    Litecoin,
    BitcoinCash,
    BitcoinGold,
    Dogecoin,
    Dash,
}

impl CoinType {
    /// Sighash type a signer on this chain uses for ordinary spends.
    pub fn sighash_type(self) -> u32 {
        match self {
            CoinType::BitcoinCash => SIGHASH_ALL | SIGHASH_FORKID,
            CoinType::BitcoinGold => SIGHASH_ALL | SIGHASH_FORKID | (FORK_ID_BTG << 8),
            CoinType::Bitcoin | CoinType::Litecoin | CoinType::Dogecoin | CoinType::Dash => {
                SIGHASH_ALL
            }
        }
    }

    /// Whether single-key wallets on this chain receive to P2WPKH.
    pub fn uses_witness_key_hash(self) -> bool {
        matches!(self, CoinType::Bitcoin | CoinType::Litecoin | CoinType::BitcoinGold)
    }

    /// Locking script for coins held by `public_key`.
    ///
    /// Witness key hashes need a compressed key; P2PKH takes either form.
    pub fn lock_script(self, public_key: &[u8]) -> Result<ByteString> {
        if self.uses_witness_key_hash() {
            if public_key.len() != 33 {
                return Err(SigningError::InvalidParameters(format!(
                    "{:?} needs a 33-byte compressed public key, got {} bytes",
                    self,
                    public_key.len()
                )));
            }
            Ok(p2wpkh_for_public_key(public_key))
        } else {
            if public_key.len() != 33 && public_key.len() != 65 {
                return Err(SigningError::InvalidParameters(format!(
                    "public key must be 33 or 65 bytes, got {}",
                    public_key.len()
                )));
            }
            Ok(p2pkh_for_public_key(public_key))
        }
    }

    /// Claim spending `outpoint` from the default wallet script of
    /// `public_key`, signed with this chain's sighash type.
    pub fn claim(
        self,
        outpoint: OutPoint,
        public_key: &[u8],
        value: Option<u64>,
    ) -> Result<TxInClaim> {
        let script_pubkey = self.lock_script(public_key)?;
        Ok(TxInClaim::new(outpoint, script_pubkey, value, self.sighash_type()))
    }
}

/// Sighash type signers on `coin` use.
pub fn hash_type_for_coin(coin: CoinType) -> u32 {
    coin.sighash_type()
}
