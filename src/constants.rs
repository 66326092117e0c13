//! Protocol constants for transaction encoding and signature hashing

/// Lock time threshold: lock times below this are block heights, at or above
/// are timestamps
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Sequence number for RBF
pub const SEQUENCE_RBF: u32 = 0xfffffffe;

/// Maximum size of an OP_RETURN payload
pub const MAX_NULL_DATA_SIZE: usize = 80;

/// Maximum number of public keys in a bare multisig script
pub const MAX_MULTISIG_KEYS: usize = 16;

/// Witness scale factor used for weight and virtual size
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Segwit serialization marker byte
pub const SEGWIT_MARKER: u8 = 0x00;

/// Segwit serialization flag byte
pub const SEGWIT_FLAG: u8 = 0x01;

/// Sign all inputs and outputs
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs, no outputs
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and the output at the signing input's index
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Replay-protected digest (BIP143 layout with fork id)
pub const SIGHASH_FORKID: u32 = 0x40;

/// Fork id carried by Bitcoin Gold signatures in the upper 24 bits of the type
pub const FORK_ID_BTG: u32 = 79;

/// Sign only the current input
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask selecting the base type (ALL, NONE, SINGLE)
pub const SIGHASH_BASE_MASK: u32 = 0x1f;

/// Legacy digest returned for SIGHASH_SINGLE without a matching output
pub const SIGHASH_SINGLE_BUG: [u8; 32] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
