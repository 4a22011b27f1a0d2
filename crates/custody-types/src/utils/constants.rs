//! Protocol constants shared across components.

/// Number of distinct signers that must authorize a wallet operation.
pub const THRESHOLD: usize = 2;

/// Smallest signer set a wallet may be initialized with.
pub const MIN_SIGNERS: usize = THRESHOLD;

/// Floor of the per-recipient gas stipend of batch payouts.
pub const MIN_TRANSFER_GAS_LIMIT: u64 = 2_300;

/// Per-recipient gas stipend used when none is configured.
pub const DEFAULT_TRANSFER_GAS_LIMIT: u64 = 30_000;

/// Floor of every batch size limit.
pub const MIN_BATCH_LIMIT: usize = 1;

/// Batch size limit used when none is configured (max 255 recipients).
pub const DEFAULT_BATCH_LIMIT: usize = 255;

/// Gas available to a single transaction when none is configured.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 30_000_000;
