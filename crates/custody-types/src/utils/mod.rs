//! Utility functions for hashing, packing and formatting.
//!
//! This module provides the byte-level helpers the protocol is defined in
//! terms of: Solidity tight packing, CREATE2 address derivation and the
//! minimal proxy creation code, plus small formatting helpers.

pub mod constants;
pub mod create2;
pub mod formatting;
pub mod helpers;
pub mod packed;

pub use constants::{
	DEFAULT_BATCH_LIMIT, DEFAULT_BLOCK_GAS_LIMIT, DEFAULT_TRANSFER_GAS_LIMIT, MIN_BATCH_LIMIT,
	MIN_SIGNERS, MIN_TRANSFER_GAS_LIMIT, THRESHOLD,
};
pub use create2::{create2_address, minimal_proxy_creation_code};
pub use formatting::without_0x_prefix;
pub use helpers::current_timestamp;
pub use packed::PackedEncoder;
