//! Common types module for the custody protocol.
//!
//! This module defines the core data types and structures shared by every
//! component of the custody system: the contract ABI, signed operations,
//! events, the error taxonomy and the byte-packing helpers used for
//! operation hashing and deterministic address derivation.

/// Solidity ABI definitions for every contract entry point.
pub mod abi;
/// Error taxonomy shared across contract boundaries.
pub mod errors;
/// Events emitted by protocol contracts.
pub mod events;
/// Signed operation payloads and coin prefix configuration.
pub mod operation;
/// Packing, hashing and formatting utilities.
pub mod utils;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use errors::*;
pub use events::*;
pub use operation::*;
pub use utils::{
	create2_address, current_timestamp, minimal_proxy_creation_code, without_0x_prefix,
	PackedEncoder,
};
