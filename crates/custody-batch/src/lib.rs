//! Atomic batch payouts.
//!
//! This module provides the batch executor shared by the multi-signature
//! wallet and the standalone Batcher contract. A batch either pays every
//! recipient or nobody: the first failing transfer aborts the enclosing call
//! and the host rolls back every transfer made before it.

/// Standalone owner-administered Batcher contract.
pub mod batcher;
/// Shape validation and ordered execution of a batch.
pub mod executor;

pub use batcher::{Batcher, BatcherSettings, BatcherState};
pub use executor::{BatchError, BatchExecutor, BatchRequest, ValueBudget};
