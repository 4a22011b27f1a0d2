//! Gas cost table of the host.
//!
//! The host meters a handful of operations so that gas stipends and
//! per-transaction ceilings behave as they do on chain. It is not an EVM
//! cost model.

/// Intrinsic cost of every transaction.
pub const TRANSACTION: u64 = 21_000;
/// Base cost of a message call, charged to the caller.
pub const CALL: u64 = 700;
/// Extra cost of a value-bearing call, charged to the caller.
pub const CALL_VALUE: u64 = 9_000;
/// Cost of one contract storage write.
pub const STORAGE_WRITE: u64 = 5_000;
/// Cost of emitting one event.
pub const LOG: u64 = 1_000;
/// Cost of creating a contract.
pub const CREATE: u64 = 32_000;
