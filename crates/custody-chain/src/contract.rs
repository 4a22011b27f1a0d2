//! Contract interface and call plumbing.
//!
//! A contract is a stateless piece of code: everything it persists lives in
//! the host's world state under the address it executes at. The same code
//! object therefore serves an implementation contract and all of its clones.

use crate::Chain;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolInterface;
use custody_types::{CustodyError, Log};

/// Trait defining the interface for contract code hosted by the chain.
pub trait Contract: Send + Sync {
	/// Human-readable contract name, used in logs and debug output.
	fn name(&self) -> &'static str;

	/// Creation code identifying this contract for CREATE2 derivation.
	fn init_code(&self) -> Vec<u8> {
		self.name().as_bytes().to_vec()
	}

	/// Runs once when the contract is deployed directly (not for clones).
	fn construct(&self, _chain: &mut Chain, _ctx: &CallContext) -> Result<(), CustodyError> {
		Ok(())
	}

	/// Executes a message call against this code.
	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError>;
}

/// Execution context of one call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
	/// Immediate caller (`msg.sender`).
	pub caller: Address,
	/// Address whose storage and balance the code runs against (`address(this)`).
	pub address: Address,
	/// Value attached to the call (`msg.value`).
	pub value: U256,
}

/// A top-level transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	pub from: Address,
	pub to: Address,
	pub value: U256,
	pub input: Bytes,
	/// Gas limit; the block gas limit when unset.
	pub gas_limit: Option<u64>,
}

impl Transaction {
	/// Creates a transaction calling `to` with `input`.
	pub fn call(from: Address, to: Address, input: impl Into<Bytes>) -> Self {
		Self {
			from,
			to,
			value: U256::ZERO,
			input: input.into(),
			gas_limit: None,
		}
	}

	/// Creates a plain value transfer.
	pub fn transfer(from: Address, to: Address, value: U256) -> Self {
		Self {
			from,
			to,
			value,
			input: Bytes::new(),
			gas_limit: None,
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}
}

/// Outcome of a successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
	pub gas_used: u64,
	pub output: Bytes,
	/// Events emitted by this transaction, in order.
	pub logs: Vec<Log>,
}

/// Decodes `input` against the interface `I`.
///
/// Returns `Ok(None)` for empty input or an unknown selector, which the
/// caller routes to its receive/fallback handling.
pub fn decode_call<I: SolInterface>(input: &[u8]) -> Result<Option<I>, CustodyError> {
	let Some(selector) = input.get(..4) else {
		return Ok(None);
	};
	let mut bytes = [0u8; 4];
	bytes.copy_from_slice(selector);
	if !I::valid_selector(bytes) {
		return Ok(None);
	}
	I::abi_decode(input, true)
		.map(Some)
		.map_err(CustodyError::from)
}
