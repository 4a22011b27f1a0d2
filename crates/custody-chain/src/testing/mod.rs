//! Test fixtures: adversarial and instrumented recipient contracts.

use crate::{CallContext, Chain, Contract};
use alloy_primitives::{Address, Bytes, U256};
use custody_types::CustodyError;

/// Reverts on every call, including plain value transfers.
#[derive(Debug, Clone, Default)]
pub struct RejectingReceiver;

impl Contract for RejectingReceiver {
	fn name(&self) -> &'static str {
		"RejectingReceiver"
	}

	fn execute(
		&self,
		_chain: &mut Chain,
		_ctx: &CallContext,
		_input: &[u8],
	) -> Result<Bytes, CustodyError> {
		Err(CustodyError::Revert("receiver rejects all calls".into()))
	}
}

/// Burns all the gas it is given.
#[derive(Debug, Clone, Default)]
pub struct GasGuzzler;

impl Contract for GasGuzzler {
	fn name(&self) -> &'static str {
		"GasGuzzler"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		_ctx: &CallContext,
		_input: &[u8],
	) -> Result<Bytes, CustodyError> {
		chain.charge_gas(u64::MAX)?;
		Ok(Bytes::new())
	}
}

/// Records every value it receives in storage.
///
/// The storage write makes it too expensive to receive under a 2300 stipend.
#[derive(Debug, Clone, Default)]
pub struct CountingReceiver;

#[derive(Debug, Clone, Default)]
pub struct CountingState {
	pub received: U256,
	pub calls: u64,
}

impl CountingReceiver {
	pub fn received(chain: &Chain, address: &Address) -> U256 {
		chain
			.storage::<CountingState>(address)
			.map(|s| s.received)
			.unwrap_or_default()
	}
}

impl Contract for CountingReceiver {
	fn name(&self) -> &'static str {
		"CountingReceiver"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		_input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let value = ctx.value;
		chain.store(ctx.address, |state: &mut CountingState| {
			state.received += value;
			state.calls += 1;
		})?;
		Ok(Bytes::new())
	}
}

/// Calls back into `target` with `input` whenever it is called.
#[derive(Debug, Clone, Default)]
pub struct ReentrantReceiver;

#[derive(Debug, Clone, Default)]
pub struct ReentrantState {
	pub target: Option<Address>,
	pub input: Bytes,
}

impl ReentrantReceiver {
	/// Points the receiver at `target`; takes effect outside of any transaction.
	pub fn arm(chain: &mut Chain, receiver: Address, target: Address, input: impl Into<Bytes>) {
		chain.set_storage(
			receiver,
			ReentrantState {
				target: Some(target),
				input: input.into(),
			},
		);
	}
}

impl Contract for ReentrantReceiver {
	fn name(&self) -> &'static str {
		"ReentrantReceiver"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		_input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let armed = chain
			.storage::<ReentrantState>(&ctx.address)
			.and_then(|s| s.target.map(|target| (target, s.input.clone())));
		match armed {
			Some((target, input)) => chain.call(ctx.address, target, U256::ZERO, &input, None),
			None => Ok(Bytes::new()),
		}
	}
}
