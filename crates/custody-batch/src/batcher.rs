//! Standalone Batcher contract.
//!
//! Anyone can pay out a native batch by attaching exactly its total, or pay
//! out an ERC20 batch from their own allowance. The owner tunes the
//! per-recipient gas stipend and the two batch limits, and can recover funds
//! sent to the contract by mistake.

use crate::executor::{validate_shape, BatchExecutor, BatchRequest, ValueBudget};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use custody_chain::tokens::erc20_transfer_from;
use custody_chain::{
	decode_call, non_reentrant, CallContext, Chain, Contract, Guarded, ReentrancyGuard,
};
use custody_types::abi::IBatcher::{self, IBatcherCalls};
use custody_types::utils::{
	DEFAULT_BATCH_LIMIT, DEFAULT_TRANSFER_GAS_LIMIT, MIN_BATCH_LIMIT, MIN_TRANSFER_GAS_LIMIT,
};
use custody_types::{CustodyError, CustodyEvent};
use serde::{Deserialize, Serialize};

/// Initial administration settings of a Batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherSettings {
	pub transfer_gas_limit: u64,
	pub batch_transfer_limit: usize,
	pub token_batch_transfer_limit: usize,
}

impl Default for BatcherSettings {
	fn default() -> Self {
		Self {
			transfer_gas_limit: DEFAULT_TRANSFER_GAS_LIMIT,
			batch_transfer_limit: DEFAULT_BATCH_LIMIT,
			token_batch_transfer_limit: DEFAULT_BATCH_LIMIT,
		}
	}
}

impl BatcherSettings {
	/// Checks every setting against its floor.
	pub fn validate(&self) -> Result<(), CustodyError> {
		check_gas_limit(self.transfer_gas_limit)?;
		check_batch_limit(self.batch_transfer_limit)?;
		check_batch_limit(self.token_batch_transfer_limit)
	}
}

fn check_gas_limit(limit: u64) -> Result<(), CustodyError> {
	if limit < MIN_TRANSFER_GAS_LIMIT {
		return Err(CustodyError::InvalidConfiguration(format!(
			"transfer gas limit {} is below the minimum of {}",
			limit, MIN_TRANSFER_GAS_LIMIT
		)));
	}
	Ok(())
}

fn check_batch_limit(limit: usize) -> Result<(), CustodyError> {
	if limit < MIN_BATCH_LIMIT {
		return Err(CustodyError::InvalidConfiguration(format!(
			"batch limit {} is below the minimum of {}",
			limit, MIN_BATCH_LIMIT
		)));
	}
	Ok(())
}

/// Storage layout of a [`Batcher`].
#[derive(Debug, Clone, Default)]
pub struct BatcherState {
	pub owner: Address,
	pub settings: BatcherSettings,
	guard: ReentrancyGuard,
}

impl Guarded for BatcherState {
	fn reentrancy_guard(&mut self) -> &mut ReentrancyGuard {
		&mut self.guard
	}
}

/// The Batcher contract; `settings` apply at deployment.
#[derive(Debug, Clone, Default)]
pub struct Batcher {
	settings: BatcherSettings,
}

impl Batcher {
	pub fn new(settings: BatcherSettings) -> Self {
		Self { settings }
	}

	/// Reads the current state of the Batcher at `address`.
	pub fn state<'a>(chain: &'a Chain, address: &Address) -> Option<&'a BatcherState> {
		chain.storage::<BatcherState>(address)
	}

	fn load(chain: &Chain, address: &Address) -> Result<BatcherState, CustodyError> {
		Self::state(chain, address)
			.cloned()
			.ok_or(CustodyError::NotInitialized)
	}

	fn only_owner(state: &BatcherState, caller: Address) -> Result<(), CustodyError> {
		if state.owner != caller {
			return Err(CustodyError::Unauthorized(caller));
		}
		Ok(())
	}

	fn batch(
		chain: &mut Chain,
		ctx: &CallContext,
		state: &BatcherState,
		call: IBatcher::batchCall,
	) -> Result<(), CustodyError> {
		let executor = BatchExecutor::new(
			state.settings.batch_transfer_limit,
			Some(state.settings.transfer_gas_limit),
		);
		let request = BatchRequest::new(call.recipients, call.values);
		non_reentrant::<BatcherState, _, _>(chain, ctx.address, |chain| {
			executor
				.execute(chain, ctx.address, ctx.caller, &request, ValueBudget::Attached(ctx.value))
				.map_err(CustodyError::from)
		})?;
		Ok(())
	}

	fn batch_transfer_from(
		chain: &mut Chain,
		ctx: &CallContext,
		state: &BatcherState,
		call: IBatcher::batchTransferFromCall,
	) -> Result<(), CustodyError> {
		validate_shape(
			&call.recipients,
			&call.amounts,
			state.settings.token_batch_transfer_limit,
		)
		.map_err(CustodyError::from)?;
		non_reentrant::<BatcherState, _, _>(chain, ctx.address, |chain| {
			for (index, (recipient, amount)) in
				call.recipients.iter().zip(call.amounts.iter()).enumerate()
			{
				erc20_transfer_from(chain, ctx.address, call.token, ctx.caller, *recipient, *amount)
					.map_err(|reason| {
						tracing::debug!(
							index = index,
							recipient = %recipient,
							error = %reason,
							"Token transfer failed"
						);
						reason.into_call_failure(call.token)
					})?;
			}
			Ok(())
		})?;
		tracing::info!(
			batcher = %ctx.address,
			token = %call.token,
			recipients = call.recipients.len(),
			"Token batch executed"
		);
		Ok(())
	}
}

impl Contract for Batcher {
	fn name(&self) -> &'static str {
		"Batcher"
	}

	fn construct(&self, chain: &mut Chain, ctx: &CallContext) -> Result<(), CustodyError> {
		self.settings.validate()?;
		let settings = self.settings;
		let owner = ctx.caller;
		chain.store(ctx.address, |state: &mut BatcherState| {
			state.owner = owner;
			state.settings = settings;
		})?;
		chain.emit(
			ctx.address,
			CustodyEvent::OwnerChange {
				prev_owner: Address::ZERO,
				new_owner: owner,
			},
		)
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let Some(call) = decode_call::<IBatcherCalls>(input)? else {
			return Err(CustodyError::InvalidFallback);
		};
		let state = Self::load(chain, &ctx.address)?;
		if !ctx.value.is_zero() && !matches!(call, IBatcherCalls::batch(_)) {
			return Err(CustodyError::Revert("non-payable method".into()));
		}

		let output = match call {
			IBatcherCalls::owner(_) => IBatcher::ownerCall::abi_encode_returns(&(state.owner,)),
			IBatcherCalls::transferGasLimit(_) => {
				IBatcher::transferGasLimitCall::abi_encode_returns(&(U256::from(
					state.settings.transfer_gas_limit,
				),))
			},
			IBatcherCalls::batchTransferLimit(_) => {
				IBatcher::batchTransferLimitCall::abi_encode_returns(&(U256::from(
					state.settings.batch_transfer_limit,
				),))
			},
			IBatcherCalls::tokenBatchTransferLimit(_) => {
				IBatcher::tokenBatchTransferLimitCall::abi_encode_returns(&(U256::from(
					state.settings.token_batch_transfer_limit,
				),))
			},
			IBatcherCalls::batch(call) => {
				Self::batch(chain, ctx, &state, call)?;
				Vec::new()
			},
			IBatcherCalls::batchTransferFrom(call) => {
				Self::batch_transfer_from(chain, ctx, &state, call)?;
				Vec::new()
			},
			IBatcherCalls::recover(call) => {
				Self::only_owner(&state, ctx.caller)?;
				let result = chain
					.call(ctx.address, call.to, call.value, &call.data, None)
					.map_err(|e| e.into_call_failure(call.to))?;
				tracing::warn!(
					batcher = %ctx.address,
					to = %call.to,
					value = %call.value,
					"Recovered funds"
				);
				IBatcher::recoverCall::abi_encode_returns(&(result,))
			},
			IBatcherCalls::transferOwnership(call) => {
				Self::only_owner(&state, ctx.caller)?;
				if call.newOwner == Address::ZERO {
					return Err(CustodyError::Revert("new owner is the zero address".into()));
				}
				let new_owner = call.newOwner;
				chain.store(ctx.address, |s: &mut BatcherState| s.owner = new_owner)?;
				chain.emit(
					ctx.address,
					CustodyEvent::OwnerChange {
						prev_owner: state.owner,
						new_owner,
					},
				)?;
				Vec::new()
			},
			IBatcherCalls::changeTransferGasLimit(call) => {
				Self::only_owner(&state, ctx.caller)?;
				let new = u64::try_from(call.newTransferGasLimit).unwrap_or(u64::MAX);
				check_gas_limit(new)?;
				chain.store(ctx.address, |s: &mut BatcherState| {
					s.settings.transfer_gas_limit = new
				})?;
				chain.emit(
					ctx.address,
					CustodyEvent::TransferGasLimitChange {
						prev: state.settings.transfer_gas_limit,
						new,
					},
				)?;
				Vec::new()
			},
			IBatcherCalls::changeBatchTransferLimit(call) => {
				Self::only_owner(&state, ctx.caller)?;
				let new = usize::try_from(call.newBatchTransferLimit).unwrap_or(usize::MAX);
				check_batch_limit(new)?;
				chain.store(ctx.address, |s: &mut BatcherState| {
					s.settings.batch_transfer_limit = new
				})?;
				chain.emit(
					ctx.address,
					CustodyEvent::BatchTransferLimitChange {
						prev: state.settings.batch_transfer_limit,
						new,
					},
				)?;
				Vec::new()
			},
			IBatcherCalls::changeTokenBatchTransferLimit(call) => {
				Self::only_owner(&state, ctx.caller)?;
				let new = usize::try_from(call.newTokenBatchTransferLimit).unwrap_or(usize::MAX);
				check_batch_limit(new)?;
				chain.store(ctx.address, |s: &mut BatcherState| {
					s.settings.token_batch_transfer_limit = new
				})?;
				chain.emit(
					ctx.address,
					CustodyEvent::TokenBatchTransferLimitChange {
						prev: state.settings.token_batch_transfer_limit,
						new,
					},
				)?;
				Vec::new()
			},
		};
		Ok(output.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use custody_chain::testing::{CountingReceiver, ReentrantReceiver};
	use custody_chain::tokens::Erc20Token;
	use custody_chain::Transaction;
	use custody_types::abi::IERC20;
	use std::sync::Arc;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	const OWNER: Address = address!("0101010101010101010101010101010101010101");

	fn setup() -> (Chain, Address) {
		let mut chain = Chain::with_timestamp(1);
		let batcher = chain
			.deploy(OWNER, Arc::new(Batcher::new(BatcherSettings::default())))
			.unwrap();
		chain.fund(OWNER, U256::from(1_000));
		(chain, batcher)
	}

	fn batch_tx(
		from: Address,
		batcher: Address,
		recipients: Vec<Address>,
		values: Vec<u64>,
		attached: u64,
	) -> Transaction {
		let values: Vec<U256> = values.into_iter().map(U256::from).collect();
		Transaction::call(from, batcher, IBatcher::batchCall { recipients, values }.abi_encode())
			.with_value(U256::from(attached))
	}

	#[test]
	fn test_batch_pays_every_recipient() {
		let (mut chain, batcher) = setup();
		let receipt = chain
			.transact(batch_tx(OWNER, batcher, vec![addr(2), addr(3)], vec![5, 7], 12))
			.unwrap();
		assert_eq!(chain.balance(&addr(2)), U256::from(5));
		assert_eq!(chain.balance(&addr(3)), U256::from(7));
		assert_eq!(chain.balance(&batcher), U256::ZERO);
		let names: Vec<_> = receipt.logs.iter().map(|l| l.event.name()).collect();
		assert_eq!(names, vec!["BatchTransfer", "BatchTransfer"]);
	}

	#[test]
	fn test_plain_transfer_rejected() {
		let (mut chain, batcher) = setup();
		let err = chain
			.transact(Transaction::transfer(OWNER, batcher, U256::from(1)))
			.unwrap_err();
		assert_eq!(err, CustodyError::InvalidFallback);
	}

	#[test]
	fn test_limit_changes_are_owner_only_and_floored() {
		let (mut chain, batcher) = setup();
		let intruder = addr(9);
		let input = IBatcher::changeBatchTransferLimitCall {
			newBatchTransferLimit: U256::from(2),
		}
		.abi_encode();
		assert_eq!(
			chain
				.transact(Transaction::call(intruder, batcher, input.clone()))
				.unwrap_err(),
			CustodyError::Unauthorized(intruder)
		);
		chain.transact(Transaction::call(OWNER, batcher, input)).unwrap();

		let err = chain
			.transact(batch_tx(OWNER, batcher, vec![addr(2), addr(3), addr(4)], vec![1, 1, 1], 3))
			.unwrap_err();
		assert_eq!(err, CustodyError::TooManyRecipients { count: 3, limit: 2 });

		let zero = IBatcher::changeBatchTransferLimitCall {
			newBatchTransferLimit: U256::ZERO,
		}
		.abi_encode();
		assert!(matches!(
			chain.transact(Transaction::call(OWNER, batcher, zero)).unwrap_err(),
			CustodyError::InvalidConfiguration(_)
		));

		let low_gas = IBatcher::changeTransferGasLimitCall {
			newTransferGasLimit: U256::from(2_299),
		}
		.abi_encode();
		assert!(matches!(
			chain.transact(Transaction::call(OWNER, batcher, low_gas)).unwrap_err(),
			CustodyError::InvalidConfiguration(_)
		));
	}

	#[test]
	fn test_gas_limit_change_affects_recipients() {
		let (mut chain, batcher) = setup();
		let counter = chain.deploy(addr(0xcc), Arc::new(CountingReceiver)).unwrap();
		// The default stipend covers one storage write.
		chain
			.transact(batch_tx(OWNER, batcher, vec![counter], vec![1], 1))
			.unwrap();

		let input = IBatcher::changeTransferGasLimitCall {
			newTransferGasLimit: U256::from(2_300),
		}
		.abi_encode();
		let receipt = chain.transact(Transaction::call(OWNER, batcher, input)).unwrap();
		assert_eq!(
			receipt.logs[0].event,
			CustodyEvent::TransferGasLimitChange { prev: 30_000, new: 2_300 }
		);

		let err = chain
			.transact(batch_tx(OWNER, batcher, vec![counter], vec![1], 1))
			.unwrap_err();
		assert_eq!(err.root_cause(), &CustodyError::OutOfGas);
		assert_eq!(CountingReceiver::received(&chain, &counter), U256::from(1));
	}

	#[test]
	fn test_reentrant_recipient_is_rejected() {
		let (mut chain, batcher) = setup();
		let attacker = chain.deploy(addr(0xcc), Arc::new(ReentrantReceiver)).unwrap();
		let reenter = IBatcher::batchCall {
			recipients: vec![addr(2)],
			values: vec![U256::ZERO],
		}
		.abi_encode();
		ReentrantReceiver::arm(&mut chain, attacker, batcher, reenter);

		// Forward everything so the nested call is not stopped by the stipend.
		let input = IBatcher::changeTransferGasLimitCall {
			newTransferGasLimit: U256::from(1_000_000),
		}
		.abi_encode();
		chain.transact(Transaction::call(OWNER, batcher, input)).unwrap();

		let err = chain
			.transact(batch_tx(OWNER, batcher, vec![attacker], vec![1], 1))
			.unwrap_err();
		assert_eq!(err.root_cause(), &CustodyError::Reentrancy);
	}

	#[test]
	fn test_token_batch_uses_sender_allowance() {
		let (mut chain, batcher) = setup();
		let token = chain.deploy(OWNER, Arc::new(Erc20Token::new())).unwrap();
		let payer = addr(0x0a);
		chain
			.transact(Transaction::call(
				OWNER,
				token,
				IERC20::mintCall { to: payer, amount: U256::from(100) }.abi_encode(),
			))
			.unwrap();
		chain
			.transact(Transaction::call(
				payer,
				token,
				IERC20::approveCall { spender: batcher, amount: U256::from(60) }.abi_encode(),
			))
			.unwrap();

		let call = IBatcher::batchTransferFromCall {
			token,
			recipients: vec![addr(2), addr(3)],
			amounts: vec![U256::from(20), U256::from(40)],
		};
		chain
			.transact(Transaction::call(payer, batcher, call.abi_encode()))
			.unwrap();
		assert_eq!(Erc20Token::balance(&chain, &token, &addr(2)), U256::from(20));
		assert_eq!(Erc20Token::balance(&chain, &token, &addr(3)), U256::from(40));
		assert_eq!(Erc20Token::balance(&chain, &token, &payer), U256::from(40));

		// Allowance exhausted: nothing moves.
		let err = chain
			.transact(Transaction::call(payer, batcher, call.abi_encode()))
			.unwrap_err();
		assert!(matches!(err, CustodyError::CallFailed { .. }));
		assert_eq!(Erc20Token::balance(&chain, &token, &payer), U256::from(40));
	}

	#[test]
	fn test_recover_and_ownership() {
		let (mut chain, batcher) = setup();
		chain.fund(batcher, U256::from(50));
		let new_owner = addr(0x0b);
		let recover = IBatcher::recoverCall {
			to: addr(4),
			value: U256::from(50),
			data: Bytes::new(),
		}
		.abi_encode();
		assert_eq!(
			chain
				.transact(Transaction::call(new_owner, batcher, recover.clone()))
				.unwrap_err(),
			CustodyError::Unauthorized(new_owner)
		);

		let transfer = IBatcher::transferOwnershipCall { newOwner: new_owner }.abi_encode();
		chain.transact(Transaction::call(OWNER, batcher, transfer)).unwrap();
		chain
			.transact(Transaction::call(new_owner, batcher, recover))
			.unwrap();
		assert_eq!(chain.balance(&addr(4)), U256::from(50));
		assert_eq!(Batcher::state(&chain, &batcher).unwrap().owner, new_owner);
	}
}
