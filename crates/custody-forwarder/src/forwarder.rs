//! The `Forwarder` contract.

use crate::state::ForwarderState;
use alloy_primitives::{Address, Bytes, FixedBytes, U256};
use alloy_sol_types::SolCall;
use custody_chain::tokens::{
	erc1155_balance_of, erc1155_safe_batch_transfer_from, erc1155_safe_transfer_from,
	erc20_balance_of, erc20_transfer, erc721_owner_of, erc721_safe_transfer_from,
	supports_interface,
};
use custody_chain::{decode_call, non_reentrant, CallContext, Chain, Contract};
use custody_types::abi::IForwarder::{self, IForwarderCalls};
use custody_types::abi::{
	ERC1155_INTERFACE_ID, ERC1155_RECEIVER_INTERFACE_ID, ERC165_INTERFACE_ID, ERC721_INTERFACE_ID,
	ERC721_RECEIVER_INTERFACE_ID,
};
use custody_types::{CustodyError, CustodyEvent};
use serde::{Deserialize, Serialize};

/// Auto-flush flags new forwarders are created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderSettings {
	pub auto_flush_721: bool,
	pub auto_flush_1155: bool,
}

impl Default for ForwarderSettings {
	fn default() -> Self {
		Self {
			auto_flush_721: true,
			auto_flush_1155: true,
		}
	}
}

/// The forwarder implementation; all state lives in the clones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forwarder;

impl Forwarder {
	/// Reads the state of the forwarder at `address`.
	pub fn state<'a>(chain: &'a Chain, address: &Address) -> Option<&'a ForwarderState> {
		chain.storage::<ForwarderState>(address)
	}

	fn load(chain: &Chain, address: &Address) -> ForwarderState {
		Self::state(chain, address).cloned().unwrap_or_default()
	}

	fn initialized(chain: &Chain, address: &Address) -> Result<ForwarderState, CustodyError> {
		let state = Self::load(chain, address);
		if !state.is_initialized() {
			return Err(CustodyError::NotInitialized);
		}
		Ok(state)
	}

	/// Loads the state for a method restricted to the parent and fee address.
	fn only_allowed(chain: &Chain, ctx: &CallContext) -> Result<ForwarderState, CustodyError> {
		let state = Self::initialized(chain, &ctx.address)?;
		if !state.is_allowed(&ctx.caller) {
			return Err(CustodyError::Unauthorized(ctx.caller));
		}
		Ok(state)
	}

	fn only_parent(chain: &Chain, ctx: &CallContext) -> Result<ForwarderState, CustodyError> {
		let state = Self::initialized(chain, &ctx.address)?;
		if ctx.caller != state.parent() {
			return Err(CustodyError::Unauthorized(ctx.caller));
		}
		Ok(state)
	}

	/// Pushes the whole native balance to the parent.
	fn flush_balance(
		chain: &mut Chain,
		forwarder: Address,
		parent: Address,
	) -> Result<U256, CustodyError> {
		let balance = chain.balance(&forwarder);
		if balance.is_zero() {
			return Ok(balance);
		}
		chain
			.call(forwarder, parent, balance, &[], None)
			.map_err(|e| e.into_call_failure(parent))?;
		Ok(balance)
	}

	/// Receive and fallback: forwards the deposit and everything else held.
	fn deposit(chain: &mut Chain, ctx: &CallContext, input: &[u8]) -> Result<(), CustodyError> {
		if ctx.value.is_zero() {
			return Ok(());
		}
		let state = Self::initialized(chain, &ctx.address)?;
		non_reentrant::<ForwarderState, _, _>(chain, ctx.address, |chain| {
			chain.emit(
				ctx.address,
				CustodyEvent::ForwarderDeposited {
					from: ctx.caller,
					value: ctx.value,
					data: Bytes::copy_from_slice(input),
				},
			)?;
			Self::flush_balance(chain, ctx.address, state.parent())
		})?;
		tracing::debug!(
			forwarder = %ctx.address,
			from = %ctx.caller,
			value = %ctx.value,
			"Deposit forwarded"
		);
		Ok(())
	}

	/// `flush()` and the flush at init: no deposit attached, balance pushed as is.
	fn flush(chain: &mut Chain, ctx: &CallContext, input: &[u8]) -> Result<(), CustodyError> {
		let state = Self::initialized(chain, &ctx.address)?;
		let flushed = non_reentrant::<ForwarderState, _, _>(chain, ctx.address, |chain| {
			let balance = chain.balance(&ctx.address);
			if balance.is_zero() {
				return Ok(balance);
			}
			chain.emit(
				ctx.address,
				CustodyEvent::ForwarderDeposited {
					from: ctx.address,
					value: balance,
					data: Bytes::copy_from_slice(input),
				},
			)?;
			Self::flush_balance(chain, ctx.address, state.parent())
		})?;
		if !flushed.is_zero() {
			tracing::info!(
				forwarder = %ctx.address,
				parent = %state.parent(),
				value = %flushed,
				"Flushed"
			);
		}
		Ok(())
	}

	fn init(
		chain: &mut Chain,
		ctx: &CallContext,
		call: IForwarder::initCall,
		input: &[u8],
	) -> Result<(), CustodyError> {
		let fee_address = Some(call.feeAddress);
		chain.try_store(ctx.address, |s: &mut ForwarderState| {
			s.initialize(
				call.parentAddress,
				fee_address,
				call.autoFlush721,
				call.autoFlush1155,
			)
		})?;
		tracing::info!(
			forwarder = %ctx.address,
			parent = %call.parentAddress,
			auto_flush_721 = call.autoFlush721,
			auto_flush_1155 = call.autoFlush1155,
			"Forwarder initialized"
		);
		// Deposits may have reached the address before the clone existed.
		Self::flush(chain, ctx, input)
	}

	fn flush_erc20(
		chain: &mut Chain,
		forwarder: Address,
		parent: Address,
		token: Address,
	) -> Result<(), CustodyError> {
		let balance = erc20_balance_of(chain, forwarder, token, forwarder)
			.map_err(|e| e.into_call_failure(token))?;
		if balance.is_zero() {
			return Ok(());
		}
		erc20_transfer(chain, forwarder, token, parent, balance)
			.map_err(|e| e.into_call_failure(token))?;
		tracing::info!(
			forwarder = %forwarder,
			token = %token,
			amount = %balance,
			"ERC20 tokens flushed"
		);
		Ok(())
	}

	fn require_interface(
		chain: &mut Chain,
		forwarder: Address,
		token: Address,
		interface_id: FixedBytes<4>,
		standard: &str,
	) -> Result<(), CustodyError> {
		if supports_interface(chain, forwarder, token, interface_id) {
			Ok(())
		} else {
			Err(CustodyError::Revert(format!(
				"token {} does not support the {} interface",
				token, standard
			)))
		}
	}

	fn flush_erc721(
		chain: &mut Chain,
		forwarder: Address,
		parent: Address,
		token: Address,
		token_id: U256,
	) -> Result<(), CustodyError> {
		Self::require_interface(chain, forwarder, token, ERC721_INTERFACE_ID, "ERC721")?;
		let owner = erc721_owner_of(chain, forwarder, token, token_id)?;
		erc721_safe_transfer_from(chain, forwarder, token, owner, parent, token_id)
			.map_err(|e| e.into_call_failure(token))?;
		tracing::info!(
			forwarder = %forwarder,
			token = %token,
			token_id = %token_id,
			"ERC721 token flushed"
		);
		Ok(())
	}

	fn flush_erc1155(
		chain: &mut Chain,
		forwarder: Address,
		parent: Address,
		token: Address,
		ids: Vec<U256>,
	) -> Result<(), CustodyError> {
		Self::require_interface(chain, forwarder, token, ERC1155_INTERFACE_ID, "ERC1155")?;
		let mut amounts = Vec::with_capacity(ids.len());
		for id in &ids {
			amounts.push(erc1155_balance_of(chain, forwarder, token, forwarder, *id)?);
		}
		let count = ids.len();
		if count == 1 {
			erc1155_safe_transfer_from(
				chain,
				forwarder,
				token,
				forwarder,
				parent,
				ids[0],
				amounts[0],
			)
		} else {
			erc1155_safe_batch_transfer_from(
				chain,
				forwarder,
				token,
				forwarder,
				parent,
				ids,
				amounts,
			)
		}
		.map_err(|e| e.into_call_failure(token))?;
		tracing::info!(
			forwarder = %forwarder,
			token = %token,
			ids = count,
			"ERC1155 tokens flushed"
		);
		Ok(())
	}

	/// Receiver hook path: forwards tokens that just arrived when auto-flush is on.
	fn auto_flush<F>(
		chain: &mut Chain,
		ctx: &CallContext,
		interface_id: FixedBytes<4>,
		standard: &str,
		enabled: fn(&ForwarderState) -> bool,
		forward: F,
	) -> Result<(), CustodyError>
	where
		F: FnOnce(&mut Chain, Address) -> Result<(), CustodyError>,
	{
		let state = Self::load(chain, &ctx.address);
		if !state.is_initialized() || !enabled(&state) {
			return Ok(());
		}
		Self::require_interface(chain, ctx.address, ctx.caller, interface_id, standard)?;
		let parent = state.parent();
		non_reentrant::<ForwarderState, _, _>(chain, ctx.address, |chain| forward(chain, parent))?;
		tracing::debug!(
			forwarder = %ctx.address,
			token = %ctx.caller,
			standard,
			"Auto-flushed received tokens"
		);
		Ok(())
	}

	fn dispatch(
		chain: &mut Chain,
		ctx: &CallContext,
		call: IForwarderCalls,
		input: &[u8],
	) -> Result<Vec<u8>, CustodyError> {
		if !ctx.value.is_zero() {
			return Err(CustodyError::Revert("non-payable method".into()));
		}
		let forwarder = ctx.address;
		let output = match call {
			IForwarderCalls::init(call) => {
				Self::init(chain, ctx, call, input)?;
				Vec::new()
			},
			IForwarderCalls::parentAddress(_) => {
				let parent = Self::load(chain, &forwarder).parent();
				IForwarder::parentAddressCall::abi_encode_returns(&(parent,))
			},
			IForwarderCalls::feeAddress(_) => {
				let fee = Self::load(chain, &forwarder).fee_address().unwrap_or(Address::ZERO);
				IForwarder::feeAddressCall::abi_encode_returns(&(fee,))
			},
			IForwarderCalls::autoFlush721(_) => {
				let enabled = Self::load(chain, &forwarder).auto_flush_721();
				IForwarder::autoFlush721Call::abi_encode_returns(&(enabled,))
			},
			IForwarderCalls::autoFlush1155(_) => {
				let enabled = Self::load(chain, &forwarder).auto_flush_1155();
				IForwarder::autoFlush1155Call::abi_encode_returns(&(enabled,))
			},
			IForwarderCalls::setAutoFlush721(call) => {
				Self::only_allowed(chain, ctx)?;
				chain.store(forwarder, |s: &mut ForwarderState| {
					s.set_auto_flush_721(call.autoFlush)
				})?;
				tracing::info!(
					forwarder = %forwarder,
					enabled = call.autoFlush,
					"ERC721 auto-flush changed"
				);
				Vec::new()
			},
			IForwarderCalls::setAutoFlush1155(call) => {
				Self::only_allowed(chain, ctx)?;
				chain.store(forwarder, |s: &mut ForwarderState| {
					s.set_auto_flush_1155(call.autoFlush)
				})?;
				tracing::info!(
					forwarder = %forwarder,
					enabled = call.autoFlush,
					"ERC1155 auto-flush changed"
				);
				Vec::new()
			},
			IForwarderCalls::flush(_) => {
				Self::flush(chain, ctx, input)?;
				Vec::new()
			},
			IForwarderCalls::flushTokens(call) => {
				let parent = Self::only_allowed(chain, ctx)?.parent();
				non_reentrant::<ForwarderState, _, _>(chain, forwarder, |chain| {
					Self::flush_erc20(chain, forwarder, parent, call.tokenContractAddress)
				})?;
				Vec::new()
			},
			IForwarderCalls::batchFlushERC20Tokens(call) => {
				let parent = Self::only_allowed(chain, ctx)?.parent();
				non_reentrant::<ForwarderState, _, _>(chain, forwarder, |chain| {
					for token in call.tokenContractAddresses {
						Self::flush_erc20(chain, forwarder, parent, token)?;
					}
					Ok(())
				})?;
				Vec::new()
			},
			IForwarderCalls::flushERC721Token(call) => {
				let parent = Self::only_allowed(chain, ctx)?.parent();
				non_reentrant::<ForwarderState, _, _>(chain, forwarder, |chain| {
					Self::flush_erc721(
						chain,
						forwarder,
						parent,
						call.tokenContractAddress,
						call.tokenId,
					)
				})?;
				Vec::new()
			},
			IForwarderCalls::flushERC1155Tokens(call) => {
				let parent = Self::only_allowed(chain, ctx)?.parent();
				non_reentrant::<ForwarderState, _, _>(chain, forwarder, |chain| {
					Self::flush_erc1155(chain, forwarder, parent, call.tokenContractAddress, vec![
						call.tokenId,
					])
				})?;
				Vec::new()
			},
			IForwarderCalls::batchFlushERC1155Tokens(call) => {
				let parent = Self::only_allowed(chain, ctx)?.parent();
				non_reentrant::<ForwarderState, _, _>(chain, forwarder, |chain| {
					Self::flush_erc1155(
						chain,
						forwarder,
						parent,
						call.tokenContractAddress,
						call.tokenIds,
					)
				})?;
				Vec::new()
			},
			IForwarderCalls::callFromParent(call) => {
				Self::only_parent(chain, ctx)?;
				let result = non_reentrant::<ForwarderState, _, _>(chain, forwarder, |chain| {
					chain
						.call(forwarder, call.target, call.value, &call.data, None)
						.map_err(|e| e.into_call_failure(call.target))
				})?;
				tracing::info!(
					forwarder = %forwarder,
					target = %call.target,
					value = %call.value,
					"Parent call executed"
				);
				IForwarder::callFromParentCall::abi_encode_returns(&(result,))
			},
			IForwarderCalls::onERC721Received(call) => {
				let token = ctx.caller;
				Self::auto_flush(
					chain,
					ctx,
					ERC721_INTERFACE_ID,
					"ERC721",
					ForwarderState::auto_flush_721,
					|chain, parent| {
						erc721_safe_transfer_from(
							chain,
							forwarder,
							token,
							forwarder,
							parent,
							call.tokenId,
						)
					},
				)?;
				IForwarder::onERC721ReceivedCall::abi_encode_returns(&(FixedBytes::<4>::from(
					IForwarder::onERC721ReceivedCall::SELECTOR,
				),))
			},
			IForwarderCalls::onERC1155Received(call) => {
				let token = ctx.caller;
				Self::auto_flush(
					chain,
					ctx,
					ERC1155_INTERFACE_ID,
					"ERC1155",
					ForwarderState::auto_flush_1155,
					|chain, parent| {
						erc1155_safe_transfer_from(
							chain, forwarder, token, forwarder, parent, call.id, call.value,
						)
					},
				)?;
				IForwarder::onERC1155ReceivedCall::abi_encode_returns(&(FixedBytes::<4>::from(
					IForwarder::onERC1155ReceivedCall::SELECTOR,
				),))
			},
			IForwarderCalls::onERC1155BatchReceived(call) => {
				let token = ctx.caller;
				Self::auto_flush(
					chain,
					ctx,
					ERC1155_INTERFACE_ID,
					"ERC1155",
					ForwarderState::auto_flush_1155,
					|chain, parent| {
						erc1155_safe_batch_transfer_from(
							chain,
							forwarder,
							token,
							forwarder,
							parent,
							call.ids,
							call.values,
						)
					},
				)?;
				IForwarder::onERC1155BatchReceivedCall::abi_encode_returns(&(FixedBytes::<4>::from(
					IForwarder::onERC1155BatchReceivedCall::SELECTOR,
				),))
			},
			IForwarderCalls::supportsInterface(call) => {
				let supported = [
					ERC165_INTERFACE_ID,
					ERC721_RECEIVER_INTERFACE_ID,
					ERC1155_RECEIVER_INTERFACE_ID,
				]
				.contains(&call.interfaceId);
				IForwarder::supportsInterfaceCall::abi_encode_returns(&(supported,))
			},
		};
		Ok(output)
	}
}

impl Contract for Forwarder {
	fn name(&self) -> &'static str {
		"Forwarder"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let Some(call) = decode_call::<IForwarderCalls>(input)? else {
			Self::deposit(chain, ctx, input)?;
			return Ok(Bytes::new());
		};
		Self::dispatch(chain, ctx, call, input)
			.map(Bytes::from)
			.inspect_err(|e| {
				tracing::debug!(
					forwarder = %ctx.address,
					caller = %ctx.caller,
					error = %e,
					"Forwarder call rejected"
				)
			})
	}
}
