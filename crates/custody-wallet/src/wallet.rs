//! The `WalletSimple` contract.
//!
//! One implementation is deployed per coin-prefix configuration and every
//! wallet is a clone of it, so the settings below are shared by all clones
//! while signers, safe mode and the sequence window live in each clone's own
//! storage.

use crate::state::{SafeMode, WalletState};
use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolCall;
use custody_auth::SignatureAuthorizer;
use custody_batch::{BatchExecutor, BatchRequest, ValueBudget};
use custody_chain::tokens::erc20_transfer;
use custody_chain::{decode_call, non_reentrant, CallContext, Chain, Contract};
use custody_types::abi::IWalletSimple::{self, IWalletSimpleCalls};
use custody_types::abi::{
	IForwarder, ERC1155_RECEIVER_INTERFACE_ID, ERC165_INTERFACE_ID, ERC721_RECEIVER_INTERFACE_ID,
};
use custody_types::utils::DEFAULT_BATCH_LIMIT;
use custody_types::{
	BatchOperation, CoinPrefixes, CustodyError, CustodyEvent, NativeOperation, Operation,
	TokenOperation,
};
use serde::{Deserialize, Serialize};

/// Deployment-wide settings of a wallet implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSettings {
	pub prefixes: CoinPrefixes,
	/// Maximum number of recipients of a batch send.
	pub batch_limit: usize,
	/// Gas forwarded to each batch recipient.
	///
	/// `None` forwards all remaining gas, so contract recipients may run
	/// arbitrary fallback logic; the whole batch still reverts if one fails.
	pub transfer_gas_limit: Option<u64>,
}

impl Default for WalletSettings {
	fn default() -> Self {
		Self {
			prefixes: CoinPrefixes::default(),
			batch_limit: DEFAULT_BATCH_LIMIT,
			transfer_gas_limit: None,
		}
	}
}

/// The multi-signature wallet contract.
#[derive(Debug, Clone)]
pub struct WalletSimple {
	authorizer: SignatureAuthorizer,
	batch_limit: usize,
	transfer_gas_limit: Option<u64>,
}

impl Default for WalletSimple {
	fn default() -> Self {
		Self::new(WalletSettings::default())
	}
}

impl WalletSimple {
	pub fn new(settings: WalletSettings) -> Self {
		Self {
			authorizer: SignatureAuthorizer::new(settings.prefixes),
			batch_limit: settings.batch_limit,
			transfer_gas_limit: settings.transfer_gas_limit,
		}
	}

	pub fn authorizer(&self) -> &SignatureAuthorizer {
		&self.authorizer
	}

	/// Reads the state of the wallet at `address`.
	pub fn state<'a>(chain: &'a Chain, address: &Address) -> Option<&'a WalletState> {
		chain.storage::<WalletState>(address)
	}

	fn load(chain: &Chain, address: &Address) -> WalletState {
		Self::state(chain, address).cloned().unwrap_or_default()
	}

	/// Loads the state for a signer-only method.
	fn only_signer(chain: &Chain, ctx: &CallContext) -> Result<WalletState, CustodyError> {
		let state = Self::load(chain, &ctx.address);
		if !state.is_initialized() {
			return Err(CustodyError::NotInitialized);
		}
		if !state.is_signer(&ctx.caller) {
			return Err(CustodyError::NonSignerCaller(ctx.caller));
		}
		Ok(state)
	}

	/// Authorizes `operation` submitted by `ctx.caller` and consumes its sequence ID.
	///
	/// Returns the operation hash and the co-signer.
	fn verify_multi_sig(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		state: &WalletState,
		operation: &Operation,
		signature: &[u8],
	) -> Result<(B256, Address), CustodyError> {
		let (operation_hash, other_signer) = self.authorizer.recover(operation, signature)?;

		if state.safe_mode() == SafeMode::Active {
			if let Some(outsider) = operation
				.destinations()
				.into_iter()
				.find(|d| !state.is_signer(d))
			{
				return Err(CustodyError::SafeModeRestriction(outsider));
			}
		}

		let now = chain.timestamp();
		if operation.expire_time() <= now {
			return Err(CustodyError::Expired {
				expire_time: operation.expire_time(),
				now,
			});
		}

		let sequence_id = operation.sequence_id();
		chain.try_store(ctx.address, |s: &mut WalletState| {
			s.sequence_mut()
				.accept(sequence_id)
				.map_err(CustodyError::from)
		})?;

		if !state.is_signer(&other_signer) {
			return Err(CustodyError::InvalidSigner(other_signer));
		}
		if other_signer == ctx.caller {
			return Err(CustodyError::SignersCannotBeEqual);
		}
		Ok((operation_hash, other_signer))
	}

	fn send_multi_sig(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		call: IWalletSimple::sendMultiSigCall,
	) -> Result<(), CustodyError> {
		let state = Self::only_signer(chain, ctx)?;
		let operation: Operation = NativeOperation {
			to: call.toAddress,
			value: call.value,
			data: call.data.clone(),
			expire_time: u64_arg(call.expireTime, "expireTime")?,
			sequence_id: u64_arg(call.sequenceId, "sequenceId")?,
		}
		.into();

		non_reentrant::<WalletState, _, _>(chain, ctx.address, |chain| {
			let (operation_hash, other_signer) =
				self.verify_multi_sig(chain, ctx, &state, &operation, &call.signature)?;

			let available = chain.balance(&ctx.address);
			if available < call.value {
				return Err(CustodyError::InsufficientFunds {
					required: call.value,
					available,
				});
			}

			chain.emit(
				ctx.address,
				CustodyEvent::Transacted {
					msg_sender: ctx.caller,
					other_signer,
					operation: operation_hash,
					to_address: call.toAddress,
					value: call.value,
					data: call.data.clone(),
				},
			)?;
			chain
				.call(ctx.address, call.toAddress, call.value, &call.data, None)
				.map_err(|e| e.into_call_failure(call.toAddress))?;

			tracing::info!(
				wallet = %ctx.address,
				to = %call.toAddress,
				value = %call.value,
				sequence_id = operation.sequence_id(),
				"Multisig send executed"
			);
			Ok(())
		})
	}

	fn send_multi_sig_token(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		call: IWalletSimple::sendMultiSigTokenCall,
	) -> Result<(), CustodyError> {
		let state = Self::only_signer(chain, ctx)?;
		let operation: Operation = TokenOperation {
			to: call.toAddress,
			value: call.value,
			token_contract: call.tokenContractAddress,
			expire_time: u64_arg(call.expireTime, "expireTime")?,
			sequence_id: u64_arg(call.sequenceId, "sequenceId")?,
		}
		.into();

		non_reentrant::<WalletState, _, _>(chain, ctx.address, |chain| {
			let (operation_hash, other_signer) =
				self.verify_multi_sig(chain, ctx, &state, &operation, &call.signature)?;

			erc20_transfer(
				chain,
				ctx.address,
				call.tokenContractAddress,
				call.toAddress,
				call.value,
			)
			.map_err(|e| e.into_call_failure(call.tokenContractAddress))?;

			chain.emit(
				ctx.address,
				CustodyEvent::Transacted {
					msg_sender: ctx.caller,
					other_signer,
					operation: operation_hash,
					to_address: call.toAddress,
					value: call.value,
					data: Bytes::copy_from_slice(call.tokenContractAddress.as_slice()),
				},
			)?;
			tracing::info!(
				wallet = %ctx.address,
				token = %call.tokenContractAddress,
				to = %call.toAddress,
				value = %call.value,
				"Multisig token send executed"
			);
			Ok(())
		})
	}

	fn send_multi_sig_batch(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		call: IWalletSimple::sendMultiSigBatchCall,
	) -> Result<(), CustodyError> {
		let state = Self::only_signer(chain, ctx)?;
		let executor = BatchExecutor::new(self.batch_limit, self.transfer_gas_limit);
		let request = BatchRequest::new(call.recipients, call.values);
		executor.validate(&request)?;

		let operation: Operation = BatchOperation {
			recipients: request.recipients.clone(),
			values: request.values.clone(),
			expire_time: u64_arg(call.expireTime, "expireTime")?,
			sequence_id: u64_arg(call.sequenceId, "sequenceId")?,
		}
		.into();

		non_reentrant::<WalletState, _, _>(chain, ctx.address, |chain| {
			let (operation_hash, other_signer) =
				self.verify_multi_sig(chain, ctx, &state, &operation, &call.signature)?;

			let total = executor.execute(
				chain,
				ctx.address,
				ctx.caller,
				&request,
				ValueBudget::Balance,
			)?;
			chain.emit(
				ctx.address,
				CustodyEvent::BatchTransacted {
					msg_sender: ctx.caller,
					other_signer,
					operation: operation_hash,
				},
			)?;
			tracing::info!(
				wallet = %ctx.address,
				recipients = request.len(),
				total = %total,
				"Multisig batch executed"
			);
			Ok(())
		})
	}

	fn activate_safe_mode(chain: &mut Chain, ctx: &CallContext) -> Result<(), CustodyError> {
		Self::only_signer(chain, ctx)?;
		let changed = chain.store(ctx.address, |s: &mut WalletState| s.activate_safe_mode())?;
		if changed {
			chain.emit(
				ctx.address,
				CustodyEvent::SafeModeActivated {
					msg_sender: ctx.caller,
				},
			)?;
			tracing::warn!(wallet = %ctx.address, signer = %ctx.caller, "Safe mode activated");
		}
		Ok(())
	}

	/// Relays a call to a forwarder this wallet is parent of.
	fn relay_to_forwarder<C: SolCall>(
		chain: &mut Chain,
		ctx: &CallContext,
		forwarder: Address,
		call: C,
	) -> Result<(), CustodyError> {
		Self::only_signer(chain, ctx)?;
		let input = call.abi_encode();
		non_reentrant::<WalletState, _, _>(chain, ctx.address, |chain| {
			chain
				.call(ctx.address, forwarder, U256::ZERO, &input, None)
				.map_err(|e| e.into_call_failure(forwarder))?;
			Ok(())
		})?;
		tracing::debug!(
			wallet = %ctx.address,
			forwarder = %forwarder,
			method = C::SIGNATURE,
			"Relayed to forwarder"
		);
		Ok(())
	}

	fn dispatch(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		call: IWalletSimpleCalls,
	) -> Result<Vec<u8>, CustodyError> {
		if !ctx.value.is_zero() {
			return Err(CustodyError::Revert("non-payable method".into()));
		}
		let output = match call {
			IWalletSimpleCalls::init(call) => {
				let signers = call.allowedSigners;
				let count = signers.len();
				chain.try_store(ctx.address, |s: &mut WalletState| s.initialize(signers))?;
				tracing::info!(wallet = %ctx.address, signers = count, "Wallet initialized");
				Vec::new()
			},
			IWalletSimpleCalls::initialized(_) => {
				let initialized = Self::load(chain, &ctx.address).is_initialized();
				IWalletSimple::initializedCall::abi_encode_returns(&(initialized,))
			},
			IWalletSimpleCalls::isSigner(call) => {
				let allowed = Self::load(chain, &ctx.address).is_signer(&call.signer);
				IWalletSimple::isSignerCall::abi_encode_returns(&(allowed,))
			},
			IWalletSimpleCalls::getSigners(_) => {
				let signers = Self::load(chain, &ctx.address).signers().to_vec();
				IWalletSimple::getSignersCall::abi_encode_returns(&(signers,))
			},
			IWalletSimpleCalls::safeMode(_) => {
				let active = Self::load(chain, &ctx.address).safe_mode() == SafeMode::Active;
				IWalletSimple::safeModeCall::abi_encode_returns(&(active,))
			},
			IWalletSimpleCalls::getNextSequenceId(_) => {
				let next = Self::load(chain, &ctx.address).sequence().next_sequence_id();
				IWalletSimple::getNextSequenceIdCall::abi_encode_returns(&(U256::from(next),))
			},
			IWalletSimpleCalls::sendMultiSig(call) => {
				self.send_multi_sig(chain, ctx, call)?;
				Vec::new()
			},
			IWalletSimpleCalls::sendMultiSigToken(call) => {
				self.send_multi_sig_token(chain, ctx, call)?;
				Vec::new()
			},
			IWalletSimpleCalls::sendMultiSigBatch(call) => {
				self.send_multi_sig_batch(chain, ctx, call)?;
				Vec::new()
			},
			IWalletSimpleCalls::activateSafeMode(_) => {
				Self::activate_safe_mode(chain, ctx)?;
				Vec::new()
			},
			IWalletSimpleCalls::flushForwarderTokens(call) => {
				let relayed = IForwarder::flushTokensCall {
					tokenContractAddress: call.tokenContractAddress,
				};
				Self::relay_to_forwarder(chain, ctx, call.forwarderAddress, relayed)?;
				Vec::new()
			},
			IWalletSimpleCalls::flushERC721ForwarderTokens(call) => {
				let relayed = IForwarder::flushERC721TokenCall {
					tokenContractAddress: call.tokenContractAddress,
					tokenId: call.tokenId,
				};
				Self::relay_to_forwarder(chain, ctx, call.forwarderAddress, relayed)?;
				Vec::new()
			},
			IWalletSimpleCalls::flushERC1155ForwarderTokens(call) => {
				let relayed = IForwarder::flushERC1155TokensCall {
					tokenContractAddress: call.tokenContractAddress,
					tokenId: call.tokenId,
				};
				Self::relay_to_forwarder(chain, ctx, call.forwarderAddress, relayed)?;
				Vec::new()
			},
			IWalletSimpleCalls::batchFlushERC1155ForwarderTokens(call) => {
				let relayed = IForwarder::batchFlushERC1155TokensCall {
					tokenContractAddress: call.tokenContractAddress,
					tokenIds: call.tokenIds,
				};
				Self::relay_to_forwarder(chain, ctx, call.forwarderAddress, relayed)?;
				Vec::new()
			},
			IWalletSimpleCalls::setAutoFlush721(call) => {
				let relayed = IForwarder::setAutoFlush721Call {
					autoFlush: call.autoFlush,
				};
				Self::relay_to_forwarder(chain, ctx, call.forwarderAddress, relayed)?;
				Vec::new()
			},
			IWalletSimpleCalls::setAutoFlush1155(call) => {
				let relayed = IForwarder::setAutoFlush1155Call {
					autoFlush: call.autoFlush,
				};
				Self::relay_to_forwarder(chain, ctx, call.forwarderAddress, relayed)?;
				Vec::new()
			},
			IWalletSimpleCalls::onERC721Received(_) => {
				IWalletSimple::onERC721ReceivedCall::abi_encode_returns(&(FixedBytes::<4>::from(
					IWalletSimple::onERC721ReceivedCall::SELECTOR,
				),))
			},
			IWalletSimpleCalls::onERC1155Received(_) => {
				IWalletSimple::onERC1155ReceivedCall::abi_encode_returns(&(FixedBytes::<4>::from(
					IWalletSimple::onERC1155ReceivedCall::SELECTOR,
				),))
			},
			IWalletSimpleCalls::onERC1155BatchReceived(_) => {
				IWalletSimple::onERC1155BatchReceivedCall::abi_encode_returns(&(
					FixedBytes::<4>::from(IWalletSimple::onERC1155BatchReceivedCall::SELECTOR),
				))
			},
			IWalletSimpleCalls::supportsInterface(call) => {
				let supported = [
					ERC165_INTERFACE_ID,
					ERC721_RECEIVER_INTERFACE_ID,
					ERC1155_RECEIVER_INTERFACE_ID,
				]
				.contains(&call.interfaceId);
				IWalletSimple::supportsInterfaceCall::abi_encode_returns(&(supported,))
			},
		};
		Ok(output)
	}
}

impl Contract for WalletSimple {
	fn name(&self) -> &'static str {
		"WalletSimple"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let Some(call) = decode_call::<IWalletSimpleCalls>(input)? else {
			// Receive and fallback both accept deposits.
			if !ctx.value.is_zero() {
				chain.emit(
					ctx.address,
					CustodyEvent::Deposited {
						from: ctx.caller,
						value: ctx.value,
						data: Bytes::copy_from_slice(input),
					},
				)?;
			}
			return Ok(Bytes::new());
		};
		self.dispatch(chain, ctx, call)
			.map(Bytes::from)
			.inspect_err(|e| {
				tracing::debug!(
					wallet = %ctx.address,
					caller = %ctx.caller,
					error = %e,
					"Wallet call rejected"
				)
			})
	}
}

/// Narrows a `uint256` argument to the `u64` range the wallet works in.
fn u64_arg(value: U256, name: &str) -> Result<u64, CustodyError> {
	u64::try_from(value)
		.map_err(|_| CustodyError::InvalidCalldata(format!("{} out of range", name)))
}
