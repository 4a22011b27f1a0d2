//! Factory contracts for wallet and forwarder clones.

use crate::address::CreatorArgs;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use custody_chain::{decode_call, CallContext, Chain, Code, Contract};
use custody_types::abi::{IForwarder, IForwarderFactory, IWalletFactory, IWalletSimple};
use custody_types::{CustodyError, CustodyEvent};

/// Deploys clones of one implementation and initializes them in the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicFactory {
	implementation: Address,
}

impl DeterministicFactory {
	pub fn new(implementation: Address) -> Self {
		Self { implementation }
	}

	pub fn implementation(&self) -> Address {
		self.implementation
	}

	/// Deploys a clone at the address derived from `args` and `salt`, then
	/// calls it with `init_input`.
	///
	/// Fails with `AlreadyDeployed` when the same arguments and salt were used
	/// before. A failing initializer undoes the deployment.
	pub fn create_clone(
		&self,
		chain: &mut Chain,
		factory: Address,
		args: &CreatorArgs,
		salt: &B256,
		init_input: &[u8],
	) -> Result<Address, CustodyError> {
		let calculation_salt = args.calculation_salt(salt);
		let clone = chain.create2(
			factory,
			calculation_salt,
			Code::Proxy {
				implementation: self.implementation,
			},
		)?;
		chain
			.call(factory, clone, U256::ZERO, init_input, None)
			.map_err(|e| e.into_call_failure(clone))?;
		tracing::debug!(factory = %factory, clone = %clone, "Clone created");
		Ok(clone)
	}
}

fn reject_value(ctx: &CallContext) -> Result<(), CustodyError> {
	if !ctx.value.is_zero() {
		return Err(CustodyError::Revert("non-payable method".into()));
	}
	Ok(())
}

/// Creates wallet clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletFactory {
	factory: DeterministicFactory,
}

impl WalletFactory {
	pub fn new(implementation: Address) -> Self {
		Self {
			factory: DeterministicFactory::new(implementation),
		}
	}
}

impl Contract for WalletFactory {
	fn name(&self) -> &'static str {
		"WalletFactory"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let Some(call) = decode_call::<IWalletFactory::IWalletFactoryCalls>(input)? else {
			return Err(CustodyError::InvalidFallback);
		};
		reject_value(ctx)?;
		let output = match call {
			IWalletFactory::IWalletFactoryCalls::implementationAddress(_) => {
				IWalletFactory::implementationAddressCall::abi_encode_returns(&(self
					.factory
					.implementation(),))
			},
			IWalletFactory::IWalletFactoryCalls::createWallet(call) => {
				let signers = call.allowedSigners;
				let init = IWalletSimple::initCall {
					allowedSigners: signers.clone(),
				}
				.abi_encode();
				let args = CreatorArgs::Wallet {
					signers: signers.clone(),
				};
				let wallet = self
					.factory
					.create_clone(chain, ctx.address, &args, &call.salt, &init)?;
				chain.emit(ctx.address, CustodyEvent::WalletCreated { wallet, signers })?;
				tracing::info!(factory = %ctx.address, wallet = %wallet, "Wallet created");
				IWalletFactory::createWalletCall::abi_encode_returns(&(wallet,))
			},
		};
		Ok(output.into())
	}
}

/// Creates forwarder clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderFactory {
	factory: DeterministicFactory,
}

impl ForwarderFactory {
	pub fn new(implementation: Address) -> Self {
		Self {
			factory: DeterministicFactory::new(implementation),
		}
	}
}

impl Contract for ForwarderFactory {
	fn name(&self) -> &'static str {
		"ForwarderFactory"
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		let Some(call) = decode_call::<IForwarderFactory::IForwarderFactoryCalls>(input)? else {
			return Err(CustodyError::InvalidFallback);
		};
		reject_value(ctx)?;
		let output = match call {
			IForwarderFactory::IForwarderFactoryCalls::implementationAddress(_) => {
				IForwarderFactory::implementationAddressCall::abi_encode_returns(&(self
					.factory
					.implementation(),))
			},
			IForwarderFactory::IForwarderFactoryCalls::createForwarder(call) => {
				let fee_address = (call.feeAddress != Address::ZERO).then_some(call.feeAddress);
				let init = IForwarder::initCall {
					parentAddress: call.parent,
					feeAddress: call.feeAddress,
					autoFlush721: call.shouldAutoFlushERC721,
					autoFlush1155: call.shouldAutoFlushERC1155,
				}
				.abi_encode();
				let args = CreatorArgs::Forwarder {
					parent: call.parent,
					fee_address,
				};
				let forwarder = self
					.factory
					.create_clone(chain, ctx.address, &args, &call.salt, &init)?;
				chain.emit(
					ctx.address,
					CustodyEvent::ForwarderCreated {
						forwarder,
						parent: call.parent,
						fee_address,
						auto_flush_721: call.shouldAutoFlushERC721,
						auto_flush_1155: call.shouldAutoFlushERC1155,
					},
				)?;
				tracing::info!(
					factory = %ctx.address,
					forwarder = %forwarder,
					parent = %call.parent,
					"Forwarder created"
				);
				IForwarderFactory::createForwarderCall::abi_encode_returns(&(forwarder,))
			},
		};
		Ok(output.into())
	}
}
