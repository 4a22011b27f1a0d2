//! A deployed protocol instance.

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use custody_auth::SignatureAuthorizer;
use custody_chain::{Chain, Transaction};
use custody_factory::{predict_forwarder_address, predict_wallet_address};
use custody_forwarder::ForwarderSettings;
use custody_types::abi::{IForwarderFactory, IWalletFactory};
use custody_types::{CustodyError, Operation};
use serde::{Deserialize, Serialize};

/// Where each protocol contract was deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAddresses {
	pub wallet_implementation: Address,
	pub forwarder_implementation: Address,
	pub wallet_factory: Address,
	pub forwarder_factory: Address,
	pub batcher: Address,
}

/// Handle on a deployed protocol instance.
#[derive(Debug, Clone)]
pub struct Protocol {
	addresses: ProtocolAddresses,
	authorizer: SignatureAuthorizer,
	forwarder_defaults: ForwarderSettings,
}

impl Protocol {
	pub(crate) fn new(
		addresses: ProtocolAddresses,
		authorizer: SignatureAuthorizer,
		forwarder_defaults: ForwarderSettings,
	) -> Self {
		Self {
			addresses,
			authorizer,
			forwarder_defaults,
		}
	}

	pub fn addresses(&self) -> &ProtocolAddresses {
		&self.addresses
	}

	/// Hashing and recovery under the wallets' coin prefixes.
	pub fn authorizer(&self) -> &SignatureAuthorizer {
		&self.authorizer
	}

	/// Digest a co-signer signs to authorize `operation` on any wallet of this instance.
	pub fn operation_hash(&self, operation: &Operation) -> B256 {
		self.authorizer.operation_hash(operation)
	}

	pub fn forwarder_defaults(&self) -> ForwarderSettings {
		self.forwarder_defaults
	}

	/// Address the wallet factory will deploy `signers` at for `salt`.
	pub fn predict_wallet(&self, signers: &[Address], salt: &B256) -> Address {
		predict_wallet_address(
			&self.addresses.wallet_factory,
			&self.addresses.wallet_implementation,
			signers,
			salt,
		)
	}

	/// Address the forwarder factory will deploy a forwarder to `parent` at for `salt`.
	pub fn predict_forwarder(
		&self,
		parent: &Address,
		fee_address: Option<&Address>,
		salt: &B256,
	) -> Address {
		predict_forwarder_address(
			&self.addresses.forwarder_factory,
			&self.addresses.forwarder_implementation,
			parent,
			fee_address,
			salt,
		)
	}

	/// Creates and initializes a wallet clone in one transaction sent by `sender`.
	pub fn create_wallet(
		&self,
		chain: &mut Chain,
		sender: Address,
		signers: Vec<Address>,
		salt: B256,
	) -> Result<Address, CustodyError> {
		let call = IWalletFactory::createWalletCall {
			allowedSigners: signers,
			salt,
		};
		let receipt = chain.transact(Transaction::call(
			sender,
			self.addresses.wallet_factory,
			call.abi_encode(),
		))?;
		let wallet =
			IWalletFactory::createWalletCall::abi_decode_returns(&receipt.output, true)?.wallet;
		tracing::debug!(wallet = %wallet, gas_used = receipt.gas_used, "Wallet deployed");
		Ok(wallet)
	}

	/// Creates a forwarder with the configured auto-flush defaults.
	pub fn create_forwarder(
		&self,
		chain: &mut Chain,
		sender: Address,
		parent: Address,
		fee_address: Option<Address>,
		salt: B256,
	) -> Result<Address, CustodyError> {
		self.create_forwarder_with(
			chain,
			sender,
			parent,
			fee_address,
			salt,
			self.forwarder_defaults,
		)
	}

	/// Creates a forwarder with explicit auto-flush flags.
	pub fn create_forwarder_with(
		&self,
		chain: &mut Chain,
		sender: Address,
		parent: Address,
		fee_address: Option<Address>,
		salt: B256,
		settings: ForwarderSettings,
	) -> Result<Address, CustodyError> {
		let call = IForwarderFactory::createForwarderCall {
			parent,
			feeAddress: fee_address.unwrap_or(Address::ZERO),
			salt,
			shouldAutoFlushERC721: settings.auto_flush_721,
			shouldAutoFlushERC1155: settings.auto_flush_1155,
		};
		let receipt = chain.transact(Transaction::call(
			sender,
			self.addresses.forwarder_factory,
			call.abi_encode(),
		))?;
		let forwarder =
			IForwarderFactory::createForwarderCall::abi_decode_returns(&receipt.output, true)?
				.forwarder;
		tracing::debug!(
			forwarder = %forwarder,
			parent = %parent,
			gas_used = receipt.gas_used,
			"Forwarder deployed"
		);
		Ok(forwarder)
	}
}
