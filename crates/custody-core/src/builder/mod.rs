//! Builder for deploying a protocol instance.
//!
//! Turns a validated [`Config`] into a host chain and the five protocol
//! contracts. Implementations are deployed first so that the factories can
//! be pointed at them.

use crate::protocol::{Protocol, ProtocolAddresses};
use alloy_primitives::Address;
use custody_auth::SignatureAuthorizer;
use custody_batch::{Batcher, BatcherSettings};
use custody_chain::{Chain, Contract};
use custody_config::{Config, ConfigError};
use custody_factory::{ForwarderFactory, WalletFactory};
use custody_forwarder::{Forwarder, ForwarderSettings};
use custody_types::{current_timestamp, CustodyError};
use custody_wallet::{WalletSettings, WalletSimple};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while deploying a protocol instance.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),
	#[error("Failed to deploy {component}: {source}")]
	Deployment {
		component: &'static str,
		#[source]
		source: CustodyError,
	},
}

impl From<BuilderError> for CustodyError {
	fn from(err: BuilderError) -> Self {
		match err {
			BuilderError::Config(e) => CustodyError::InvalidConfiguration(e.to_string()),
			BuilderError::Deployment { source, .. } => source,
		}
	}
}

/// Builder for deploying a protocol instance from configuration.
#[derive(Debug, Clone)]
pub struct ProtocolBuilder {
	config: Config,
}

impl ProtocolBuilder {
	/// Creates a new ProtocolBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Creates an empty host chain with the configured gas limit and clock.
	pub fn chain(&self) -> Chain {
		let timestamp = self.config.chain.timestamp.unwrap_or_else(current_timestamp);
		Chain::with_timestamp(timestamp).with_block_gas_limit(self.config.chain.block_gas_limit)
	}

	/// Deploys every protocol contract from `deployer`, who becomes the Batcher owner.
	pub fn build(self, chain: &mut Chain, deployer: Address) -> Result<Protocol, BuilderError> {
		self.config.validate()?;
		let prefixes = self.config.wallet.coin_prefixes()?;

		let wallet = WalletSimple::new(WalletSettings {
			prefixes: prefixes.clone(),
			batch_limit: self.config.wallet.batch_limit,
			transfer_gas_limit: self.config.wallet.transfer_gas_limit,
		});
		let wallet_implementation = deploy(chain, deployer, "wallet", Arc::new(wallet))?;
		let forwarder_implementation = deploy(chain, deployer, "forwarder", Arc::new(Forwarder))?;
		let wallet_factory = deploy(
			chain,
			deployer,
			"wallet_factory",
			Arc::new(WalletFactory::new(wallet_implementation)),
		)?;
		let forwarder_factory = deploy(
			chain,
			deployer,
			"forwarder_factory",
			Arc::new(ForwarderFactory::new(forwarder_implementation)),
		)?;
		let batcher = deploy(
			chain,
			deployer,
			"batcher",
			Arc::new(Batcher::new(BatcherSettings {
				transfer_gas_limit: self.config.batcher.transfer_gas_limit,
				batch_transfer_limit: self.config.batcher.batch_transfer_limit,
				token_batch_transfer_limit: self.config.batcher.token_batch_transfer_limit,
			})),
		)?;

		let addresses = ProtocolAddresses {
			wallet_implementation,
			forwarder_implementation,
			wallet_factory,
			forwarder_factory,
			batcher,
		};
		let forwarder_defaults = ForwarderSettings {
			auto_flush_721: self.config.forwarder.auto_flush_721,
			auto_flush_1155: self.config.forwarder.auto_flush_1155,
		};
		tracing::info!(
			native_prefix = %prefixes.native,
			wallet_factory = %wallet_factory,
			forwarder_factory = %forwarder_factory,
			batcher = %batcher,
			"Protocol deployed"
		);
		Ok(Protocol::new(
			addresses,
			SignatureAuthorizer::new(prefixes),
			forwarder_defaults,
		))
	}
}

fn deploy(
	chain: &mut Chain,
	deployer: Address,
	component: &'static str,
	contract: Arc<dyn Contract>,
) -> Result<Address, BuilderError> {
	match chain.deploy(deployer, contract) {
		Ok(address) => {
			tracing::info!(component, address = %address, "Loaded");
			Ok(address)
		},
		Err(source) => {
			tracing::error!(component, error = %source, "Failed to deploy contract");
			Err(BuilderError::Deployment { component, source })
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use custody_config::ConfigBuilder;
	use custody_types::CoinPrefixes;

	fn deployer() -> Address {
		Address::repeat_byte(0xde)
	}

	#[test]
	fn test_build_deploys_every_contract() {
		let builder = ProtocolBuilder::new(ConfigBuilder::new().timestamp(1_000).build());
		let mut chain = builder.chain();
		assert_eq!(chain.timestamp(), 1_000);

		let protocol = builder.build(&mut chain, deployer()).unwrap();
		let addresses = *protocol.addresses();
		for address in [
			addresses.wallet_implementation,
			addresses.forwarder_implementation,
			addresses.wallet_factory,
			addresses.forwarder_factory,
			addresses.batcher,
		] {
			assert!(chain.has_code(&address));
		}
		// CREATE addresses follow the deployer's nonce.
		assert_eq!(addresses.wallet_implementation, deployer().create(0));
		assert_eq!(addresses.batcher, deployer().create(4));

		let batcher = Batcher::state(&chain, &addresses.batcher).unwrap();
		assert_eq!(batcher.owner, deployer());
		assert_eq!(protocol.authorizer().prefixes(), &CoinPrefixes::ether());
	}

	#[test]
	fn test_invalid_config_rejected_before_deploying() {
		let config = ConfigBuilder::new().transfer_gas_limit(10).build();
		let builder = ProtocolBuilder::new(config);
		let mut chain = builder.chain();
		let err = builder.build(&mut chain, deployer()).unwrap_err();
		assert!(matches!(err, BuilderError::Config(ConfigError::Validation(_))));
		assert_eq!(chain.nonce(&deployer()), 0);
	}

	#[test]
	fn test_flavor_selects_prefixes() {
		let builder = ProtocolBuilder::new(ConfigBuilder::new().flavor("polygon").build());
		let mut chain = builder.chain();
		let protocol = builder.build(&mut chain, deployer()).unwrap();
		assert_eq!(protocol.authorizer().prefixes(), &CoinPrefixes::polygon());
	}
}
