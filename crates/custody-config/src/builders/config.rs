//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, without going through a TOML file.

use crate::{Config, ConfigError, ForwarderConfig};
use custody_types::CoinPrefixes;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
	config: Config,
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with the protocol defaults.
	pub fn new() -> Self {
		Self::default()
	}

	/// Fixes the genesis timestamp of the host chain.
	pub fn timestamp(mut self, timestamp: u64) -> Self {
		self.config.chain.timestamp = Some(timestamp);
		self
	}

	/// Sets the per-transaction gas limit.
	pub fn block_gas_limit(mut self, limit: u64) -> Self {
		self.config.chain.block_gas_limit = limit;
		self
	}

	/// Selects a prefix preset by name.
	pub fn flavor(mut self, flavor: impl Into<String>) -> Self {
		self.config.wallet.flavor = Some(flavor.into());
		self.config.wallet.prefixes = None;
		self
	}

	/// Sets explicit coin prefixes.
	pub fn prefixes(mut self, prefixes: CoinPrefixes) -> Self {
		self.config.wallet.prefixes = Some(prefixes);
		self.config.wallet.flavor = None;
		self
	}

	/// Sets the wallet batch limit.
	pub fn wallet_batch_limit(mut self, limit: usize) -> Self {
		self.config.wallet.batch_limit = limit;
		self
	}

	/// Caps the gas each wallet batch recipient receives.
	pub fn wallet_transfer_gas_limit(mut self, limit: u64) -> Self {
		self.config.wallet.transfer_gas_limit = Some(limit);
		self
	}

	/// Sets the Batcher's per-recipient gas stipend.
	pub fn transfer_gas_limit(mut self, limit: u64) -> Self {
		self.config.batcher.transfer_gas_limit = limit;
		self
	}

	/// Sets both Batcher batch limits.
	pub fn batcher_limits(mut self, native: usize, token: usize) -> Self {
		self.config.batcher.batch_transfer_limit = native;
		self.config.batcher.token_batch_transfer_limit = token;
		self
	}

	/// Sets the auto-flush defaults of new forwarders.
	pub fn auto_flush(mut self, erc721: bool, erc1155: bool) -> Self {
		self.config.forwarder = ForwarderConfig {
			auto_flush_721: erc721,
			auto_flush_1155: erc1155,
		};
		self
	}

	/// Builds the `Config` with the configured values, unvalidated.
	pub fn build(self) -> Config {
		self.config
	}

	/// Builds and validates the `Config`.
	pub fn try_build(self) -> Result<Config, ConfigError> {
		self.config.validate()?;
		Ok(self.config)
	}
}

impl From<Config> for ConfigBuilder {
	fn from(config: Config) -> Self {
		Self { config }
	}
}
