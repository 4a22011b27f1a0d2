//! Configuration module for the custody protocol.
//!
//! This module provides the structures that describe one protocol deployment:
//! host chain parameters, the wallet's coin prefixes and batch limit, the
//! Batcher's administration settings and the auto-flush defaults of new
//! forwarders. Configuration is read from TOML files and validated before use.
//!
//! A file may pull sections from other files with `include`, and values may
//! reference environment variables as `${VAR}` or `${VAR:-default}`.

/// Fluent construction of configurations for tests and tooling.
pub mod builders;
mod loader;

pub use builders::config::ConfigBuilder;
pub use loader::ConfigLoader;

use custody_types::utils::{
	DEFAULT_BATCH_LIMIT, DEFAULT_BLOCK_GAS_LIMIT, DEFAULT_TRANSFER_GAS_LIMIT, MIN_BATCH_LIMIT,
	MIN_TRANSFER_GAS_LIMIT,
};
use custody_types::CoinPrefixes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Gas a host block must at least provide to run one transaction.
const MIN_BLOCK_GAS_LIMIT: u64 = 21_000;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure of a protocol deployment.
///
/// Every section is optional in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
	/// Host chain parameters.
	pub chain: ChainConfig,
	/// Wallet implementation settings.
	pub wallet: WalletConfig,
	/// Batcher administration settings.
	pub batcher: BatcherConfig,
	/// Defaults for newly created forwarders.
	pub forwarder: ForwarderConfig,
}

/// Host chain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
	/// Gas available to each transaction.
	#[serde(default = "default_block_gas_limit")]
	pub block_gas_limit: u64,
	/// Fixed genesis timestamp; the current time when unset.
	#[serde(default)]
	pub timestamp: Option<u64>,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self {
			block_gas_limit: default_block_gas_limit(),
			timestamp: None,
		}
	}
}

fn default_block_gas_limit() -> u64 {
	DEFAULT_BLOCK_GAS_LIMIT
}

/// Wallet implementation settings.
///
/// The coin prefixes are taken either from a named `flavor` preset or from
/// an explicit `[wallet.prefixes]` table, never both.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Name of a built-in prefix preset (`ether`, `polygon`, `arbitrum`, `optimism`).
	#[serde(default)]
	pub flavor: Option<String>,
	/// Explicit prefixes.
	#[serde(default)]
	pub prefixes: Option<CoinPrefixes>,
	/// Maximum number of recipients of a batch send.
	#[serde(default = "default_batch_limit")]
	pub batch_limit: usize,
	/// Gas forwarded to each batch recipient; all remaining gas when unset.
	#[serde(default)]
	pub transfer_gas_limit: Option<u64>,
}

impl Default for WalletConfig {
	fn default() -> Self {
		Self {
			flavor: None,
			prefixes: None,
			batch_limit: default_batch_limit(),
			transfer_gas_limit: None,
		}
	}
}

impl WalletConfig {
	/// Resolves the configured prefixes; the `ether` preset when nothing is set.
	pub fn coin_prefixes(&self) -> Result<CoinPrefixes, ConfigError> {
		match (&self.flavor, &self.prefixes) {
			(Some(_), Some(_)) => Err(ConfigError::Validation(
				"wallet.flavor and wallet.prefixes are mutually exclusive".into(),
			)),
			(Some(flavor), None) => CoinPrefixes::preset(flavor).ok_or_else(|| {
				ConfigError::Validation(format!("Unknown wallet flavor '{}'", flavor))
			}),
			(None, Some(prefixes)) => Ok(prefixes.clone()),
			(None, None) => Ok(CoinPrefixes::ether()),
		}
	}
}

fn default_batch_limit() -> usize {
	DEFAULT_BATCH_LIMIT
}

/// Batcher administration settings applied at deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatcherConfig {
	/// Gas stipend of each native transfer.
	#[serde(default = "default_transfer_gas_limit")]
	pub transfer_gas_limit: u64,
	/// Maximum recipients of a native batch.
	#[serde(default = "default_batch_limit")]
	pub batch_transfer_limit: usize,
	/// Maximum recipients of a token batch.
	#[serde(default = "default_batch_limit")]
	pub token_batch_transfer_limit: usize,
}

impl Default for BatcherConfig {
	fn default() -> Self {
		Self {
			transfer_gas_limit: default_transfer_gas_limit(),
			batch_transfer_limit: default_batch_limit(),
			token_batch_transfer_limit: default_batch_limit(),
		}
	}
}

fn default_transfer_gas_limit() -> u64 {
	DEFAULT_TRANSFER_GAS_LIMIT
}

/// Auto-flush flags new forwarders are created with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ForwarderConfig {
	#[serde(default = "default_true")]
	pub auto_flush_721: bool,
	#[serde(default = "default_true")]
	pub auto_flush_1155: bool,
}

impl Default for ForwarderConfig {
	fn default() -> Self {
		Self {
			auto_flush_721: true,
			auto_flush_1155: true,
		}
	}
}

fn default_true() -> bool {
	true
}

/// Largest configuration text accepted before variable substitution.
const MAX_CONFIG_SIZE: usize = 1 << 20;

/// Substitutes `${VAR}` and `${VAR:-default}` references with environment values.
///
/// A reference without a default to an unset variable is an error.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_CONFIG_SIZE {
		return Err(ConfigError::Validation(format!(
			"configuration is {} bytes, limit is {}",
			input.len(),
			MAX_CONFIG_SIZE
		)));
	}

	let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(e.to_string()))?;

	let mut missing: Option<String> = None;
	let resolved = pattern.replace_all(input, |caps: &regex::Captures<'_>| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(name) => Err(ConfigError::Validation(format!(
			"environment variable {} is not set",
			name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Reads the configuration at `path`, following its `include` list.
	///
	/// Included paths are relative to the directory of `path`.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path = Path::new(path);
		let dir = match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		};
		let file = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("{} does not name a file", path.display()))
		})?;
		ConfigLoader::new(dir).load_config(file).await
	}

	/// Validates the configuration against the protocol's floors.
	///
	/// - block gas limit covers at least one transaction
	/// - wallet prefixes resolve, are non-empty and distinct
	/// - batch limits are at least 1
	/// - the Batcher's transfer stipend is at least 2300 gas
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.chain.block_gas_limit < MIN_BLOCK_GAS_LIMIT {
			return Err(ConfigError::Validation(format!(
				"chain.block_gas_limit must be at least {}",
				MIN_BLOCK_GAS_LIMIT
			)));
		}

		self.wallet
			.coin_prefixes()?
			.validate()
			.map_err(ConfigError::Validation)?;
		if self.wallet.batch_limit < MIN_BATCH_LIMIT {
			return Err(ConfigError::Validation(format!(
				"wallet.batch_limit must be at least {}",
				MIN_BATCH_LIMIT
			)));
		}
		if let Some(limit) = self.wallet.transfer_gas_limit {
			if limit < MIN_TRANSFER_GAS_LIMIT {
				return Err(ConfigError::Validation(format!(
					"wallet.transfer_gas_limit must be at least {}",
					MIN_TRANSFER_GAS_LIMIT
				)));
			}
		}

		if self.batcher.transfer_gas_limit < MIN_TRANSFER_GAS_LIMIT {
			return Err(ConfigError::Validation(format!(
				"batcher.transfer_gas_limit must be at least {}",
				MIN_TRANSFER_GAS_LIMIT
			)));
		}
		if self.batcher.batch_transfer_limit < MIN_BATCH_LIMIT {
			return Err(ConfigError::Validation(format!(
				"batcher.batch_transfer_limit must be at least {}",
				MIN_BATCH_LIMIT
			)));
		}
		if self.batcher.token_batch_transfer_limit < MIN_BATCH_LIMIT {
			return Err(ConfigError::Validation(format!(
				"batcher.token_batch_transfer_limit must be at least {}",
				MIN_BATCH_LIMIT
			)));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
