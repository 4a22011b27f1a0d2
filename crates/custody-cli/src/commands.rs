//! Off-chain helpers for operators and co-signers.
//!
//! Every command is pure: addresses are derived from CREATE2 inputs, hashes
//! from operation fields, and signers from signatures. Nothing touches a chain.

use alloy_primitives::{Address, Bytes, B256, U256};
use clap::{Args, Subcommand};
use custody_auth::{recover_signer, SignatureAuthorizer};
use custody_config::{Config, ConfigError};
use custody_factory::{predict_forwarder_address, predict_wallet_address};
use custody_types::{
	without_0x_prefix, BatchOperation, CoinPrefixes, CustodyError, NativeOperation, Operation,
	TokenOperation,
};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Custody(#[from] CustodyError),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Serialization error: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Predict the address a wallet factory deploys a signer set at
	PredictWallet(PredictWalletArgs),
	/// Predict the address a forwarder factory deploys a forwarder at
	PredictForwarder(PredictForwarderArgs),
	/// Compute the hash a co-signer signs for an operation
	Hash {
		#[command(subcommand)]
		operation: HashCommand,
	},
	/// Recover the signer of an operation hash
	Recover(RecoverArgs),
}

#[derive(Args, Debug)]
pub struct PredictWalletArgs {
	/// Wallet factory address
	#[arg(long)]
	pub factory: Address,
	/// Wallet implementation address
	#[arg(long)]
	pub implementation: Address,
	/// Wallet signer, repeated once per signer in order
	#[arg(long = "signer", required = true)]
	pub signers: Vec<Address>,
	/// Caller-chosen salt, zero when omitted
	#[arg(long)]
	pub salt: Option<B256>,
}

#[derive(Args, Debug)]
pub struct PredictForwarderArgs {
	/// Forwarder factory address
	#[arg(long)]
	pub factory: Address,
	/// Forwarder implementation address
	#[arg(long)]
	pub implementation: Address,
	/// Address deposits are forwarded to
	#[arg(long)]
	pub parent: Address,
	/// Optional second address allowed to flush
	#[arg(long)]
	pub fee_address: Option<Address>,
	/// Caller-chosen salt, zero when omitted
	#[arg(long)]
	pub salt: Option<B256>,
}

#[derive(Subcommand, Debug)]
pub enum HashCommand {
	/// Single native currency send
	Native {
		#[arg(long)]
		to: Address,
		#[arg(long)]
		value: U256,
		/// Calldata forwarded with the value
		#[arg(long)]
		data: Option<Bytes>,
		#[arg(long)]
		expire_time: u64,
		#[arg(long)]
		sequence_id: u64,
	},
	/// ERC20 token send
	Token {
		#[arg(long)]
		to: Address,
		#[arg(long)]
		value: U256,
		#[arg(long)]
		token: Address,
		#[arg(long)]
		expire_time: u64,
		#[arg(long)]
		sequence_id: u64,
	},
	/// Native currency batch send
	Batch {
		#[arg(long = "recipient", required = true)]
		recipients: Vec<Address>,
		#[arg(long = "value", required = true)]
		values: Vec<U256>,
		#[arg(long)]
		expire_time: u64,
		#[arg(long)]
		sequence_id: u64,
	},
}

#[derive(Args, Debug)]
pub struct RecoverArgs {
	/// 32-byte operation hash
	#[arg(long)]
	pub hash: B256,
	/// 65-byte `r ‖ s ‖ v` signature, hex encoded
	#[arg(long)]
	pub signature: String,
}

/// Result of a command, printed as text or JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
	Wallet { address: Address },
	Forwarder { address: Address },
	Hash { prefix: String, hash: B256 },
	Signer { address: Address },
}

impl Output {
	pub fn to_json(&self) -> Result<String, CliError> {
		Ok(serde_json::to_string_pretty(self)?)
	}
}

impl fmt::Display for Output {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Output::Wallet { address }
			| Output::Forwarder { address }
			| Output::Signer { address } => {
				write!(f, "{}", address)
			},
			Output::Hash { hash, .. } => write!(f, "{}", hash),
		}
	}
}

/// Runs `command`, reading coin prefixes from `config` when a hash is requested.
pub async fn run(command: Command, config: Option<&Path>) -> Result<Output, CliError> {
	match command {
		Command::PredictWallet(args) => {
			let address = predict_wallet_address(
				&args.factory,
				&args.implementation,
				&args.signers,
				&args.salt.unwrap_or_default(),
			);
			tracing::debug!(signers = args.signers.len(), address = %address, "Predicted wallet");
			Ok(Output::Wallet { address })
		},
		Command::PredictForwarder(args) => {
			let fee_address = args.fee_address.filter(|fee| !fee.is_zero());
			let address = predict_forwarder_address(
				&args.factory,
				&args.implementation,
				&args.parent,
				fee_address.as_ref(),
				&args.salt.unwrap_or_default(),
			);
			tracing::debug!(parent = %args.parent, address = %address, "Predicted forwarder");
			Ok(Output::Forwarder { address })
		},
		Command::Hash { operation } => {
			let prefixes = load_prefixes(config).await?;
			let operation = operation.into_operation()?;
			let authorizer = SignatureAuthorizer::new(prefixes);
			let prefix = authorizer.prefixes().for_kind(operation.kind()).to_string();
			let hash = authorizer.operation_hash(&operation);
			tracing::debug!(
				prefix = %prefix,
				sequence_id = operation.sequence_id(),
				"Hashed operation"
			);
			Ok(Output::Hash { prefix, hash })
		},
		Command::Recover(args) => {
			let signature = parse_signature(&args.signature)?;
			let address = recover_signer(&args.hash, &signature)?;
			Ok(Output::Signer { address })
		},
	}
}

impl HashCommand {
	fn into_operation(self) -> Result<Operation, CliError> {
		let operation = match self {
			HashCommand::Native {
				to,
				value,
				data,
				expire_time,
				sequence_id,
			} => NativeOperation {
				to,
				value,
				data: data.unwrap_or_default(),
				expire_time,
				sequence_id,
			}
			.into(),
			HashCommand::Token {
				to,
				value,
				token,
				expire_time,
				sequence_id,
			} => TokenOperation {
				to,
				value,
				token_contract: token,
				expire_time,
				sequence_id,
			}
			.into(),
			HashCommand::Batch {
				recipients,
				values,
				expire_time,
				sequence_id,
			} => {
				if recipients.len() != values.len() {
					return Err(CliError::InvalidArgument(format!(
						"{} recipients but {} values",
						recipients.len(),
						values.len()
					)));
				}
				BatchOperation {
					recipients,
					values,
					expire_time,
					sequence_id,
				}
				.into()
			},
		};
		Ok(operation)
	}
}

async fn load_prefixes(config: Option<&Path>) -> Result<CoinPrefixes, CliError> {
	let Some(path) = config else {
		return Ok(CoinPrefixes::ether());
	};
	let path = path
		.to_str()
		.ok_or_else(|| CliError::InvalidArgument(format!("non UTF-8 path {}", path.display())))?;
	let config = Config::from_file(path).await?;
	Ok(config.wallet.coin_prefixes()?)
}

fn parse_signature(signature: &str) -> Result<Vec<u8>, CliError> {
	hex::decode(without_0x_prefix(signature))
		.map_err(|e| CliError::InvalidArgument(format!("signature: {}", e)))
}
