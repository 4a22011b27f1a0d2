//! Command-line entry point for the custody protocol.
//!
//! Provides the off-chain half of the protocol: predicting wallet and
//! forwarder addresses before deployment, computing the hashes co-signers
//! sign, and recovering signers from signatures.

use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::Command;

/// Command-line arguments for the custody tool.
#[derive(Parser, Debug)]
#[command(name = "custody", author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file, used for coin prefixes
	#[arg(short, long, env = "CUSTODY_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "warn")]
	log_level: String,

	/// Print the result as JSON
	#[arg(long)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let output = match commands::run(args.command, args.config.as_deref()).await {
		Ok(output) => output,
		Err(e) => {
			tracing::error!(error = %e, "Command failed");
			return Err(e.into());
		},
	};

	if args.json {
		println!("{}", output.to_json()?);
	} else {
		println!("{}", output);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_cli_definition() {
		Args::command().debug_assert();
	}

	#[test]
	fn test_parses_repeated_signers() {
		let args = Args::try_parse_from([
			"custody",
			"predict-wallet",
			"--factory",
			"0x0101010101010101010101010101010101010101",
			"--implementation",
			"0x0202020202020202020202020202020202020202",
			"--signer",
			"0x0303030303030303030303030303030303030303",
			"--signer",
			"0x0404040404040404040404040404040404040404",
		])
		.unwrap();
		match args.command {
			Command::PredictWallet(wallet) => assert_eq!(wallet.signers.len(), 2),
			other => panic!("unexpected command {:?}", other),
		}
	}

	#[test]
	fn test_parses_batch_hash() {
		let args = Args::try_parse_from([
			"custody",
			"--json",
			"hash",
			"batch",
			"--recipient",
			"0x0303030303030303030303030303030303030303",
			"--value",
			"10",
			"--expire-time",
			"1700000000",
			"--sequence-id",
			"3",
		])
		.unwrap();
		assert!(args.json);
		assert!(matches!(args.command, Command::Hash { .. }));
	}
}
