//! Signed operation payloads.
//!
//! An operation only ever exists as a hashed, signed payload: the off-chain
//! co-signer signs its hash, and the wallet recomputes that hash from the
//! calldata it receives. Nothing but the consumed sequence ID survives
//! execution.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain-separation prefixes of one wallet deployment.
///
/// Each chain/asset family signs under its own strings, so a signature valid
/// for one deployment cannot be replayed on another. Within one set, the
/// native, token and batch strings separate the three operation kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoinPrefixes {
	/// Prefix of single native sends.
	pub native: String,
	/// Prefix of ERC20 token sends.
	pub token: String,
	/// Prefix of native batch sends.
	pub batch: String,
}

impl CoinPrefixes {
	/// Creates a prefix set from its three strings.
	pub fn new(
		native: impl Into<String>,
		token: impl Into<String>,
		batch: impl Into<String>,
	) -> Self {
		Self {
			native: native.into(),
			token: token.into(),
			batch: batch.into(),
		}
	}

	/// Ethereum mainnet prefixes.
	pub fn ether() -> Self {
		Self::new("ETHER", "ERC20", "ETHER-Batch")
	}

	/// Polygon prefixes.
	pub fn polygon() -> Self {
		Self::new("POLYGON", "POLYGON-ERC20", "POLYGON-Batch")
	}

	/// Arbitrum prefixes.
	pub fn arbitrum() -> Self {
		Self::new("ARBETH", "ARBETH-ERC20", "ARBETH-Batch")
	}

	/// Optimism prefixes.
	pub fn optimism() -> Self {
		Self::new("OPETH", "OPETH-ERC20", "OPETH-Batch")
	}

	/// Returns the built-in preset with the given name.
	pub fn preset(name: &str) -> Option<Self> {
		match name.to_ascii_lowercase().as_str() {
			"ether" | "eth" => Some(Self::ether()),
			"polygon" => Some(Self::polygon()),
			"arbitrum" | "arbeth" => Some(Self::arbitrum()),
			"optimism" | "opeth" => Some(Self::optimism()),
			_ => None,
		}
	}

	/// Returns the prefix used for the given operation kind.
	pub fn for_kind(&self, kind: OperationKind) -> &str {
		match kind {
			OperationKind::Native => &self.native,
			OperationKind::Token => &self.token,
			OperationKind::Batch => &self.batch,
		}
	}

	/// Checks that all prefixes are set and pairwise distinct.
	pub fn validate(&self) -> Result<(), String> {
		if self.native.is_empty() || self.token.is_empty() || self.batch.is_empty() {
			return Err("coin prefixes cannot be empty".into());
		}
		if self.native == self.token || self.native == self.batch || self.token == self.batch {
			return Err(format!(
				"coin prefixes must be distinct (native '{}', token '{}', batch '{}')",
				self.native, self.token, self.batch
			));
		}
		Ok(())
	}
}

impl Default for CoinPrefixes {
	fn default() -> Self {
		Self::ether()
	}
}

/// The three kinds of signed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
	Native,
	Token,
	Batch,
}

impl fmt::Display for OperationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Native => write!(f, "native"),
			Self::Token => write!(f, "token"),
			Self::Batch => write!(f, "batch"),
		}
	}
}

impl FromStr for OperationKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"native" => Ok(Self::Native),
			"token" => Ok(Self::Token),
			"batch" => Ok(Self::Batch),
			other => Err(format!("unknown operation kind '{}'", other)),
		}
	}
}

/// A native currency send with optional call data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeOperation {
	pub to: Address,
	pub value: U256,
	pub data: Bytes,
	pub expire_time: u64,
	pub sequence_id: u64,
}

/// An ERC20 token send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOperation {
	pub to: Address,
	pub value: U256,
	pub token_contract: Address,
	pub expire_time: u64,
	pub sequence_id: u64,
}

/// A native currency batch send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperation {
	pub recipients: Vec<Address>,
	pub values: Vec<U256>,
	pub expire_time: u64,
	pub sequence_id: u64,
}

/// Any operation a wallet co-signer can authorize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
	Native(NativeOperation),
	Token(TokenOperation),
	Batch(BatchOperation),
}

impl Operation {
	/// Returns the kind of this operation.
	pub fn kind(&self) -> OperationKind {
		match self {
			Self::Native(_) => OperationKind::Native,
			Self::Token(_) => OperationKind::Token,
			Self::Batch(_) => OperationKind::Batch,
		}
	}

	/// Returns the signature-bound deadline.
	pub fn expire_time(&self) -> u64 {
		match self {
			Self::Native(op) => op.expire_time,
			Self::Token(op) => op.expire_time,
			Self::Batch(op) => op.expire_time,
		}
	}

	/// Returns the replay-protection sequence ID.
	pub fn sequence_id(&self) -> u64 {
		match self {
			Self::Native(op) => op.sequence_id,
			Self::Token(op) => op.sequence_id,
			Self::Batch(op) => op.sequence_id,
		}
	}

	/// Returns every address that receives value from this operation.
	pub fn destinations(&self) -> Vec<Address> {
		match self {
			Self::Native(op) => vec![op.to],
			Self::Token(op) => vec![op.to],
			Self::Batch(op) => op.recipients.clone(),
		}
	}
}

impl From<NativeOperation> for Operation {
	fn from(op: NativeOperation) -> Self {
		Self::Native(op)
	}
}

impl From<TokenOperation> for Operation {
	fn from(op: TokenOperation) -> Self {
		Self::Token(op)
	}
}

impl From<BatchOperation> for Operation {
	fn from(op: BatchOperation) -> Self {
		Self::Batch(op)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_presets_are_valid_and_distinct() {
		let presets = [
			CoinPrefixes::ether(),
			CoinPrefixes::polygon(),
			CoinPrefixes::arbitrum(),
			CoinPrefixes::optimism(),
		];
		for preset in &presets {
			assert!(preset.validate().is_ok());
		}
		assert_ne!(presets[0].native, presets[1].native);
		assert_eq!(CoinPrefixes::preset("ETHER"), Some(CoinPrefixes::ether()));
		assert_eq!(CoinPrefixes::preset("dogecoin"), None);
	}

	#[test]
	fn test_colliding_prefixes_rejected() {
		let prefixes = CoinPrefixes::new("ETHER", "ETHER", "ETHER-Batch");
		assert!(prefixes.validate().is_err());
		let prefixes = CoinPrefixes::new("", "ERC20", "ETHER-Batch");
		assert!(prefixes.validate().is_err());
	}

	#[test]
	fn test_operation_accessors() {
		let op: Operation = BatchOperation {
			recipients: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
			values: vec![U256::from(1), U256::from(2)],
			expire_time: 100,
			sequence_id: 7,
		}
		.into();
		assert_eq!(op.kind(), OperationKind::Batch);
		assert_eq!(op.sequence_id(), 7);
		assert_eq!(op.expire_time(), 100);
		assert_eq!(op.destinations().len(), 2);
		assert_eq!(
			"token".parse::<OperationKind>().unwrap(),
			OperationKind::Token
		);
	}
}
