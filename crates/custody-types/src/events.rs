//! Event types emitted by protocol contracts.
//!
//! Events are appended to the host's log by the contract that emits them and
//! are discarded together with every other state change when the emitting
//! call fails. They are the only channel through which external observers
//! learn about deposits, executed operations and configuration changes.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all protocol events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyEvent {
	/// A wallet received native currency.
	Deposited {
		from: Address,
		value: U256,
		data: Bytes,
	},
	/// A wallet executed a co-signed single or token send.
	Transacted {
		msg_sender: Address,
		other_signer: Address,
		operation: B256,
		to_address: Address,
		value: U256,
		data: Bytes,
	},
	/// One transfer inside a batch.
	BatchTransfer {
		sender: Address,
		recipient: Address,
		value: U256,
	},
	/// A wallet executed a co-signed batch.
	BatchTransacted {
		msg_sender: Address,
		other_signer: Address,
		operation: B256,
	},
	/// A wallet entered safe mode.
	SafeModeActivated { msg_sender: Address },
	/// A forwarder flushed native currency to its parent.
	ForwarderDeposited {
		from: Address,
		value: U256,
		data: Bytes,
	},
	/// A factory created a wallet clone.
	WalletCreated {
		wallet: Address,
		signers: Vec<Address>,
	},
	/// A factory created a forwarder clone.
	ForwarderCreated {
		forwarder: Address,
		parent: Address,
		fee_address: Option<Address>,
		auto_flush_721: bool,
		auto_flush_1155: bool,
	},
	/// Batcher ownership moved.
	OwnerChange { prev_owner: Address, new_owner: Address },
	/// Batcher per-recipient gas stipend changed.
	TransferGasLimitChange { prev: u64, new: u64 },
	/// Batcher native batch limit changed.
	BatchTransferLimitChange { prev: usize, new: usize },
	/// Batcher token batch limit changed.
	TokenBatchTransferLimitChange { prev: usize, new: usize },
}

impl CustodyEvent {
	/// Returns the event name as it would appear in a contract ABI.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Deposited { .. } => "Deposited",
			Self::Transacted { .. } => "Transacted",
			Self::BatchTransfer { .. } => "BatchTransfer",
			Self::BatchTransacted { .. } => "BatchTransacted",
			Self::SafeModeActivated { .. } => "SafeModeActivated",
			Self::ForwarderDeposited { .. } => "ForwarderDeposited",
			Self::WalletCreated { .. } => "WalletCreated",
			Self::ForwarderCreated { .. } => "ForwarderCreated",
			Self::OwnerChange { .. } => "OwnerChange",
			Self::TransferGasLimitChange { .. } => "TransferGasLimitChange",
			Self::BatchTransferLimitChange { .. } => "BatchTransferLimitChange",
			Self::TokenBatchTransferLimitChange { .. } => "TokenBatchTransferLimitChange",
		}
	}
}

/// An event together with the contract that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
	/// Address of the emitting contract (the clone, not its implementation).
	pub address: Address,
	/// The emitted event.
	pub event: CustodyEvent,
}
