//! Error taxonomy of the custody protocol.
//!
//! A single error enum travels across contract boundaries: it plays the role
//! of a revert reason. Every variant aborts the whole call that produced it,
//! discarding all state changes made by that call.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Errors that can abort a protocol call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
	/// The signature could not be parsed or no key could be recovered from it.
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	/// The recovered co-signer is not a wallet signer.
	#[error("Invalid signer: {0}")]
	InvalidSigner(Address),
	/// The co-signer and the transaction sender are the same party.
	#[error("Signers cannot be equal")]
	SignersCannotBeEqual,
	/// A signer-only method was called by someone else.
	#[error("Non-signer {0} in signer-only method")]
	NonSignerCaller(Address),
	/// The caller is not allowed to use an administrative method.
	#[error("Caller {0} is not authorized")]
	Unauthorized(Address),
	/// The sequence ID has already been consumed.
	#[error("Sequence ID {0} already used")]
	SequenceIdAlreadyUsed(u64),
	/// The sequence ID is at or below the bottom of the window.
	#[error("Sequence ID {sequence_id} below window floor {floor}")]
	SequenceIdTooLow { sequence_id: u64, floor: u64 },
	/// The sequence ID jumps too far past the highest one accepted.
	#[error("Sequence ID {sequence_id} above the highest acceptable ID {limit}")]
	SequenceIdTooHigh { sequence_id: u64, limit: u64 },
	/// The operation deadline has passed.
	#[error("Transaction expired at {expire_time} (now {now})")]
	Expired { expire_time: u64, now: u64 },
	/// Safe mode only allows payouts to signers.
	#[error("External transfer to {0} in safe mode")]
	SafeModeRestriction(Address),
	/// A batch without recipients.
	#[error("Must send to at least one recipient")]
	EmptyRecipients,
	/// A batch whose recipient and value lists differ in length.
	#[error("Unequal recipients ({recipients}) and values ({values})")]
	UnequalRecipientsAndValues { recipients: usize, values: usize },
	/// A batch above the configured limit.
	#[error("Too many recipients: {count} (max {limit})")]
	TooManyRecipients { count: usize, limit: usize },
	/// A batch entry addressed to the zero address.
	#[error("Invalid recipient address at index {0}")]
	InvalidRecipient(usize),
	/// A signer list that is too short, contains duplicates or the zero address.
	#[error("Invalid signer set: {0}")]
	InvalidSignerSet(String),
	/// Calldata that does not decode against the contract ABI.
	#[error("Invalid calldata: {0}")]
	InvalidCalldata(String),
	/// The paying account cannot cover the transfer.
	#[error("Insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: U256, available: U256 },
	/// The value attached to a batch does not match its total.
	#[error("Total sent out ({sent}) must equal total received ({received})")]
	TotalSentMustEqualTotalReceived { sent: U256, received: U256 },
	/// A sub-call failed; the inner reason is preserved.
	#[error("Call to {target} failed: {reason}")]
	CallFailed {
		target: Address,
		reason: Box<CustodyError>,
	},
	/// The current call frame exhausted its gas.
	#[error("Out of gas")]
	OutOfGas,
	/// A guarded method was entered while already executing.
	#[error("Reentrancy attempt detected")]
	Reentrancy,
	/// The contract does not accept plain transfers or unknown selectors.
	#[error("Invalid fallback")]
	InvalidFallback,
	/// Too many nested calls.
	#[error("Call depth exceeded")]
	CallDepthExceeded,
	/// A generic revert with a reason string.
	#[error("Reverted: {0}")]
	Revert(String),
	/// A one-shot initializer was called again.
	#[error("Contract already initialized")]
	AlreadyInitialized,
	/// A mutating method was called before initialization.
	#[error("Contract not initialized")]
	NotInitialized,
	/// Code already exists at the derived address.
	#[error("Contract already deployed at {0}")]
	AlreadyDeployed(Address),
	/// A configuration value below its floor or otherwise invalid.
	#[error("Invalid configuration: {0}")]
	InvalidConfiguration(String),
}

/// Taxonomy classes of [`CustodyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
	Authorization,
	Replay,
	Temporal,
	SafeMode,
	Shape,
	Funds,
	Execution,
	Lifecycle,
	Configuration,
}

impl CustodyError {
	/// Returns the taxonomy class of this error.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::InvalidSignature(_)
			| Self::InvalidSigner(_)
			| Self::SignersCannotBeEqual
			| Self::NonSignerCaller(_)
			| Self::Unauthorized(_) => ErrorCategory::Authorization,
			Self::SequenceIdAlreadyUsed(_)
			| Self::SequenceIdTooLow { .. }
			| Self::SequenceIdTooHigh { .. } => ErrorCategory::Replay,
			Self::Expired { .. } => ErrorCategory::Temporal,
			Self::SafeModeRestriction(_) => ErrorCategory::SafeMode,
			Self::EmptyRecipients
			| Self::UnequalRecipientsAndValues { .. }
			| Self::TooManyRecipients { .. }
			| Self::InvalidRecipient(_)
			| Self::InvalidSignerSet(_)
			| Self::InvalidCalldata(_) => ErrorCategory::Shape,
			Self::InsufficientFunds { .. } | Self::TotalSentMustEqualTotalReceived { .. } => {
				ErrorCategory::Funds
			},
			Self::CallFailed { .. }
			| Self::OutOfGas
			| Self::Reentrancy
			| Self::InvalidFallback
			| Self::CallDepthExceeded
			| Self::Revert(_) => ErrorCategory::Execution,
			Self::AlreadyInitialized | Self::NotInitialized | Self::AlreadyDeployed(_) => {
				ErrorCategory::Lifecycle
			},
			Self::InvalidConfiguration(_) => ErrorCategory::Configuration,
		}
	}

	/// Wraps this error as the reason of a failed sub-call to `target`.
	pub fn into_call_failure(self, target: Address) -> Self {
		Self::CallFailed {
			target,
			reason: Box::new(self),
		}
	}

	/// Follows nested call failures down to the error that started them.
	pub fn root_cause(&self) -> &CustodyError {
		match self {
			Self::CallFailed { reason, .. } => reason.root_cause(),
			other => other,
		}
	}
}

impl From<alloy_sol_types::Error> for CustodyError {
	fn from(err: alloy_sol_types::Error) -> Self {
		CustodyError::InvalidCalldata(err.to_string())
	}
}
