//! Batch validation and execution.

use alloy_primitives::{Address, U256};
use custody_chain::Chain;
use custody_types::{CustodyError, CustodyEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered list of native transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
	pub recipients: Vec<Address>,
	pub values: Vec<U256>,
}

impl BatchRequest {
	pub fn new(recipients: Vec<Address>, values: Vec<U256>) -> Self {
		Self { recipients, values }
	}

	pub fn len(&self) -> usize {
		self.recipients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.recipients.is_empty()
	}
}

/// Where the value paid out by a batch comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueBudget {
	/// The value attached to the enclosing call; the batch total must match it exactly.
	Attached(U256),
	/// The executing contract's balance; it must cover the batch total.
	Balance,
}

/// Errors that can occur while validating or executing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
	#[error("Must send to at least one recipient")]
	EmptyRecipients,
	#[error("Unequal recipients ({recipients}) and values ({values})")]
	UnequalRecipientsAndValues { recipients: usize, values: usize },
	#[error("Too many recipients: {count} (max {limit})")]
	TooManyRecipients { count: usize, limit: usize },
	#[error("Invalid recipient address at index {0}")]
	InvalidRecipient(usize),
	#[error("Batch total overflows")]
	TotalOverflow,
	#[error("Total sent out ({sent}) must equal total received ({received})")]
	TotalMismatch { sent: U256, received: U256 },
	#[error("Insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: U256, available: U256 },
	#[error("Transfer {index} to {recipient} failed: {reason}")]
	CallFailed {
		index: usize,
		recipient: Address,
		reason: CustodyError,
	},
	/// A host failure outside any recipient call, such as running out of gas
	/// while emitting an event.
	#[error(transparent)]
	Host(#[from] CustodyError),
}

impl From<BatchError> for CustodyError {
	fn from(err: BatchError) -> Self {
		match err {
			BatchError::EmptyRecipients => CustodyError::EmptyRecipients,
			BatchError::UnequalRecipientsAndValues { recipients, values } => {
				CustodyError::UnequalRecipientsAndValues { recipients, values }
			},
			BatchError::TooManyRecipients { count, limit } => {
				CustodyError::TooManyRecipients { count, limit }
			},
			BatchError::InvalidRecipient(index) => CustodyError::InvalidRecipient(index),
			BatchError::TotalOverflow => CustodyError::Revert("batch total overflows".into()),
			BatchError::TotalMismatch { sent, received } => {
				CustodyError::TotalSentMustEqualTotalReceived { sent, received }
			},
			BatchError::InsufficientFunds { required, available } => {
				CustodyError::InsufficientFunds { required, available }
			},
			BatchError::CallFailed {
				recipient, reason, ..
			} => reason.into_call_failure(recipient),
			BatchError::Host(err) => err,
		}
	}
}

/// Executes batches under a recipient limit and an optional per-recipient gas stipend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchExecutor {
	limit: usize,
	gas_stipend: Option<u64>,
}

impl BatchExecutor {
	/// Creates an executor; `gas_stipend` of `None` forwards all remaining gas.
	pub fn new(limit: usize, gas_stipend: Option<u64>) -> Self {
		Self { limit, gas_stipend }
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	pub fn gas_stipend(&self) -> Option<u64> {
		self.gas_stipend
	}

	/// Checks the shape of `request` and returns the total it pays out.
	pub fn validate(&self, request: &BatchRequest) -> Result<U256, BatchError> {
		validate_shape(&request.recipients, &request.values, self.limit)?;
		request
			.values
			.iter()
			.try_fold(U256::ZERO, |total, value| total.checked_add(*value))
			.ok_or(BatchError::TotalOverflow)
	}

	/// Pays every recipient of `request` from the contract at `executor`.
	///
	/// `sender` is the account that requested the batch and is recorded in
	/// the `BatchTransfer` events. Returns the total paid out.
	pub fn execute(
		&self,
		chain: &mut Chain,
		executor: Address,
		sender: Address,
		request: &BatchRequest,
		budget: ValueBudget,
	) -> Result<U256, BatchError> {
		let total = self.validate(request)?;
		match budget {
			ValueBudget::Attached(received) => {
				if total != received {
					return Err(BatchError::TotalMismatch {
						sent: total,
						received,
					});
				}
			},
			ValueBudget::Balance => {
				let available = chain.balance(&executor);
				if available < total {
					return Err(BatchError::InsufficientFunds {
						required: total,
						available,
					});
				}
			},
		}

		for (index, (recipient, value)) in
			request.recipients.iter().zip(request.values.iter()).enumerate()
		{
			chain.emit(
				executor,
				CustodyEvent::BatchTransfer {
					sender,
					recipient: *recipient,
					value: *value,
				},
			)?;
			chain
				.call(executor, *recipient, *value, &[], self.gas_stipend)
				.map_err(|reason| {
					tracing::debug!(
						index = index,
						recipient = %recipient,
						error = %reason,
						"Batch transfer failed"
					);
					BatchError::CallFailed {
						index,
						recipient: *recipient,
						reason,
					}
				})?;
		}

		tracing::info!(
			executor = %executor,
			recipients = request.len(),
			total = %total,
			"Batch executed"
		);
		Ok(total)
	}
}

/// Shape checks shared by native and token batches.
pub(crate) fn validate_shape<T>(
	recipients: &[Address],
	values: &[T],
	limit: usize,
) -> Result<(), BatchError> {
	if recipients.is_empty() {
		return Err(BatchError::EmptyRecipients);
	}
	if recipients.len() != values.len() {
		return Err(BatchError::UnequalRecipientsAndValues {
			recipients: recipients.len(),
			values: values.len(),
		});
	}
	if recipients.len() > limit {
		return Err(BatchError::TooManyRecipients {
			count: recipients.len(),
			limit,
		});
	}
	if let Some(index) = recipients.iter().position(|r| *r == Address::ZERO) {
		return Err(BatchError::InvalidRecipient(index));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use custody_chain::testing::{CountingReceiver, GasGuzzler, RejectingReceiver};
	use custody_chain::{CallContext, Contract, Transaction};
	use alloy_primitives::Bytes;
	use std::sync::Arc;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	/// Pays out its own balance through a fixed executor on every call.
	struct Payer {
		executor: BatchExecutor,
		request: BatchRequest,
	}

	impl Contract for Payer {
		fn name(&self) -> &'static str {
			"Payer"
		}

		fn execute(
			&self,
			chain: &mut Chain,
			ctx: &CallContext,
			_input: &[u8],
		) -> Result<Bytes, CustodyError> {
			let budget = if ctx.value.is_zero() {
				ValueBudget::Balance
			} else {
				ValueBudget::Attached(ctx.value)
			};
			self.executor
				.execute(chain, ctx.address, ctx.caller, &self.request, budget)?;
			Ok(Bytes::new())
		}
	}

	fn deploy_payer(chain: &mut Chain, request: BatchRequest, stipend: Option<u64>) -> Address {
		chain
			.deploy(
				addr(0xee),
				Arc::new(Payer {
					executor: BatchExecutor::new(10, stipend),
					request,
				}),
			)
			.unwrap()
	}

	#[test]
	fn test_shape_validation() {
		let executor = BatchExecutor::new(2, None);
		let empty = BatchRequest::new(vec![], vec![]);
		assert_eq!(executor.validate(&empty), Err(BatchError::EmptyRecipients));

		let unequal = BatchRequest::new(vec![addr(1)], vec![U256::from(1), U256::from(2)]);
		assert_eq!(
			executor.validate(&unequal),
			Err(BatchError::UnequalRecipientsAndValues { recipients: 1, values: 2 })
		);

		let too_many = BatchRequest::new(vec![addr(1); 3], vec![U256::from(1); 3]);
		assert_eq!(
			executor.validate(&too_many),
			Err(BatchError::TooManyRecipients { count: 3, limit: 2 })
		);

		let zero = BatchRequest::new(vec![addr(1), Address::ZERO], vec![U256::from(1); 2]);
		assert_eq!(executor.validate(&zero), Err(BatchError::InvalidRecipient(1)));

		let overflow = BatchRequest::new(vec![addr(1), addr(2)], vec![U256::MAX, U256::from(1)]);
		assert_eq!(executor.validate(&overflow), Err(BatchError::TotalOverflow));

		let ok = BatchRequest::new(vec![addr(1), addr(2)], vec![U256::from(3), U256::from(4)]);
		assert_eq!(executor.validate(&ok), Ok(U256::from(7)));
	}

	#[test]
	fn test_attached_value_must_match_exactly() {
		let mut chain = Chain::with_timestamp(1);
		let request =
			BatchRequest::new(vec![addr(1), addr(2)], vec![U256::from(10), U256::from(20)]);
		let payer = deploy_payer(&mut chain, request, Some(2_300));
		chain.fund(addr(0xaa), U256::from(100));

		for attached in [29u64, 31] {
			let tx = Transaction::call(addr(0xaa), payer, Bytes::new())
				.with_value(U256::from(attached));
			let err = chain.transact(tx).unwrap_err();
			assert_eq!(
				err,
				CustodyError::TotalSentMustEqualTotalReceived {
					sent: U256::from(30),
					received: U256::from(attached),
				}
			);
		}

		let receipt = chain
			.transact(Transaction::call(addr(0xaa), payer, Bytes::new()).with_value(U256::from(30)))
			.unwrap();
		assert_eq!(chain.balance(&addr(1)), U256::from(10));
		assert_eq!(chain.balance(&addr(2)), U256::from(20));
		assert_eq!(chain.balance(&payer), U256::ZERO);
		assert_eq!(receipt.logs.len(), 2);
	}

	#[test]
	fn test_failing_recipient_reverts_whole_batch() {
		let mut chain = Chain::with_timestamp(1);
		let rejecting = chain.deploy(addr(0xdd), Arc::new(RejectingReceiver)).unwrap();
		let request = BatchRequest::new(
			vec![addr(1), rejecting, addr(2)],
			vec![U256::from(1), U256::from(1), U256::from(1)],
		);
		let payer = deploy_payer(&mut chain, request, Some(2_300));
		chain.fund(payer, U256::from(3));

		let err = chain
			.transact(Transaction::call(addr(0xaa), payer, Bytes::new()))
			.unwrap_err();
		assert!(matches!(err, CustodyError::CallFailed { target, .. } if target == rejecting));
		assert_eq!(chain.balance(&addr(1)), U256::ZERO);
		assert_eq!(chain.balance(&payer), U256::from(3));
		assert!(chain.logs().is_empty());
	}

	#[test]
	fn test_stipend_stops_gas_guzzler_and_storage_writers() {
		let mut chain = Chain::with_timestamp(1);
		let guzzler = chain.deploy(addr(0xdd), Arc::new(GasGuzzler)).unwrap();
		let counter = chain.deploy(addr(0xdd), Arc::new(CountingReceiver)).unwrap();

		let payer = deploy_payer(
			&mut chain,
			BatchRequest::new(vec![guzzler], vec![U256::from(1)]),
			Some(2_300),
		);
		chain.fund(payer, U256::from(1));
		let err = chain
			.transact(Transaction::call(addr(0xaa), payer, Bytes::new()))
			.unwrap_err();
		assert_eq!(err.root_cause(), &CustodyError::OutOfGas);

		let payer = deploy_payer(
			&mut chain,
			BatchRequest::new(vec![counter], vec![U256::from(1)]),
			Some(2_300),
		);
		chain.fund(payer, U256::from(1));
		assert!(chain
			.transact(Transaction::call(addr(0xaa), payer, Bytes::new()))
			.is_err());

		// With all gas forwarded the storage-writing recipient succeeds.
		let payer = deploy_payer(
			&mut chain,
			BatchRequest::new(vec![counter], vec![U256::from(1)]),
			None,
		);
		chain.fund(payer, U256::from(1));
		chain
			.transact(Transaction::call(addr(0xaa), payer, Bytes::new()))
			.unwrap();
		assert_eq!(CountingReceiver::received(&chain, &counter), U256::from(1));
	}

	#[test]
	fn test_balance_budget_requires_cover() {
		let mut chain = Chain::with_timestamp(1);
		let payer = deploy_payer(
			&mut chain,
			BatchRequest::new(vec![addr(1)], vec![U256::from(5)]),
			None,
		);
		chain.fund(payer, U256::from(4));
		let err = chain
			.transact(Transaction::call(addr(0xaa), payer, Bytes::new()))
			.unwrap_err();
		assert_eq!(
			err,
			CustodyError::InsufficientFunds {
				required: U256::from(5),
				available: U256::from(4),
			}
		);
	}
}
