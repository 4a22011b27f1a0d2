//! Execution host for the custody protocol.
//!
//! This module provides a deterministic in-process chain the protocol's
//! contracts execute on. It models exactly what the contracts rely on:
//! native balances, installed code and minimal-proxy clones, CREATE/CREATE2
//! address derivation, per-frame gas metering with caller-chosen stipends,
//! an event log, a block timestamp, and atomic rollback of every failed call.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use custody_types::{create2_address, current_timestamp, CustodyError, CustodyEvent, Log};
use custody_types::utils::DEFAULT_BLOCK_GAS_LIMIT;
use std::sync::Arc;

pub mod contract;
pub mod gas;
pub mod guard;
pub mod state;
pub mod tokens;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use contract::{decode_call, CallContext, Contract, Receipt, Transaction};
pub use guard::{non_reentrant, Guarded, ReentrancyGuard};
pub use state::{Account, Code, StateObject};

use state::WorldState;

/// Maximum nesting of message calls.
pub const MAX_CALL_DEPTH: usize = 1024;

/// The simulated chain.
///
/// Every call frame snapshots the world state on entry and restores it on
/// failure, so a failed call leaves no trace beyond the gas it consumed.
#[derive(Debug)]
pub struct Chain {
	state: WorldState,
	logs: Vec<Log>,
	timestamp: u64,
	block_gas_limit: u64,
	gas_remaining: u64,
	depth: usize,
}

/// What a call frame restores when it fails.
///
/// Logs are only ever appended, so their length at frame entry is enough to
/// undo them.
struct Checkpoint {
	state: WorldState,
	log_count: usize,
}

impl Default for Chain {
	fn default() -> Self {
		Self::new()
	}
}

impl Chain {
	/// Creates an empty chain whose clock starts at the current system time.
	pub fn new() -> Self {
		Self::with_timestamp(current_timestamp())
	}

	/// Creates an empty chain whose clock starts at `timestamp`.
	pub fn with_timestamp(timestamp: u64) -> Self {
		Self {
			state: WorldState::default(),
			logs: Vec::new(),
			timestamp,
			block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
			gas_remaining: 0,
			depth: 0,
		}
	}

	/// Sets the gas ceiling of every transaction.
	pub fn with_block_gas_limit(mut self, block_gas_limit: u64) -> Self {
		self.block_gas_limit = block_gas_limit;
		self
	}

	pub fn block_gas_limit(&self) -> u64 {
		self.block_gas_limit
	}

	/// Current block timestamp in seconds.
	pub fn timestamp(&self) -> u64 {
		self.timestamp
	}

	pub fn set_timestamp(&mut self, timestamp: u64) {
		self.timestamp = timestamp;
	}

	/// Moves the clock forward.
	pub fn advance_time(&mut self, seconds: u64) {
		self.timestamp = self.timestamp.saturating_add(seconds);
	}

	/// Credits `amount` of native currency to `address` out of thin air.
	pub fn fund(&mut self, address: Address, amount: U256) {
		let account = self.state.account_mut(address);
		account.balance = account.balance.saturating_add(amount);
	}

	pub fn balance(&self, address: &Address) -> U256 {
		self.state
			.account(address)
			.map(|a| a.balance)
			.unwrap_or_default()
	}

	pub fn nonce(&self, address: &Address) -> u64 {
		self.state
			.account(address)
			.map(|a| a.nonce)
			.unwrap_or_default()
	}

	pub fn code(&self, address: &Address) -> Option<&Code> {
		self.state.account(address).and_then(|a| a.code.as_ref())
	}

	pub fn has_code(&self, address: &Address) -> bool {
		self.code(address).is_some()
	}

	/// Every event emitted by a successful call so far.
	pub fn logs(&self) -> &[Log] {
		&self.logs
	}

	/// Events emitted by the contract at `address`.
	pub fn events_from<'a>(
		&'a self,
		address: &'a Address,
	) -> impl Iterator<Item = &'a CustodyEvent> + 'a {
		self.logs
			.iter()
			.filter(move |log| &log.address == address)
			.map(|log| &log.event)
	}

	/// Deploys `contract` from `deployer` with CREATE semantics and runs its constructor.
	pub fn deploy(
		&mut self,
		deployer: Address,
		contract: Arc<dyn Contract>,
	) -> Result<Address, CustodyError> {
		let nonce = self.nonce(&deployer);
		let address = deployer.create(nonce);
		self.state.account_mut(deployer).nonce += 1;

		let checkpoint = self.checkpoint();
		self.gas_remaining = self
			.block_gas_limit
			.saturating_sub(gas::TRANSACTION + gas::CREATE);
		self.depth = 0;

		self.state.account_mut(address).code = Some(Code::Contract(contract.clone()));
		let ctx = CallContext {
			caller: deployer,
			address,
			value: U256::ZERO,
		};
		match contract.construct(self, &ctx) {
			Ok(()) => {
				tracing::debug!(contract = contract.name(), address = %address, "Deployed");
				Ok(address)
			},
			Err(e) => {
				self.revert_to(checkpoint);
				Err(e)
			},
		}
	}

	/// Installs `code` at its CREATE2 address, on behalf of the executing contract `deployer`.
	///
	/// Fails with `AlreadyDeployed` when the derived address already holds code.
	/// Any balance the address received before deployment is kept.
	pub fn create2(
		&mut self,
		deployer: Address,
		salt: B256,
		code: Code,
	) -> Result<Address, CustodyError> {
		self.charge_gas(gas::CREATE)?;
		let init_code_hash = keccak256(code.init_code());
		let address = create2_address(&deployer, &salt, &init_code_hash);
		if self.has_code(&address) {
			return Err(CustodyError::AlreadyDeployed(address));
		}
		self.state.account_mut(deployer).nonce += 1;
		self.state.account_mut(address).code = Some(code.clone());
		if let Code::Contract(contract) = code {
			let ctx = CallContext {
				caller: deployer,
				address,
				value: U256::ZERO,
			};
			contract.construct(self, &ctx)?;
		}
		Ok(address)
	}

	/// Executes a top-level transaction atomically.
	pub fn transact(&mut self, tx: Transaction) -> Result<Receipt, CustodyError> {
		let gas_limit = tx
			.gas_limit
			.unwrap_or(self.block_gas_limit)
			.min(self.block_gas_limit);
		if gas_limit < gas::TRANSACTION {
			return Err(CustodyError::OutOfGas);
		}
		self.state.account_mut(tx.from).nonce += 1;

		let checkpoint = self.checkpoint();
		let logs_before = self.logs.len();
		self.gas_remaining = gas_limit - gas::TRANSACTION;
		self.depth = 0;

		let result = self.execute_frame(tx.from, tx.to, tx.value, &tx.input);
		let gas_used = gas_limit - self.gas_remaining;
		match result {
			Ok(output) => Ok(Receipt {
				gas_used,
				output,
				logs: self.logs[logs_before..].to_vec(),
			}),
			Err(e) => {
				tracing::debug!(from = %tx.from, to = %tx.to, error = %e, "Transaction reverted");
				self.revert_to(checkpoint);
				Err(e)
			},
		}
	}

	/// Executes a read-only call and discards every state change it makes.
	pub fn view(&mut self, to: Address, input: &[u8]) -> Result<Bytes, CustodyError> {
		let checkpoint = self.checkpoint();
		let saved_gas = self.gas_remaining;
		let saved_depth = self.depth;
		self.gas_remaining = self.block_gas_limit;
		self.depth = 0;

		let result = self.execute_frame(Address::ZERO, to, U256::ZERO, input);

		self.revert_to(checkpoint);
		self.gas_remaining = saved_gas;
		self.depth = saved_depth;
		result
	}

	/// Typed read-only call.
	pub fn view_call<C: SolCall>(
		&mut self,
		to: Address,
		call: &C,
	) -> Result<C::Return, CustodyError> {
		let output = self.view(to, &call.abi_encode())?;
		C::abi_decode_returns(&output, true).map_err(CustodyError::from)
	}

	/// Performs a message call from the executing contract `caller`.
	///
	/// `gas` bounds the gas the callee may consume; `None` forwards everything
	/// the caller has left. A failing callee has its changes rolled back and
	/// its error returned; the caller decides whether that aborts it too.
	pub fn call(
		&mut self,
		caller: Address,
		to: Address,
		value: U256,
		input: &[u8],
		gas: Option<u64>,
	) -> Result<Bytes, CustodyError> {
		self.charge_gas(gas::CALL)?;
		if !value.is_zero() {
			self.charge_gas(gas::CALL_VALUE)?;
		}
		if self.depth >= MAX_CALL_DEPTH {
			return Err(CustodyError::CallDepthExceeded);
		}

		let parent_remaining = self.gas_remaining;
		let limit = gas.map_or(parent_remaining, |g| g.min(parent_remaining));
		let checkpoint = self.checkpoint();
		self.gas_remaining = limit;
		self.depth += 1;

		let result = self.execute_frame(caller, to, value, input);

		self.depth -= 1;
		let used = limit - self.gas_remaining;
		self.gas_remaining = parent_remaining - used;
		if result.is_err() {
			self.revert_to(checkpoint);
		}
		result
	}

	/// Typed message call: encodes `call`, performs it and decodes its return values.
	pub fn call_contract<C: SolCall>(
		&mut self,
		caller: Address,
		to: Address,
		value: U256,
		call: &C,
		gas: Option<u64>,
	) -> Result<C::Return, CustodyError> {
		let output = self.call(caller, to, value, &call.abi_encode(), gas)?;
		C::abi_decode_returns(&output, true).map_err(CustodyError::from)
	}

	/// Consumes gas from the current frame.
	pub fn charge_gas(&mut self, amount: u64) -> Result<(), CustodyError> {
		if amount > self.gas_remaining {
			self.gas_remaining = 0;
			return Err(CustodyError::OutOfGas);
		}
		self.gas_remaining -= amount;
		Ok(())
	}

	pub fn gas_remaining(&self) -> u64 {
		self.gas_remaining
	}

	/// Appends an event emitted by the contract at `address`.
	pub fn emit(&mut self, address: Address, event: CustodyEvent) -> Result<(), CustodyError> {
		self.charge_gas(gas::LOG)?;
		self.logs.push(Log { address, event });
		Ok(())
	}

	/// Reads the storage of the contract at `address`.
	pub fn storage<T: StateObject>(&self, address: &Address) -> Option<&T> {
		self.state.storage(address)
	}

	/// Mutates the storage of the contract at `address`, paying for one storage write.
	pub fn store<T, R, F>(&mut self, address: Address, update: F) -> Result<R, CustodyError>
	where
		T: StateObject + Default,
		F: FnOnce(&mut T) -> R,
	{
		self.charge_gas(gas::STORAGE_WRITE)?;
		let state = self
			.state
			.storage_mut::<T>(address)
			.ok_or_else(|| {
				CustodyError::Revert(format!("storage layout mismatch at {}", address))
			})?;
		Ok(update(state))
	}

	/// Like [`Chain::store`] for updates that can themselves fail.
	pub fn try_store<T, R, F>(&mut self, address: Address, update: F) -> Result<R, CustodyError>
	where
		T: StateObject + Default,
		F: FnOnce(&mut T) -> Result<R, CustodyError>,
	{
		self.store(address, update)?
	}

	/// Overwrites the storage of `address` outside of any transaction.
	///
	/// Intended for fixtures that need to be configured after deployment.
	pub fn set_storage<T: StateObject>(&mut self, address: Address, state: T) {
		self.state.storage.insert(address, Box::new(state));
	}

	fn checkpoint(&self) -> Checkpoint {
		Checkpoint {
			state: self.state.clone(),
			log_count: self.logs.len(),
		}
	}

	fn revert_to(&mut self, checkpoint: Checkpoint) {
		self.state = checkpoint.state;
		self.logs.truncate(checkpoint.log_count);
	}

	fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), CustodyError> {
		let available = self.balance(&from);
		if available < value {
			return Err(CustodyError::InsufficientFunds {
				required: value,
				available,
			});
		}
		self.state.account_mut(from).balance = available - value;
		let recipient = self.state.account_mut(to);
		recipient.balance = recipient.balance.saturating_add(value);
		Ok(())
	}

	fn execute_frame(
		&mut self,
		caller: Address,
		to: Address,
		value: U256,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		if !value.is_zero() {
			self.transfer(caller, to, value)?;
		}
		let contract = match self.code(&to).cloned() {
			None => return Ok(Bytes::new()),
			Some(Code::Contract(contract)) => contract,
			Some(Code::Proxy { implementation }) => match self.code(&implementation) {
				Some(Code::Contract(contract)) => contract.clone(),
				_ => {
					return Err(CustodyError::Revert(format!(
						"proxy {} delegates to {} which holds no contract code",
						to, implementation
					)))
				},
			},
		};
		let ctx = CallContext {
			caller,
			address: to,
			value,
		};
		contract.execute(self, &ctx, input)
	}
}
