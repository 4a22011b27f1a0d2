//! World state of the host.
//!
//! Accounts and contract storage are cloned at the start of every call frame
//! and restored when the frame fails, which is what gives every protocol call
//! its all-or-nothing semantics. The event log is append-only and lives
//! outside the snapshot; a failed frame truncates it back to its entry length.

use crate::contract::Contract;
use alloy_primitives::{Address, U256};
use custody_types::minimal_proxy_creation_code;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Per-contract storage that can be snapshotted with the rest of the world state.
///
/// Implemented automatically for every `Clone + Debug` type, so contracts
/// simply define a plain struct for their storage layout.
pub trait StateObject: Any + fmt::Debug + Send + Sync {
	fn clone_box(&self) -> Box<dyn StateObject>;
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> StateObject for T
where
	T: Any + Clone + fmt::Debug + Send + Sync,
{
	fn clone_box(&self) -> Box<dyn StateObject> {
		Box::new(self.clone())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

impl Clone for Box<dyn StateObject> {
	fn clone(&self) -> Self {
		(**self).clone_box()
	}
}

/// Code installed at an address.
#[derive(Clone)]
pub enum Code {
	/// A contract whose logic runs directly.
	Contract(Arc<dyn Contract>),
	/// An EIP-1167 clone delegating every call to `implementation`,
	/// executing against the clone's own storage and balance.
	Proxy { implementation: Address },
}

impl Code {
	/// Returns the creation code whose hash identifies this code for CREATE2.
	pub fn init_code(&self) -> Vec<u8> {
		match self {
			Code::Contract(contract) => contract.init_code(),
			Code::Proxy { implementation } => minimal_proxy_creation_code(implementation),
		}
	}
}

impl fmt::Debug for Code {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Code::Contract(contract) => write!(f, "Contract({})", contract.name()),
			Code::Proxy { implementation } => write!(f, "Proxy({})", implementation),
		}
	}
}

/// A single account of the world state.
#[derive(Debug, Clone, Default)]
pub struct Account {
	pub balance: U256,
	pub nonce: u64,
	pub code: Option<Code>,
}

/// Everything a failed call frame must roll back.
#[derive(Debug, Clone, Default)]
pub(crate) struct WorldState {
	pub(crate) accounts: HashMap<Address, Account>,
	pub(crate) storage: HashMap<Address, Box<dyn StateObject>>,
}

impl WorldState {
	pub(crate) fn account(&self, address: &Address) -> Option<&Account> {
		self.accounts.get(address)
	}

	pub(crate) fn account_mut(&mut self, address: Address) -> &mut Account {
		self.accounts.entry(address).or_default()
	}

	pub(crate) fn storage<T: StateObject>(&self, address: &Address) -> Option<&T> {
		self.storage
			.get(address)
			.and_then(|obj| (**obj).as_any().downcast_ref::<T>())
	}

	/// Returns the storage of `address`, creating it on first use.
	///
	/// `None` means the address already holds storage of another type.
	pub(crate) fn storage_mut<T: StateObject + Default>(
		&mut self,
		address: Address,
	) -> Option<&mut T> {
		(**self
			.storage
			.entry(address)
			.or_insert_with(|| Box::new(T::default()) as Box<dyn StateObject>))
		.as_any_mut()
		.downcast_mut::<T>()
	}
}
