//! Reentrancy guard flag.
//!
//! The host runs one logical thread, so there is nothing to lock; a flag in
//! contract storage marks a guarded section as in progress and any nested
//! entry is rejected. A failed section never needs to clear the flag: the
//! frame rollback restores it.

use crate::{Chain, StateObject};
use alloy_primitives::Address;
use custody_types::CustodyError;

/// Guard flag stored inside a contract's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReentrancyGuard {
	entered: bool,
}

impl ReentrancyGuard {
	pub fn enter(&mut self) -> Result<(), CustodyError> {
		if self.entered {
			return Err(CustodyError::Reentrancy);
		}
		self.entered = true;
		Ok(())
	}

	pub fn exit(&mut self) {
		self.entered = false;
	}

	pub fn is_entered(&self) -> bool {
		self.entered
	}
}

/// Contract state that carries a [`ReentrancyGuard`].
pub trait Guarded {
	fn reentrancy_guard(&mut self) -> &mut ReentrancyGuard;
}

/// Runs `body` with the guard of the state of type `T` at `address` held.
pub fn non_reentrant<T, R, F>(
	chain: &mut Chain,
	address: Address,
	body: F,
) -> Result<R, CustodyError>
where
	T: StateObject + Default + Guarded,
	F: FnOnce(&mut Chain) -> Result<R, CustodyError>,
{
	chain.try_store(address, |state: &mut T| state.reentrancy_guard().enter())?;
	let result = body(chain)?;
	chain.store(address, |state: &mut T| state.reentrancy_guard().exit())?;
	Ok(result)
}
