use alloy_primitives::Address;
use custody_chain::{Guarded, ReentrancyGuard};
use custody_types::CustodyError;

/// Storage layout of a forwarder clone.
#[derive(Debug, Clone, Default)]
pub struct ForwarderState {
	parent: Address,
	fee_address: Option<Address>,
	auto_flush_721: bool,
	auto_flush_1155: bool,
	initialized: bool,
	guard: ReentrancyGuard,
}

impl ForwarderState {
	pub fn parent(&self) -> Address {
		self.parent
	}

	pub fn fee_address(&self) -> Option<Address> {
		self.fee_address
	}

	pub fn auto_flush_721(&self) -> bool {
		self.auto_flush_721
	}

	pub fn auto_flush_1155(&self) -> bool {
		self.auto_flush_1155
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	/// Parent or fee address.
	pub fn is_allowed(&self, address: &Address) -> bool {
		*address == self.parent || self.fee_address.as_ref() == Some(address)
	}

	pub(crate) fn initialize(
		&mut self,
		parent: Address,
		fee_address: Option<Address>,
		auto_flush_721: bool,
		auto_flush_1155: bool,
	) -> Result<(), CustodyError> {
		if self.initialized {
			return Err(CustodyError::AlreadyInitialized);
		}
		if parent == Address::ZERO {
			return Err(CustodyError::InvalidConfiguration(
				"forwarder parent cannot be the zero address".into(),
			));
		}
		self.parent = parent;
		self.fee_address = fee_address.filter(|fee| *fee != Address::ZERO);
		self.auto_flush_721 = auto_flush_721;
		self.auto_flush_1155 = auto_flush_1155;
		self.initialized = true;
		Ok(())
	}

	pub(crate) fn set_auto_flush_721(&mut self, enabled: bool) {
		self.auto_flush_721 = enabled;
	}

	pub(crate) fn set_auto_flush_1155(&mut self, enabled: bool) {
		self.auto_flush_1155 = enabled;
	}
}

impl Guarded for ForwarderState {
	fn reentrancy_guard(&mut self) -> &mut ReentrancyGuard {
		&mut self.guard
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_initialize_once() {
		let mut state = ForwarderState::default();
		let parent = Address::repeat_byte(1);
		state.initialize(parent, Some(Address::ZERO), true, false).unwrap();
		assert_eq!(state.fee_address(), None);
		assert!(state.is_allowed(&parent));
		assert!(!state.is_allowed(&Address::ZERO));
		assert_eq!(
			state.initialize(parent, None, true, true),
			Err(CustodyError::AlreadyInitialized)
		);
	}

	#[test]
	fn test_zero_parent_rejected() {
		let mut state = ForwarderState::default();
		assert!(matches!(
			state.initialize(Address::ZERO, None, false, false),
			Err(CustodyError::InvalidConfiguration(_))
		));
		assert!(!state.is_initialized());
	}

	#[test]
	fn test_fee_address_is_allowed() {
		let mut state = ForwarderState::default();
		let fee = Address::repeat_byte(2);
		state.initialize(Address::repeat_byte(1), Some(fee), false, false).unwrap();
		assert!(state.is_allowed(&fee));
		assert!(!state.is_allowed(&Address::repeat_byte(3)));
	}
}
