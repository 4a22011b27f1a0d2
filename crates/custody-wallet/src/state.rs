use alloy_primitives::Address;
use custody_auth::SequenceGuard;
use custody_chain::{Guarded, ReentrancyGuard};
use custody_types::utils::MIN_SIGNERS;
use custody_types::CustodyError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Safe mode of a wallet; `Active` is permanent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafeMode {
	#[default]
	Normal,
	Active,
}

/// Storage layout of a wallet clone.
#[derive(Debug, Clone, Default)]
pub struct WalletState {
	signers: Vec<Address>,
	safe_mode: SafeMode,
	initialized: bool,
	sequence: SequenceGuard,
	guard: ReentrancyGuard,
}

impl WalletState {
	pub fn signers(&self) -> &[Address] {
		&self.signers
	}

	pub fn is_signer(&self, address: &Address) -> bool {
		self.signers.contains(address)
	}

	pub fn safe_mode(&self) -> SafeMode {
		self.safe_mode
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	pub fn sequence(&self) -> &SequenceGuard {
		&self.sequence
	}

	pub(crate) fn sequence_mut(&mut self) -> &mut SequenceGuard {
		&mut self.sequence
	}

	/// One-shot transition to `Initialized` with an immutable signer set.
	pub(crate) fn initialize(&mut self, signers: Vec<Address>) -> Result<(), CustodyError> {
		if self.initialized {
			return Err(CustodyError::AlreadyInitialized);
		}
		validate_signers(&signers)?;
		self.signers = signers;
		self.initialized = true;
		Ok(())
	}

	/// Moves to `Active`; returns whether this call changed the mode.
	pub(crate) fn activate_safe_mode(&mut self) -> bool {
		let changed = self.safe_mode == SafeMode::Normal;
		self.safe_mode = SafeMode::Active;
		changed
	}
}

impl Guarded for WalletState {
	fn reentrancy_guard(&mut self) -> &mut ReentrancyGuard {
		&mut self.guard
	}
}

/// Checks size, zero addresses and duplicates of a signer list.
pub fn validate_signers(signers: &[Address]) -> Result<(), CustodyError> {
	if signers.len() < MIN_SIGNERS {
		return Err(CustodyError::InvalidSignerSet(format!(
			"at least {} signers required, got {}",
			MIN_SIGNERS,
			signers.len()
		)));
	}
	if signers.contains(&Address::ZERO) {
		return Err(CustodyError::InvalidSignerSet("zero address signer".into()));
	}
	let mut seen = HashSet::with_capacity(signers.len());
	for signer in signers {
		if !seen.insert(signer) {
			return Err(CustodyError::InvalidSignerSet(format!(
				"duplicate signer {}",
				signer
			)));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_signer_set_validation() {
		let a = Address::repeat_byte(1);
		let b = Address::repeat_byte(2);
		assert!(validate_signers(&[a]).is_err());
		assert!(validate_signers(&[a, a]).is_err());
		assert!(validate_signers(&[a, Address::ZERO]).is_err());
		assert!(validate_signers(&[a, b]).is_ok());
	}

	#[test]
	fn test_initialize_once_and_safe_mode_one_way() {
		let mut state = WalletState::default();
		let signers = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
		state.initialize(signers.clone()).unwrap();
		assert_eq!(
			state.initialize(signers),
			Err(CustodyError::AlreadyInitialized)
		);
		assert!(state.activate_safe_mode());
		assert!(!state.activate_safe_mode());
		assert_eq!(state.safe_mode(), SafeMode::Active);
	}
}
