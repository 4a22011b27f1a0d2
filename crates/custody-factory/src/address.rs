use alloy_primitives::{keccak256, Address, B256};
use custody_types::{create2_address, minimal_proxy_creation_code, PackedEncoder};
use serde::{Deserialize, Serialize};

/// Arguments a clone is created with that also determine its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatorArgs {
	Wallet { signers: Vec<Address> },
	/// `fee_address` of `None` packs as the zero address.
	Forwarder {
		parent: Address,
		fee_address: Option<Address>,
	},
}

impl CreatorArgs {
	/// Derives the CREATE2 salt from these arguments and the caller's `salt`.
	///
	/// * wallet: `keccak256(address[] signers ‖ salt)`
	/// * forwarder: `keccak256(parent ‖ feeAddress ‖ salt)`
	pub fn calculation_salt(&self, salt: &B256) -> B256 {
		let mut enc = PackedEncoder::new();
		match self {
			Self::Wallet { signers } => {
				enc.push_address_array(signers);
			},
			Self::Forwarder {
				parent,
				fee_address,
			} => {
				enc.push_address(parent)
					.push_address(&fee_address.unwrap_or(Address::ZERO));
			},
		}
		enc.push_b256(salt);
		enc.keccak()
	}
}

/// Address of the clone of `implementation` deployed by `factory` under `calculation_salt`.
pub fn predict_clone_address(
	factory: &Address,
	implementation: &Address,
	calculation_salt: &B256,
) -> Address {
	let init_code_hash = keccak256(minimal_proxy_creation_code(implementation));
	create2_address(factory, calculation_salt, &init_code_hash)
}

/// Address a wallet factory will deploy `signers` at for `salt`.
pub fn predict_wallet_address(
	factory: &Address,
	implementation: &Address,
	signers: &[Address],
	salt: &B256,
) -> Address {
	let args = CreatorArgs::Wallet {
		signers: signers.to_vec(),
	};
	predict_clone_address(factory, implementation, &args.calculation_salt(salt))
}

/// Address a forwarder factory will deploy a forwarder to `parent` at for `salt`.
pub fn predict_forwarder_address(
	factory: &Address,
	implementation: &Address,
	parent: &Address,
	fee_address: Option<&Address>,
	salt: &B256,
) -> Address {
	let args = CreatorArgs::Forwarder {
		parent: *parent,
		fee_address: fee_address.copied(),
	};
	predict_clone_address(factory, implementation, &args.calculation_salt(salt))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	#[test]
	fn test_wallet_salt_packs_signers_as_words() {
		let signers = vec![addr(1), addr(2)];
		let salt = B256::repeat_byte(9);
		let mut expected = Vec::new();
		for signer in &signers {
			expected.extend_from_slice(&[0u8; 12]);
			expected.extend_from_slice(signer.as_slice());
		}
		expected.extend_from_slice(salt.as_slice());
		assert_eq!(
			CreatorArgs::Wallet { signers }.calculation_salt(&salt),
			keccak256(&expected)
		);
	}

	#[test]
	fn test_forwarder_without_fee_packs_zero_address() {
		let salt = B256::repeat_byte(9);
		let none = CreatorArgs::Forwarder {
			parent: addr(1),
			fee_address: None,
		};
		let zero = CreatorArgs::Forwarder {
			parent: addr(1),
			fee_address: Some(Address::ZERO),
		};
		assert_eq!(none.calculation_salt(&salt), zero.calculation_salt(&salt));
	}

	#[test]
	fn test_creator_args_separate_addresses() {
		let factory = addr(0xf0);
		let implementation = addr(0xf1);
		let salt = B256::repeat_byte(1);

		let a = predict_wallet_address(&factory, &implementation, &[addr(1), addr(2)], &salt);
		let b = predict_wallet_address(&factory, &implementation, &[addr(1), addr(3)], &salt);
		let other_salt = B256::repeat_byte(2);
		let c = predict_wallet_address(&factory, &implementation, &[addr(1), addr(2)], &other_salt);
		assert_ne!(a, b);
		assert_ne!(a, c);

		let p = predict_forwarder_address(&factory, &implementation, &addr(1), None, &salt);
		let q =
			predict_forwarder_address(&factory, &implementation, &addr(1), Some(&addr(5)), &salt);
		assert_ne!(p, q);
		// Pure: same inputs, same address.
		assert_eq!(
			p,
			predict_forwarder_address(&factory, &implementation, &addr(1), None, &salt)
		);
	}
}
