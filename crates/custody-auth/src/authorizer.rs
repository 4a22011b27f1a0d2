//! Operation hashing and co-signer recovery.
//!
//! The hash of an operation binds the deployment's coin prefix, every field
//! that decides where value goes, the deadline and the sequence ID. The
//! co-signer signs that raw hash (no message prefix) off-chain; the wallet
//! recomputes it from calldata and recovers who signed it.

use alloy_primitives::{hex, Address, PrimitiveSignature, B256, U256};
use custody_types::{CoinPrefixes, CustodyError, Operation, PackedEncoder};

/// Length of an `r ‖ s ‖ v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Half of the secp256k1 group order; valid `s` values are at or below it.
const SECP256K1_HALF_ORDER: [u8; 32] =
	hex!("7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0");

/// Hashes operations under one set of coin prefixes and recovers their co-signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAuthorizer {
	prefixes: CoinPrefixes,
}

impl SignatureAuthorizer {
	pub fn new(prefixes: CoinPrefixes) -> Self {
		Self { prefixes }
	}

	pub fn prefixes(&self) -> &CoinPrefixes {
		&self.prefixes
	}

	/// Computes the hash a co-signer signs for `operation`.
	///
	/// * native: `prefix ‖ to ‖ value ‖ data ‖ expireTime ‖ sequenceId`
	/// * token: `prefix ‖ to ‖ value ‖ token ‖ expireTime ‖ sequenceId`
	/// * batch: `prefix ‖ recipients[] ‖ values[] ‖ expireTime ‖ sequenceId`
	pub fn operation_hash(&self, operation: &Operation) -> B256 {
		let mut enc = PackedEncoder::new();
		enc.push_str(self.prefixes.for_kind(operation.kind()));
		match operation {
			Operation::Native(op) => {
				enc.push_address(&op.to)
					.push_u256(op.value)
					.push_bytes(&op.data);
			},
			Operation::Token(op) => {
				enc.push_address(&op.to)
					.push_u256(op.value)
					.push_address(&op.token_contract);
			},
			Operation::Batch(op) => {
				enc.push_address_array(&op.recipients)
					.push_u256_array(&op.values);
			},
		}
		enc.push_u64_word(operation.expire_time())
			.push_u64_word(operation.sequence_id());
		enc.keccak()
	}

	/// Hashes `operation` and recovers the address that signed it.
	pub fn recover(
		&self,
		operation: &Operation,
		signature: &[u8],
	) -> Result<(B256, Address), CustodyError> {
		let hash = self.operation_hash(operation);
		let signer = recover_signer(&hash, signature)?;
		Ok((hash, signer))
	}
}

/// Recovers the signer of a raw 32-byte hash from a 65-byte `r ‖ s ‖ v` signature.
///
/// `v` may be 27/28 or 0/1. Signatures with a high `s` are rejected, so each
/// authorization has exactly one valid encoding.
pub fn recover_signer(hash: &B256, signature: &[u8]) -> Result<Address, CustodyError> {
	if signature.len() != SIGNATURE_LENGTH {
		return Err(CustodyError::InvalidSignature(format!(
			"expected {} bytes, got {}",
			SIGNATURE_LENGTH,
			signature.len()
		)));
	}
	let r = U256::from_be_slice(&signature[0..32]);
	let s = U256::from_be_slice(&signature[32..64]);
	let v = match signature[64] {
		v @ (0 | 1) => v + 27,
		v => v,
	};
	let y_parity = match v {
		27 => false,
		28 => true,
		other => {
			return Err(CustodyError::InvalidSignature(format!(
				"invalid recovery id {}",
				other
			)))
		},
	};
	if s > U256::from_be_bytes(SECP256K1_HALF_ORDER) {
		return Err(CustodyError::InvalidSignature(
			"signature s value is not in the lower half order".into(),
		));
	}

	let signer = PrimitiveSignature::new(r, s, y_parity)
		.recover_address_from_prehash(hash)
		.map_err(|e| CustodyError::InvalidSignature(e.to_string()))?;
	if signer == Address::ZERO {
		return Err(CustodyError::InvalidSignature("recovered zero address".into()));
	}
	tracing::trace!(hash = %hash, signer = %signer, "Recovered co-signer");
	Ok(signer)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{keccak256, Bytes};
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use custody_types::{BatchOperation, NativeOperation, TokenOperation};

	const SECP256K1_ORDER: [u8; 32] =
		hex!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");

	fn signer() -> PrivateKeySigner {
		"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
			.parse()
			.unwrap()
	}

	fn native_op() -> Operation {
		NativeOperation {
			to: Address::repeat_byte(0x55),
			value: U256::from(50),
			data: Bytes::new(),
			expire_time: 1_700_000_000,
			sequence_id: 1,
		}
		.into()
	}

	#[test]
	fn test_native_hash_matches_packed_layout() {
		let authorizer = SignatureAuthorizer::new(CoinPrefixes::ether());
		let mut expected = Vec::new();
		expected.extend_from_slice(b"ETHER");
		expected.extend_from_slice(Address::repeat_byte(0x55).as_slice());
		expected.extend_from_slice(&U256::from(50).to_be_bytes::<32>());
		expected.extend_from_slice(&U256::from(1_700_000_000u64).to_be_bytes::<32>());
		expected.extend_from_slice(&U256::from(1).to_be_bytes::<32>());
		assert_eq!(authorizer.operation_hash(&native_op()), keccak256(&expected));
	}

	#[test]
	fn test_hash_separates_kinds_and_deployments() {
		let ether = SignatureAuthorizer::new(CoinPrefixes::ether());
		let polygon = SignatureAuthorizer::new(CoinPrefixes::polygon());
		assert_ne!(ether.operation_hash(&native_op()), polygon.operation_hash(&native_op()));

		let token: Operation = TokenOperation {
			to: Address::repeat_byte(0x55),
			value: U256::from(50),
			token_contract: Address::repeat_byte(0x77),
			expire_time: 1_700_000_000,
			sequence_id: 1,
		}
		.into();
		let batch: Operation = BatchOperation {
			recipients: vec![Address::repeat_byte(0x55)],
			values: vec![U256::from(50)],
			expire_time: 1_700_000_000,
			sequence_id: 1,
		}
		.into();
		let hashes = [
			ether.operation_hash(&native_op()),
			ether.operation_hash(&token),
			ether.operation_hash(&batch),
		];
		assert_ne!(hashes[0], hashes[1]);
		assert_ne!(hashes[0], hashes[2]);
		assert_ne!(hashes[1], hashes[2]);
	}

	#[test]
	fn test_recover_round_trip() {
		let authorizer = SignatureAuthorizer::new(CoinPrefixes::ether());
		let key = signer();
		let hash = authorizer.operation_hash(&native_op());
		let signature = key.sign_hash_sync(&hash).unwrap().as_bytes();

		let (recovered_hash, recovered) = authorizer.recover(&native_op(), &signature).unwrap();
		assert_eq!(recovered_hash, hash);
		assert_eq!(recovered, key.address());
	}

	#[test]
	fn test_recovery_id_zero_one_accepted() {
		let key = signer();
		let hash = keccak256(b"operation");
		let mut signature = key.sign_hash_sync(&hash).unwrap().as_bytes();
		signature[64] -= 27;
		assert_eq!(recover_signer(&hash, &signature).unwrap(), key.address());
	}

	#[test]
	fn test_malformed_signatures_rejected() {
		let key = signer();
		let hash = keccak256(b"operation");
		let signature = key.sign_hash_sync(&hash).unwrap().as_bytes();

		assert!(matches!(
			recover_signer(&hash, &signature[..64]),
			Err(CustodyError::InvalidSignature(_))
		));

		let mut bad_v = signature;
		bad_v[64] = 29;
		assert!(matches!(
			recover_signer(&hash, &bad_v),
			Err(CustodyError::InvalidSignature(_))
		));
	}

	#[test]
	fn test_high_s_rejected() {
		let key = signer();
		let hash = keccak256(b"operation");
		let signature = key.sign_hash_sync(&hash).unwrap().as_bytes();

		// (r, n - s, !v) recovers the same key but is the malleable twin.
		let s = U256::from_be_slice(&signature[32..64]);
		let high_s = U256::from_be_bytes(SECP256K1_ORDER) - s;
		let mut twin = signature;
		twin[32..64].copy_from_slice(&high_s.to_be_bytes::<32>());
		twin[64] = if signature[64] == 27 { 28 } else { 27 };
		assert!(matches!(
			recover_signer(&hash, &twin),
			Err(CustodyError::InvalidSignature(_))
		));
	}

	#[test]
	fn test_other_key_recovers_other_address() {
		let authorizer = SignatureAuthorizer::new(CoinPrefixes::ether());
		let other: PrivateKeySigner =
			"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
				.parse()
				.unwrap();
		let hash = authorizer.operation_hash(&native_op());
		let signature = other.sign_hash_sync(&hash).unwrap().as_bytes();
		let (_, recovered) = authorizer.recover(&native_op(), &signature).unwrap();
		assert_ne!(recovered, signer().address());
		assert_eq!(recovered, other.address());
	}
}
