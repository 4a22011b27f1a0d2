//! Solidity tight packing (`abi.encodePacked`).
//!
//! Operation hashes and factory salts are defined over tightly packed bytes:
//! strings and `bytes` are copied raw, addresses take 20 bytes, integers their
//! full width, while array elements are each padded to a 32-byte word.

use alloy_primitives::{keccak256, Address, B256, U256};

/// Incremental encoder producing `abi.encodePacked` output.
#[derive(Debug, Clone, Default)]
pub struct PackedEncoder {
	buf: Vec<u8>,
}

impl PackedEncoder {
	pub fn new() -> Self {
		Self { buf: Vec::new() }
	}

	pub fn push_str(&mut self, value: &str) -> &mut Self {
		self.buf.extend_from_slice(value.as_bytes());
		self
	}

	pub fn push_bytes(&mut self, value: &[u8]) -> &mut Self {
		self.buf.extend_from_slice(value);
		self
	}

	pub fn push_address(&mut self, value: &Address) -> &mut Self {
		self.buf.extend_from_slice(value.as_slice());
		self
	}

	pub fn push_b256(&mut self, value: &B256) -> &mut Self {
		self.buf.extend_from_slice(value.as_slice());
		self
	}

	pub fn push_u256(&mut self, value: U256) -> &mut Self {
		self.buf.extend_from_slice(&value.to_be_bytes::<32>());
		self
	}

	/// Packs a `u64` as a `uint256`.
	pub fn push_u64_word(&mut self, value: u64) -> &mut Self {
		self.push_u256(U256::from(value))
	}

	/// Packs an `address[]`: each element left-padded to 32 bytes.
	pub fn push_address_array(&mut self, values: &[Address]) -> &mut Self {
		for value in values {
			self.buf.extend_from_slice(value.into_word().as_slice());
		}
		self
	}

	/// Packs a `uint256[]`.
	pub fn push_u256_array(&mut self, values: &[U256]) -> &mut Self {
		for value in values {
			self.push_u256(*value);
		}
		self
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.buf
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}

	/// Returns the keccak-256 hash of the packed bytes.
	pub fn keccak(&self) -> B256 {
		keccak256(&self.buf)
	}
}
