//! CREATE2 address derivation and EIP-1167 minimal proxy code.
//!
//! `address = last20(keccak256(0xff ‖ deployer ‖ salt ‖ keccak256(init_code)))`
//!
//! The derivation is pure, so an address can be handed out before anything
//! is deployed there.

use alloy_primitives::{hex, keccak256, Address, B256};

/// Creation code prefix of an EIP-1167 minimal proxy (before the implementation address).
const PROXY_CREATION_PREFIX: [u8; 20] = hex!("3d602d80600a3d3981f3363d3d373d3d3d363d73");
/// Creation code suffix of an EIP-1167 minimal proxy (after the implementation address).
const PROXY_CREATION_SUFFIX: [u8; 15] = hex!("5af43d82803e903d91602b57fd5bf3");

/// Computes the CREATE2 address of `init_code_hash` deployed by `deployer` with `salt`.
pub fn create2_address(deployer: &Address, salt: &B256, init_code_hash: &B256) -> Address {
	let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
	buf.push(0xff);
	buf.extend_from_slice(deployer.as_slice());
	buf.extend_from_slice(salt.as_slice());
	buf.extend_from_slice(init_code_hash.as_slice());
	Address::from_slice(&keccak256(buf)[12..])
}

/// Returns the EIP-1167 creation code of a clone forwarding to `implementation`.
pub fn minimal_proxy_creation_code(implementation: &Address) -> Vec<u8> {
	let mut code = Vec::with_capacity(55);
	code.extend_from_slice(&PROXY_CREATION_PREFIX);
	code.extend_from_slice(implementation.as_slice());
	code.extend_from_slice(&PROXY_CREATION_SUFFIX);
	code
}
