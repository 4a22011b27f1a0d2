//! Deterministic clone factories.
//!
//! Wallets and forwarders are deployed as EIP-1167 minimal proxies of a
//! shared implementation, at CREATE2 addresses that anyone can compute before
//! deployment. The salt fed to CREATE2 mixes the creator's arguments into the
//! caller's salt, so different signer sets or parents never collide.

/// Pure address prediction.
pub mod address;
/// Factory contracts.
pub mod factory;

pub use address::{
	predict_clone_address, predict_forwarder_address, predict_wallet_address, CreatorArgs,
};
pub use factory::{DeterministicFactory, ForwarderFactory, WalletFactory};
