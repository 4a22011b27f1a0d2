//! Multi-signature custody wallet.
//!
//! This module provides `WalletSimple`, a 2-of-N wallet: every outgoing
//! transfer is submitted by one signer and carries the signature of a second
//! one. The wallet supports native, ERC20 and batch sends, an irreversible
//! safe mode restricting payouts to the signers themselves, and relays flush
//! instructions to the forwarders it is parent of.

/// Persistent wallet state.
pub mod state;
/// The wallet contract.
pub mod wallet;

pub use state::{SafeMode, WalletState};
pub use wallet::{WalletSettings, WalletSimple};
