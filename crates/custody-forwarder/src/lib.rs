//! Deposit forwarders.
//!
//! A forwarder is a cheap clone handed out as a deposit address. Native
//! currency is pushed to the parent wallet as it arrives; tokens are flushed
//! on request by the parent (or the fee address), and ERC721/ERC1155 tokens
//! can be flushed automatically from the receiver hooks.

/// The forwarder contract.
pub mod forwarder;
/// Persistent forwarder state.
pub mod state;

pub use forwarder::{Forwarder, ForwarderSettings};
pub use state::ForwarderState;
