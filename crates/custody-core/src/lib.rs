//! Core wiring of the custody protocol.
//!
//! This module deploys a complete protocol instance onto a host chain from a
//! validated configuration: the wallet and forwarder implementations, their
//! two clone factories and the standalone Batcher. The resulting [`Protocol`]
//! knows where everything lives and offers typed helpers to create and
//! predict wallets and forwarders.

pub mod builder;
pub mod protocol;

pub use builder::{BuilderError, ProtocolBuilder};
pub use protocol::{Protocol, ProtocolAddresses};

#[cfg(test)]
mod scenarios;
