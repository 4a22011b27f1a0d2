//! Authorization primitives of the custody wallet.
//!
//! This module provides the two stateless/stateful building blocks every
//! co-signed wallet operation goes through: operation hashing with signer
//! recovery, and sliding-window replay protection over sequence IDs.

/// Operation hashing and signer recovery.
pub mod authorizer;
/// Replay protection window.
pub mod sequence;

pub use authorizer::{recover_signer, SignatureAuthorizer, SIGNATURE_LENGTH};
pub use sequence::{
	SequenceError, SequenceGuard, MAX_SEQUENCE_ID_INCREASE, SEQUENCE_ID_WINDOW_SIZE,
};
