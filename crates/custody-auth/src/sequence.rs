//! Sliding-window replay protection.
//!
//! A wallet remembers the highest sequence ID it has accepted and which of
//! the IDs just below it were consumed. IDs may arrive out of order as long
//! as they stay inside the window; anything at or below the window floor is
//! refused outright, so an ID is accepted at most once. The high-water mark
//! may advance by at most [`MAX_SEQUENCE_ID_INCREASE`] per operation, so a
//! single co-signed ID cannot exhaust the ID space.

use custody_types::CustodyError;
use thiserror::Error;

/// Number of sequence IDs tracked below and including the high-water mark.
pub const SEQUENCE_ID_WINDOW_SIZE: u64 = 10;

/// Largest amount an accepted ID may exceed the current high-water mark by.
pub const MAX_SEQUENCE_ID_INCREASE: u64 = 10_000;

const WINDOW_MASK: u16 = (1 << SEQUENCE_ID_WINDOW_SIZE) - 1;

/// Reasons a sequence ID is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequenceError {
	#[error("Sequence ID {0} already used")]
	AlreadyUsed(u64),
	#[error("Sequence ID {sequence_id} is not above the window floor {floor}")]
	TooLow { sequence_id: u64, floor: u64 },
	#[error("Sequence ID {sequence_id} is above the highest acceptable ID {limit}")]
	TooHigh { sequence_id: u64, limit: u64 },
}

impl From<SequenceError> for CustodyError {
	fn from(err: SequenceError) -> Self {
		match err {
			SequenceError::AlreadyUsed(id) => CustodyError::SequenceIdAlreadyUsed(id),
			SequenceError::TooLow { sequence_id, floor } => {
				CustodyError::SequenceIdTooLow { sequence_id, floor }
			},
			SequenceError::TooHigh { sequence_id, limit } => {
				CustodyError::SequenceIdTooHigh { sequence_id, limit }
			},
		}
	}
}

/// Replay guard owned by one wallet.
///
/// Bit `k` of `window` records whether `high_water_mark - k` was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceGuard {
	high_water_mark: u64,
	window: u16,
}

impl SequenceGuard {
	pub fn new() -> Self {
		Self::default()
	}

	/// Highest sequence ID accepted so far (0 before the first).
	pub fn high_water_mark(&self) -> u64 {
		self.high_water_mark
	}

	/// IDs at or below this value are refused.
	pub fn floor(&self) -> u64 {
		self.high_water_mark.saturating_sub(SEQUENCE_ID_WINDOW_SIZE)
	}

	/// Smallest ID that is guaranteed to be accepted next.
	pub fn next_sequence_id(&self) -> u64 {
		self.high_water_mark.saturating_add(1)
	}

	/// IDs above this value are refused.
	pub fn ceiling(&self) -> u64 {
		self.high_water_mark.saturating_add(MAX_SEQUENCE_ID_INCREASE)
	}

	/// Whether `sequence_id` was consumed and is still inside the window.
	pub fn is_consumed(&self, sequence_id: u64) -> bool {
		if sequence_id > self.high_water_mark || sequence_id <= self.floor() {
			return false;
		}
		let offset = self.high_water_mark - sequence_id;
		self.window & (1 << offset) != 0
	}

	/// Checks `sequence_id` without recording it.
	pub fn check(&self, sequence_id: u64) -> Result<(), SequenceError> {
		let floor = self.floor();
		if sequence_id <= floor {
			return Err(SequenceError::TooLow { sequence_id, floor });
		}
		let limit = self.ceiling();
		if sequence_id > limit {
			return Err(SequenceError::TooHigh { sequence_id, limit });
		}
		if self.is_consumed(sequence_id) {
			return Err(SequenceError::AlreadyUsed(sequence_id));
		}
		Ok(())
	}

	/// Consumes `sequence_id`, sliding the window when it raises the high-water mark.
	pub fn accept(&mut self, sequence_id: u64) -> Result<(), SequenceError> {
		self.check(sequence_id)?;
		if sequence_id > self.high_water_mark {
			let shift = sequence_id - self.high_water_mark;
			self.window = if shift >= SEQUENCE_ID_WINDOW_SIZE {
				0
			} else {
				(self.window << shift) & WINDOW_MASK
			};
			self.high_water_mark = sequence_id;
		}
		let offset = self.high_water_mark - sequence_id;
		self.window |= 1 << offset;
		Ok(())
	}
}
