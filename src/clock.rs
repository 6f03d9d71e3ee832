//! Wall-clock source shared by every expiry decision.

// std
use std::{
	fmt::Debug,
	sync::{PoisonError, RwLock},
};
// self
use crate::_prelude::*;

/// Source of the current UTC time.
pub trait Clock: Send + Sync + Debug {
	/// Current instant.
	fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Manually driven clock for deterministic expiry tests.
#[derive(Debug)]
pub struct FixedClock {
	now: RwLock<DateTime<Utc>>,
}
impl FixedClock {
	/// Create a clock frozen at `now`.
	pub fn new(now: DateTime<Utc>) -> Self {
		Self { now: RwLock::new(now) }
	}

	/// Create a shared clock frozen at the current system time.
	pub fn starting_now() -> Arc<Self> {
		Arc::new(Self::new(Utc::now()))
	}

	/// Jump to an absolute instant.
	pub fn set(&self, now: DateTime<Utc>) {
		*self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
	}

	/// Move the clock forward (or backward for negative deltas).
	pub fn advance(&self, delta: TimeDelta) {
		let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);

		*now += delta;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.read().unwrap_or_else(PoisonError::into_inner)
	}
}
