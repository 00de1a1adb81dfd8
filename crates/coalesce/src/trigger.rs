// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use tokio::{
	select,
	time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

/// Why the flush task woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
	Tick,
	Shutdown,
}

/// Periodic wake-up source for the flush task, tied to the lifetime token.
pub(crate) struct FlushTrigger {
	ticker: Interval,
	lifetime: CancellationToken,
}

impl FlushTrigger {
	/// The first tick fires one full `period` after creation.
	pub(crate) fn new(period: Duration, lifetime: CancellationToken) -> Self {
		let mut ticker = interval_at(Instant::now() + period, period);
		// Ticks missed during a slow bulk write are dropped, not replayed.
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		Self {
			ticker,
			lifetime,
		}
	}

	/// Shutdown wins over a tick that is ready at the same time.
	pub(crate) async fn next(&mut self) -> Trigger {
		select! {
			biased;
			_ = self.lifetime.cancelled() => Trigger::Shutdown,
			_ = self.ticker.tick() => Trigger::Tick,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio_util::sync::CancellationToken;

	use super::{FlushTrigger, Trigger};

	#[tokio::test(start_paused = true)]
	async fn test_ticks_after_period() {
		let start = tokio::time::Instant::now();
		let mut trigger = FlushTrigger::new(Duration::from_millis(50), CancellationToken::new());

		assert_eq!(trigger.next().await, Trigger::Tick);
		assert!(start.elapsed() >= Duration::from_millis(50));

		assert_eq!(trigger.next().await, Trigger::Tick);
		assert!(start.elapsed() >= Duration::from_millis(100));
	}

	#[tokio::test(start_paused = true)]
	async fn test_shutdown_preempts_tick() {
		let lifetime = CancellationToken::new();
		let mut trigger = FlushTrigger::new(Duration::from_secs(3600), lifetime.clone());

		lifetime.cancel();
		assert_eq!(trigger.next().await, Trigger::Shutdown);
		assert_eq!(trigger.next().await, Trigger::Shutdown);
	}
}
