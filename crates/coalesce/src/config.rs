// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration of a [`Coalescer`](crate::Coalescer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescerConfig {
	/// Upper bound of rows absorbed by a single flush cycle.
	pub max_batch_size: usize,
	/// Interval between flush cycles.
	pub period: Duration,
	/// Number of idle notification handles kept for reuse. Defaults to
	/// `max_batch_size` when unset.
	#[serde(default)]
	pub max_idle_handles: Option<usize>,
}

impl Default for CoalescerConfig {
	fn default() -> Self {
		Self {
			max_batch_size: 1000,
			period: Duration::from_millis(10),
			max_idle_handles: None,
		}
	}
}

impl CoalescerConfig {
	pub fn new(max_batch_size: usize, period: Duration) -> Self {
		Self {
			max_batch_size,
			period,
			max_idle_handles: None,
		}
	}

	pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
		self.max_batch_size = max_batch_size;
		self
	}

	pub fn with_period(mut self, period: Duration) -> Self {
		self.period = period;
		self
	}

	pub fn with_max_idle_handles(mut self, max_idle_handles: usize) -> Self {
		self.max_idle_handles = Some(max_idle_handles);
		self
	}

	pub fn idle_handles(&self) -> usize {
		self.max_idle_handles.unwrap_or(self.max_batch_size)
	}

	/// Checks the batch size first, then the period.
	pub fn validate(&self) -> Result<()> {
		if self.max_batch_size == 0 {
			return Err(Error::InvalidMaxBatchSize);
		}
		if self.period.is_zero() {
			return Err(Error::InvalidPeriod);
		}
		Ok(())
	}
}
