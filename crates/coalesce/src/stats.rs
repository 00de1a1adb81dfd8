// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared between callers and the flush task.
#[derive(Default)]
pub(crate) struct Stats {
	pub(crate) submitted: AtomicU64,
	pub(crate) cancelled: AtomicU64,
	pub(crate) rejected: AtomicU64,
	pub(crate) flushes: AtomicU64,
	pub(crate) failed_flushes: AtomicU64,
	pub(crate) rows_flushed: AtomicU64,
}

impl Stats {
	pub(crate) fn record_flush(&self, rows: usize, failed: bool) {
		self.flushes.fetch_add(1, Ordering::Relaxed);
		self.rows_flushed.fetch_add(rows as u64, Ordering::Relaxed);
		if failed {
			self.failed_flushes.fetch_add(1, Ordering::Relaxed);
		}
	}
}

/// Point-in-time view of a coalescer's activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoalescerStats {
	/// Requests parked on the hand-off queue.
	pub submitted: u64,
	/// Requests withdrawn because their wait ended first.
	pub cancelled: u64,
	/// Inserts refused because the coalescer was closed.
	pub rejected: u64,
	/// Bulk writes issued.
	pub flushes: u64,
	/// Bulk writes that returned an error.
	pub failed_flushes: u64,
	/// Rows passed to the writer.
	pub rows_flushed: u64,
	/// Notification handles allocated / served from the pool.
	pub handles_allocated: u64,
	pub handles_reused: u64,
	/// Notification handles currently waiting in the pool.
	pub handles_idle: usize,
}

impl CoalescerStats {
	/// Mean rows per bulk write.
	pub fn average_batch(&self) -> f64 {
		if self.flushes == 0 {
			return 0.0;
		}
		self.rows_flushed as f64 / self.flushes as f64
	}
}
