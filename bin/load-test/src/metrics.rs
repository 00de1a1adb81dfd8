// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
	time::{Duration, Instant},
};

use coalesce::CoalescerStats;
use hdrhistogram::{CreationError, Histogram};
use parking_lot::Mutex;
use serde::Serialize;

/// Highest latency the histograms track: 60 seconds in microseconds.
const MAX_LATENCY_US: u64 = 60_000_000;

pub fn latency_histogram() -> Result<Histogram<u64>, CreationError> {
	Histogram::new_with_bounds(1, MAX_LATENCY_US, 3)
}

/// Collects insert outcomes across all workers.
pub struct Metrics {
	inserted: AtomicU64,
	failed: AtomicU64,

	latency: Mutex<Histogram<u64>>,
	started: Mutex<Option<Instant>>,
	errors: Mutex<HashMap<String, u64>>,
}

impl Metrics {
	pub fn new() -> Result<Self, CreationError> {
		Ok(Self {
			inserted: AtomicU64::new(0),
			failed: AtomicU64::new(0),
			latency: Mutex::new(latency_histogram()?),
			started: Mutex::new(None),
			errors: Mutex::new(HashMap::new()),
		})
	}

	pub fn start(&self) {
		*self.started.lock() = Some(Instant::now());
	}

	/// Folds a worker's local tallies in once it is done.
	pub fn merge_worker(&self, inserted: u64, histogram: &Histogram<u64>) {
		self.inserted.fetch_add(inserted, Ordering::Relaxed);
		self.latency.lock().add(histogram).ok();
	}

	pub fn record_error(&self, error: &str) {
		self.failed.fetch_add(1, Ordering::Relaxed);

		let key = match error.char_indices().nth(97) {
			Some((cut, _)) if error.len() > 100 => format!("{}...", &error[..cut]),
			_ => error.to_string(),
		};
		*self.errors.lock().entry(key).or_insert(0) += 1;
	}

	pub fn summary(&self, coalescer: CoalescerStats) -> Summary {
		let histogram = self.latency.lock();
		let started = *self.started.lock();
		let elapsed = started.map(|s| s.elapsed()).unwrap_or(Duration::ZERO);
		let inserted = self.inserted.load(Ordering::Relaxed);
		let failed = self.failed.load(Ordering::Relaxed);

		let duration_secs = elapsed.as_secs_f64();
		let throughput = if duration_secs > 0.0 {
			inserted as f64 / duration_secs
		} else {
			0.0
		};

		Summary {
			inserted,
			failed,
			duration_secs,
			throughput,
			average_batch: coalescer.average_batch(),
			latency_min_us: histogram.min(),
			latency_max_us: histogram.max(),
			latency_avg_us: histogram.mean(),
			latency_p50_us: histogram.value_at_quantile(0.50),
			latency_p90_us: histogram.value_at_quantile(0.90),
			latency_p99_us: histogram.value_at_quantile(0.99),
			latency_p999_us: histogram.value_at_quantile(0.999),
			top_errors: self.top_errors(5),
			coalescer,
		}
	}

	fn top_errors(&self, n: usize) -> Vec<(String, u64)> {
		let errors = self.errors.lock();
		let mut sorted: Vec<_> = errors.iter().map(|(k, v)| (k.clone(), *v)).collect();
		sorted.sort_by(|a, b| b.1.cmp(&a.1));
		sorted.truncate(n);
		sorted
	}
}

#[derive(Debug, Serialize)]
pub struct Summary {
	pub inserted: u64,
	pub failed: u64,
	pub duration_secs: f64,
	/// Successful inserts per second.
	pub throughput: f64,
	pub average_batch: f64,
	pub latency_min_us: u64,
	pub latency_max_us: u64,
	pub latency_avg_us: f64,
	pub latency_p50_us: u64,
	pub latency_p90_us: u64,
	pub latency_p99_us: u64,
	pub latency_p999_us: u64,
	pub top_errors: Vec<(String, u64)>,
	pub coalescer: CoalescerStats,
}

impl Summary {
	pub fn error_rate(&self) -> f64 {
		let total = self.inserted + self.failed;
		if total > 0 {
			(self.failed as f64 / total as f64) * 100.0
		} else {
			0.0
		}
	}

	pub fn print(&self) {
		println!("inserted       {}", self.inserted);
		println!("failed         {} ({:.2}%)", self.failed, self.error_rate());
		println!("duration       {:.2}s", self.duration_secs);
		println!("throughput     {:.0} rows/s", self.throughput);
		println!(
			"flushes        {} ({} failed), {:.1} rows/batch",
			self.coalescer.flushes, self.coalescer.failed_flushes, self.average_batch
		);
		println!(
			"handles        {} allocated, {} reused, {} idle",
			self.coalescer.handles_allocated, self.coalescer.handles_reused, self.coalescer.handles_idle
		);
		println!(
			"latency (us)   min {} avg {:.0} p50 {} p90 {} p99 {} p99.9 {} max {}",
			self.latency_min_us,
			self.latency_avg_us,
			self.latency_p50_us,
			self.latency_p90_us,
			self.latency_p99_us,
			self.latency_p999_us,
			self.latency_max_us
		);
		for (error, count) in &self.top_errors {
			println!("error x{count}  {error}");
		}
	}
}

#[cfg(test)]
mod tests {
	use coalesce::CoalescerStats;

	use super::{Metrics, latency_histogram};

	#[test]
	fn test_summary_merges_workers() {
		let metrics = Metrics::new().unwrap();
		metrics.start();

		let mut a = latency_histogram().unwrap();
		a.record(100).unwrap();
		a.record(300).unwrap();
		let mut b = latency_histogram().unwrap();
		b.record(200).unwrap();

		metrics.merge_worker(2, &a);
		metrics.merge_worker(1, &b);
		metrics.record_error("coalesce: closed");

		let summary = metrics.summary(CoalescerStats {
			flushes: 1,
			rows_flushed: 3,
			..Default::default()
		});
		assert_eq!(summary.inserted, 3);
		assert_eq!(summary.failed, 1);
		assert_eq!(summary.latency_min_us, 100);
		assert_eq!(summary.average_batch, 3.0);
		assert_eq!(summary.error_rate(), 25.0);
		assert_eq!(summary.top_errors, vec![("coalesce: closed".to_string(), 1)]);
	}

	#[test]
	fn test_long_errors_are_truncated() {
		let metrics = Metrics::new().unwrap();
		metrics.record_error(&"x".repeat(150));
		metrics.record_error(&"x".repeat(200));

		let summary = metrics.summary(CoalescerStats::default());
		assert_eq!(summary.top_errors.len(), 1);
		assert_eq!(summary.top_errors[0].0.len(), 100);
		assert_eq!(summary.top_errors[0].1, 2);
	}
}
