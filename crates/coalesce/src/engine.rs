// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The coalescing engine and its flush task.

use std::{
	future::Future,
	pin::pin,
	sync::{Arc, atomic::Ordering},
	time::Duration,
};

use futures_util::FutureExt;
use tokio::{
	runtime::Handle,
	select,
	time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, instrument, trace, warn};

use crate::{
	buffer::BatchBuffer,
	config::CoalescerConfig,
	error::{Error, InsertError, Result},
	notify::{Delivery, NotifyPool},
	queue::HandOffQueue,
	stats::{CoalescerStats, Stats},
	trigger::{FlushTrigger, Trigger},
	writer::BatchWriter,
};

struct Shared<R, E> {
	config: CoalescerConfig,
	queue: HandOffQueue<R, E>,
	pool: Arc<NotifyPool<E>>,
	stats: Stats,
	stopped: CancellationToken,
}

/// Merges concurrent single-row inserts into periodic bulk writes.
///
/// Every clone submits to the same flush task. The task wakes once per
/// `period`, takes up to `max_batch_size` parked rows, hands them to the
/// [`BatchWriter`] in one call and delivers that call's result to every
/// caller of the batch. Rows that do not fit stay parked for a later cycle.
///
/// # Example
///
/// ```ignore
/// let lifetime = CancellationToken::new();
/// let coalescer = Coalescer::new(
///     blocking_fn(|rows: Vec<Row>| store.copy_from(&rows)),
///     1000,
///     Duration::from_millis(5),
///     lifetime.clone(),
/// )?;
///
/// // from any number of tasks
/// coalescer.insert(&CancellationToken::new(), row![Value::now(), Uuid::new_v4(), 0.5]).await?;
///
/// lifetime.cancel();
/// coalescer.stopped().await;
/// ```
pub struct Coalescer<R, E> {
	shared: Arc<Shared<R, E>>,
}

impl<R, E> Clone for Coalescer<R, E> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<R, E> Coalescer<R, E>
where
	R: Send + 'static,
	E: Send + Sync + 'static,
{
	/// Validates the parameters and spawns the flush task on the current
	/// tokio runtime, which must have its time driver enabled.
	///
	/// The task runs until `lifetime` is cancelled or every handle is
	/// dropped, and flushes whatever was parked one last time before it
	/// exits.
	pub fn new<W>(writer: W, max_batch_size: usize, period: Duration, lifetime: CancellationToken) -> Result<Self>
	where
		W: BatchWriter<R, Error = E>,
	{
		Self::with_config(writer, CoalescerConfig::new(max_batch_size, period), lifetime)
	}

	pub fn with_config<W>(writer: W, config: CoalescerConfig, lifetime: CancellationToken) -> Result<Self>
	where
		W: BatchWriter<R, Error = E>,
	{
		config.validate()?;
		let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

		let shared = Arc::new(Shared {
			queue: HandOffQueue::new(),
			pool: NotifyPool::new(config.idle_handles()),
			stats: Stats::default(),
			stopped: CancellationToken::new(),
			config,
		});

		let engine = FlushEngine {
			buffer: BatchBuffer::new(shared.config.max_batch_size),
			shared: Arc::clone(&shared),
			writer,
		};
		runtime.spawn(engine.run(lifetime));

		debug!(
			max_batch_size = shared.config.max_batch_size,
			period_us = shared.config.period.as_micros() as u64,
			"coalescer started"
		);

		Ok(Self {
			shared,
		})
	}

	/// Submits `row` and waits for the bulk write that contains it.
	///
	/// If `wait` is cancelled before the flush task takes the row, the row is
	/// withdrawn and [`InsertError::Cancelled`] is returned. Once the row has
	/// been taken, the call waits for the batch result without any timeout.
	pub async fn insert(&self, wait: &CancellationToken, row: R) -> std::result::Result<(), InsertError<E>> {
		self.submit(row, wait.cancelled(), InsertError::Cancelled).await
	}

	/// Like [`insert`](Self::insert), but the wait for acceptance is bounded
	/// by `timeout` and ends with [`InsertError::DeadlineExceeded`]. A zero
	/// timeout has already expired: the row is never parked.
	pub async fn insert_timeout(&self, timeout: Duration, row: R) -> std::result::Result<(), InsertError<E>> {
		let deadline = Instant::now() + timeout;
		if timeout.is_zero() {
			self.shared.stats.cancelled.fetch_add(1, Ordering::Relaxed);
			return Err(InsertError::DeadlineExceeded);
		}
		self.submit(row, time::sleep_until(deadline), InsertError::DeadlineExceeded).await
	}

	async fn submit<F>(&self, row: R, wait: F, expired: InsertError<E>) -> std::result::Result<(), InsertError<E>>
	where
		F: Future<Output = ()>,
	{
		let shared = &self.shared;
		let mut wait = pin!(wait);

		if wait.as_mut().now_or_never().is_some() {
			shared.stats.cancelled.fetch_add(1, Ordering::Relaxed);
			return Err(expired);
		}

		let pending = shared.pool.acquire();
		let Some(ticket) = shared.queue.push(row, pending.notifier()) else {
			shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
			return Err(InsertError::Closed);
		};
		shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
		trace!(?ticket, "row parked");

		select! {
			biased;
			delivery = pending.wait() => return into_result(delivery),
			_ = wait => {
				if shared.queue.withdraw(ticket) {
					shared.stats.cancelled.fetch_add(1, Ordering::Relaxed);
					trace!(?ticket, "row withdrawn");
					return Err(expired);
				}
			}
		}

		// Taken by the flush task before the wait ended.
		into_result(pending.wait().await)
	}

	/// Number of rows parked and not yet taken by a flush cycle.
	pub fn queued(&self) -> usize {
		self.shared.queue.len()
	}

	pub fn config(&self) -> &CoalescerConfig {
		&self.shared.config
	}

	pub fn stats(&self) -> CoalescerStats {
		let stats = &self.shared.stats;
		CoalescerStats {
			submitted: stats.submitted.load(Ordering::Relaxed),
			cancelled: stats.cancelled.load(Ordering::Relaxed),
			rejected: stats.rejected.load(Ordering::Relaxed),
			flushes: stats.flushes.load(Ordering::Relaxed),
			failed_flushes: stats.failed_flushes.load(Ordering::Relaxed),
			rows_flushed: stats.rows_flushed.load(Ordering::Relaxed),
			handles_allocated: self.shared.pool.allocated(),
			handles_reused: self.shared.pool.reused(),
			handles_idle: self.shared.pool.idle(),
		}
	}

	/// Resolves once the flush task has done its final flush and exited.
	pub async fn stopped(&self) {
		self.shared.stopped.cancelled().await
	}

	pub fn is_stopped(&self) -> bool {
		self.shared.stopped.is_cancelled()
	}
}

fn into_result<E>(delivery: Delivery<E>) -> std::result::Result<(), InsertError<E>> {
	match delivery {
		Delivery::Written(Ok(())) => Ok(()),
		Delivery::Written(Err(err)) => Err(InsertError::Batch(err)),
		Delivery::Abandoned => Err(InsertError::Closed),
	}
}

/// State owned by the flush task. The batch buffer lives here and nowhere
/// else.
struct FlushEngine<W, R, E> {
	shared: Arc<Shared<R, E>>,
	writer: W,
	buffer: BatchBuffer<R, E>,
}

impl<W, R, E> FlushEngine<W, R, E>
where
	W: BatchWriter<R, Error = E>,
	R: Send + 'static,
	E: Send + Sync + 'static,
{
	async fn run(mut self, lifetime: CancellationToken) {
		let mut trigger = FlushTrigger::new(self.shared.config.period, lifetime);

		loop {
			match trigger.next().await {
				Trigger::Tick => {
					self.flush().await;

					// Only this task still holds the shared state.
					if Arc::strong_count(&self.shared) == 1 {
						debug!("all coalescer handles dropped");
						break;
					}
				}
				Trigger::Shutdown => {
					debug!("coalescer lifetime ended");
					break;
				}
			}
		}

		self.shared.queue.close();
		self.flush().await;
	}

	/// One flush cycle: drain, write once, fan the result out.
	#[instrument(name = "coalesce::flush", level = "debug", skip_all, fields(
		rows = tracing::field::Empty,
		write_us = tracing::field::Empty,
	))]
	async fn flush(&mut self) {
		self.shared.queue.drain_into(&mut self.buffer);
		if self.buffer.is_empty() {
			return;
		}

		let count = self.buffer.len();
		let (rows, notifiers) = self.buffer.take();
		Span::current().record("rows", count);

		let started = Instant::now();
		let result = self.writer.write_batch(rows).await.map_err(Arc::new);
		Span::current().record("write_us", started.elapsed().as_micros() as u64);

		self.shared.stats.record_flush(count, result.is_err());
		if result.is_err() {
			warn!(rows = count, "bulk write failed");
		}

		for notifier in notifiers {
			notifier.complete(result.clone());
		}
	}
}

impl<W, R, E> Drop for FlushEngine<W, R, E> {
	fn drop(&mut self) {
		// Also reached when a writer panics: parked callers must not wait forever.
		self.shared.queue.close();
		let abandoned = self.shared.queue.abandon_all();
		if abandoned > 0 {
			warn!(abandoned, "rows left parked after the final flush");
		}
		self.shared.stopped.cancel();
		debug!("coalescer stopped");
	}
}
