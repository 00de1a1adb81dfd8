// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The downstream bulk-write seam.

use std::{future::Future, marker::PhantomData, sync::Arc};

use parking_lot::Mutex;
use tokio::task;

/// Writes one batch of rows to the underlying store.
///
/// The result covers the whole batch: every caller whose row was part of it
/// receives the same outcome, even if the store applied the batch only
/// partially.
pub trait BatchWriter<R>: Send + 'static {
	type Error: Send + Sync + 'static;

	/// Called with a non-empty batch, at most once per flush cycle. Ownership
	/// of the rows moves to the writer.
	fn write_batch(&mut self, rows: Vec<R>) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Adapts an async closure into a [`BatchWriter`].
///
/// ```ignore
/// let writer = writer_fn(|rows: Vec<Row>| async move {
///     client.copy_in(rows).await
/// });
/// ```
pub fn writer_fn<R, F, Fut, E>(f: F) -> FnWriter<F, R>
where
	F: FnMut(Vec<R>) -> Fut + Send + 'static,
	Fut: Future<Output = Result<(), E>> + Send,
	E: Send + Sync + 'static,
{
	FnWriter {
		f,
		_row: PhantomData,
	}
}

pub struct FnWriter<F, R> {
	f: F,
	_row: PhantomData<fn(R)>,
}

impl<R, F, Fut, E> BatchWriter<R> for FnWriter<F, R>
where
	R: 'static,
	F: FnMut(Vec<R>) -> Fut + Send + 'static,
	Fut: Future<Output = Result<(), E>> + Send,
	E: Send + Sync + 'static,
{
	type Error = E;

	fn write_batch(&mut self, rows: Vec<R>) -> impl Future<Output = Result<(), E>> + Send {
		(self.f)(rows)
	}
}

/// Adapts a synchronous closure into a [`BatchWriter`].
///
/// The closure runs on tokio's blocking pool, so drivers that block the
/// calling thread do not stall the runtime.
pub fn blocking_fn<R, F, E>(f: F) -> BlockingWriter<F, R>
where
	F: FnMut(Vec<R>) -> Result<(), E> + Send + 'static,
	E: Send + Sync + 'static,
{
	BlockingWriter {
		f: Arc::new(Mutex::new(f)),
		_row: PhantomData,
	}
}

pub struct BlockingWriter<F, R> {
	f: Arc<Mutex<F>>,
	_row: PhantomData<fn(R)>,
}

/// Failure of a [`BlockingWriter`]: either the closure's own error or a
/// panic inside it.
#[derive(Debug, thiserror::Error)]
pub enum BlockingError<E> {
	#[error("{0}")]
	Write(E),

	#[error("blocking writer panicked: {0}")]
	Panicked(String),
}

impl<R, F, E> BatchWriter<R> for BlockingWriter<F, R>
where
	R: Send + 'static,
	F: FnMut(Vec<R>) -> Result<(), E> + Send + 'static,
	E: Send + Sync + 'static,
{
	type Error = BlockingError<E>;

	fn write_batch(&mut self, rows: Vec<R>) -> impl Future<Output = Result<(), Self::Error>> + Send {
		let f = Arc::clone(&self.f);
		async move {
			let written = task::spawn_blocking(move || {
				let mut write = f.lock();
				(*write)(rows)
			});
			match written.await {
				Ok(result) => result.map_err(BlockingError::Write),
				Err(err) => Err(BlockingError::Panicked(err.to_string())),
			}
		}
	}
}
