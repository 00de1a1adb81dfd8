// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Error types for construction and submission.

use std::sync::Arc;

/// Configuration errors returned while building a [`Coalescer`](crate::Coalescer).
///
/// The background task is never spawned when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("coalesce: batch size should be greater 0")]
	InvalidMaxBatchSize,

	#[error("coalesce: period should be greater 0")]
	InvalidPeriod,

	#[error("coalesce: no tokio runtime available to spawn the flush task")]
	NoRuntime,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a single [`Coalescer::insert`](crate::Coalescer::insert) call.
///
/// `E` is the error type of the plugged-in [`BatchWriter`](crate::BatchWriter).
#[derive(Debug, thiserror::Error)]
pub enum InsertError<E> {
	/// The wait token was cancelled before the row was accepted.
	#[error("insert cancelled before the row was accepted")]
	Cancelled,

	/// The wait deadline passed before the row was accepted.
	#[error("insert deadline exceeded before the row was accepted")]
	DeadlineExceeded,

	/// The coalescer stopped accepting rows, or its flush task went away
	/// without delivering a result.
	#[error("coalescer is closed")]
	Closed,

	/// The bulk write covering this row failed. Every member of the batch
	/// holds the same error.
	#[error("batch write failed: {0}")]
	Batch(Arc<E>),
}

impl<E> InsertError<E> {
	/// The writer's error, if the batch write failed.
	pub fn batch_error(&self) -> Option<&E> {
		match self {
			InsertError::Batch(err) => Some(err),
			_ => None,
		}
	}

	/// True when the caller's wait ended before the row was handed off; the
	/// row was never written.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, InsertError::Cancelled | InsertError::DeadlineExceeded)
	}
}

impl<E> Clone for InsertError<E> {
	fn clone(&self) -> Self {
		match self {
			InsertError::Cancelled => InsertError::Cancelled,
			InsertError::DeadlineExceeded => InsertError::DeadlineExceeded,
			InsertError::Closed => InsertError::Closed,
			InsertError::Batch(err) => InsertError::Batch(Arc::clone(err)),
		}
	}
}
