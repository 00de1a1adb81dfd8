// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Write coalescing for bulk-oriented stores.
//!
//! Many tasks call [`Coalescer::insert`] with a single row each. A background
//! flush task wakes once per period, takes whatever rows are parked (up to the
//! configured batch size), passes them to one [`BatchWriter::write_batch`]
//! call and hands that call's result back to every caller of the batch.
//!
//! ```text
//! insert(row 1) ──┐
//! insert(row 2) ──┼──> hand-off queue ──tick──> batch buffer ──> write_batch ──> notify all
//! insert(row 3) ──┘
//! ```
//!
//! Flushing is purely time driven. The batch size bounds how many rows one
//! cycle absorbs; rows beyond it wait for the next tick.

mod buffer;
mod config;
mod engine;
mod error;
mod notify;
mod queue;
mod stats;
mod trigger;
mod value;
mod writer;

pub use config::CoalescerConfig;
pub use engine::Coalescer;
pub use error::{Error, InsertError, Result};
pub use stats::CoalescerStats;
pub use tokio_util::sync::CancellationToken;
pub use value::{Row, Value};
pub use writer::{BatchWriter, BlockingError, BlockingWriter, FnWriter, blocking_fn, writer_fn};
