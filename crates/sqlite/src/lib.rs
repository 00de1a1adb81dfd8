// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! SQLite bulk writer for [`coalesce`].
//!
//! Every flushed batch becomes one transaction of prepared `INSERT`s against a
//! single table.

mod error;
mod table;
mod writer;

pub use error::{Result, SqliteError};
pub use table::Table;
pub use writer::SqliteWriter;
