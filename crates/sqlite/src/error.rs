// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Errors of the SQLite bulk writer.
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
	#[error("sqlite: {0}")]
	Sqlite(#[from] rusqlite::Error),

	#[error("row has {actual} values, table {table} expects {expected}")]
	ColumnCount {
		table: String,
		expected: usize,
		actual: usize,
	},

	#[error("table {0} has no columns")]
	NoColumns(String),

	#[error("sqlite writer task failed: {0}")]
	Join(String),
}

pub type Result<T> = std::result::Result<T, SqliteError>;
