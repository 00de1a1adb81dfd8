// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::error::{Result, SqliteError};

/// Target table of a [`SqliteWriter`](crate::SqliteWriter).
///
/// Column order is the order values appear in every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
	name: String,
	columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
	name: String,
	sql_type: String,
}

impl Table {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			columns: Vec::new(),
		}
	}

	pub fn column(mut self, name: impl Into<String>, sql_type: impl Into<String>) -> Self {
		self.columns.push(Column {
			name: name.into(),
			sql_type: sql_type.into(),
		});
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn width(&self) -> usize {
		self.columns.len()
	}

	pub(crate) fn create_sql(&self) -> Result<String> {
		self.ensure_columns()?;
		let columns = self
			.columns
			.iter()
			.map(|c| format!("{} {}", quote(&c.name), c.sql_type))
			.collect::<Vec<_>>()
			.join(", ");
		Ok(format!("CREATE TABLE IF NOT EXISTS {} ({})", quote(&self.name), columns))
	}

	pub(crate) fn insert_sql(&self) -> Result<String> {
		self.ensure_columns()?;
		let columns = self.columns.iter().map(|c| quote(&c.name)).collect::<Vec<_>>().join(", ");
		let placeholders = vec!["?"; self.columns.len()].join(", ");
		Ok(format!("INSERT INTO {} ({}) VALUES ({})", quote(&self.name), columns, placeholders))
	}

	fn ensure_columns(&self) -> Result<()> {
		if self.columns.is_empty() {
			return Err(SqliteError::NoColumns(self.name.clone()));
		}
		Ok(())
	}
}

fn quote(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}
