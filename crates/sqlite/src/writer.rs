// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{path::Path, sync::Arc};

use coalesce::{BatchWriter, Row, Value};
use parking_lot::Mutex;
use rusqlite::{
	Connection, params_from_iter,
	types::{ToSql, ToSqlOutput, ValueRef},
};
use tokio::task;
use tracing::{debug, instrument};

use crate::{
	Table,
	error::{Result, SqliteError},
};

/// Bulk writer that appends every batch to one SQLite table.
///
/// A batch is a single transaction: either all of its rows land or none do.
/// Statements run on tokio's blocking pool, the connection is shared behind a
/// mutex so the same database can be read from while the coalescer is live.
pub struct SqliteWriter {
	conn: Arc<Mutex<Connection>>,
	table: Arc<Table>,
	insert_sql: Arc<str>,
}

impl SqliteWriter {
	pub fn new(conn: Connection, table: Table) -> Result<Self> {
		Self::shared(Arc::new(Mutex::new(conn)), table)
	}

	/// Writer over a connection that other parts of the program keep using.
	pub fn shared(conn: Arc<Mutex<Connection>>, table: Table) -> Result<Self> {
		let insert_sql = table.insert_sql()?;
		Ok(Self {
			conn,
			table: Arc::new(table),
			insert_sql: insert_sql.into(),
		})
	}

	pub fn open(path: impl AsRef<Path>, table: Table) -> Result<Self> {
		let conn = Connection::open(path)?;
		conn.pragma_update(None, "journal_mode", "WAL")?;
		conn.pragma_update(None, "synchronous", "NORMAL")?;
		Self::new(conn, table)
	}

	pub fn open_in_memory(table: Table) -> Result<Self> {
		Self::new(Connection::open_in_memory()?, table)
	}

	pub fn connection(&self) -> Arc<Mutex<Connection>> {
		self.conn.clone()
	}

	/// Creates the target table if it does not exist yet.
	#[instrument(name = "coalesce::sqlite::ensure_table", level = "trace", skip(self), fields(table = %self.table.name()))]
	pub fn ensure_table(&self) -> Result<()> {
		let sql = self.table.create_sql()?;
		self.conn.lock().execute(&sql, [])?;
		Ok(())
	}
}

impl BatchWriter<Row> for SqliteWriter {
	type Error = SqliteError;

	fn write_batch(&mut self, rows: Vec<Row>) -> impl Future<Output = Result<()>> + Send {
		let conn = self.conn.clone();
		let table = self.table.clone();
		let sql = self.insert_sql.clone();
		async move {
			task::spawn_blocking(move || insert_rows(&conn, &table, &sql, rows))
				.await
				.map_err(|e| SqliteError::Join(e.to_string()))?
		}
	}
}

#[instrument(name = "coalesce::sqlite::insert_rows", level = "debug", skip_all, fields(table = %table.name(), rows = rows.len()))]
fn insert_rows(conn: &Mutex<Connection>, table: &Table, sql: &str, rows: Vec<Row>) -> Result<()> {
	let mut conn = conn.lock();
	let tx = conn.transaction()?;
	{
		let mut stmt = tx.prepare_cached(sql)?;
		for row in &rows {
			if row.len() != table.width() {
				return Err(SqliteError::ColumnCount {
					table: table.name().to_string(),
					expected: table.width(),
					actual: row.len(),
				});
			}
			stmt.execute(params_from_iter(row.iter().map(SqlValue)))?;
		}
	}
	tx.commit()?;
	debug!("committed");
	Ok(())
}

/// Storage mapping of a [`Value`]: uuids as hyphenated text, timestamps as
/// integer microseconds, booleans as 0/1.
struct SqlValue<'a>(&'a Value);

impl ToSql for SqlValue<'_> {
	fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
		Ok(match self.0 {
			Value::Undefined => ToSqlOutput::Borrowed(ValueRef::Null),
			Value::Boolean(b) => ToSqlOutput::from(*b),
			Value::Int8(i) => ToSqlOutput::from(*i),
			Value::Float8(f) => ToSqlOutput::from(*f),
			Value::Utf8(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
			Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
			Value::Uuid(id) => ToSqlOutput::from(id.hyphenated().to_string()),
			Value::DateTime(micros) => ToSqlOutput::from(*micros),
		})
	}
}
