// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt,
	fmt::{Display, Formatter},
	time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single field of a [`Row`].
///
/// The coalescer never looks inside a row; this type only exists so that
/// concrete writers have a common heterogeneous shape to serialize from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Undefined,
	Boolean(bool),
	Int8(i64),
	Float8(f64),
	Utf8(String),
	Blob(Vec<u8>),
	Uuid(Uuid),
	/// Microseconds since the unix epoch, UTC.
	DateTime(i64),
}

/// Ordered, heterogeneous sequence of values handed to a writer unchanged.
pub type Row = Vec<Value>;

impl Value {
	/// Current wall clock time, truncated to microseconds.
	pub fn now() -> Self {
		let micros = match SystemTime::now().duration_since(UNIX_EPOCH) {
			Ok(elapsed) => elapsed.as_micros() as i64,
			Err(before) => -(before.duration().as_micros() as i64),
		};
		Value::DateTime(micros)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Boolean(v) => Display::fmt(v, f),
			Value::Int8(v) => Display::fmt(v, f),
			Value::Float8(v) => Display::fmt(v, f),
			Value::Utf8(v) => Display::fmt(v, f),
			Value::Blob(v) => {
				f.write_str("0x")?;
				for byte in v {
					write!(f, "{:02x}", byte)?;
				}
				Ok(())
			}
			Value::Uuid(v) => Display::fmt(v, f),
			Value::DateTime(v) => write!(f, "{}us", v),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Boolean(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int8(v as i64)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int8(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float8(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Utf8(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Utf8(v)
	}
}

impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value::Blob(v)
	}
}

impl From<Uuid> for Value {
	fn from(v: Uuid) -> Self {
		Value::Uuid(v)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		match v {
			Some(v) => v.into(),
			None => Value::Undefined,
		}
	}
}

/// Builds a [`Row`] from a list of values convertible into [`Value`].
#[macro_export]
macro_rules! row {
	() => { $crate::Row::new() };
	($($value:expr),+ $(,)?) => {
		vec![$($crate::Value::from($value)),+]
	};
}
