//! Conversion of rows from tables Atrium does not own into JSON objects.
//!
//! Externally-owned tables drift independently of this crate, so their rows are decoded by the
//! runtime storage class of each value instead of a fixed struct.

use serde_json::{Map, Value};
use sqlx::{Column, Row, TypeInfo, ValueRef, sqlite::SqliteRow};

use crate::Result;

pub type JsonRow = Map<String, Value>;

pub fn row_to_json(row: &SqliteRow) -> Result<JsonRow> {
	let mut out = Map::with_capacity(row.columns().len());

	for column in row.columns() {
		let idx = column.ordinal();

		out.insert(column.name().to_string(), column_to_json(row, idx)?);
	}

	Ok(out)
}

pub fn rows_to_json(rows: &[SqliteRow]) -> Result<Vec<JsonRow>> {
	rows.iter().map(row_to_json).collect()
}

fn column_to_json(row: &SqliteRow, idx: usize) -> Result<Value> {
	let raw = row.try_get_raw(idx)?;

	if raw.is_null() {
		return Ok(Value::Null);
	}

	let storage_class = raw.type_info().name().to_ascii_uppercase();
	let value = match storage_class.as_str() {
		"INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
		"REAL" | "NUMERIC" => Value::from(row.try_get::<f64, _>(idx)?),
		"BLOB" => Value::String(hex::encode(row.try_get::<Vec<u8>, _>(idx)?)),
		_ => Value::String(row.try_get::<String, _>(idx)?),
	};

	Ok(value)
}
