use serde::Serialize;

use crate::Result;

/// Uniform `{success, data | error}` response shape.
///
/// Failures keep `data` at its empty shape so callers can render without branching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(rename = "tableName", skip_serializing_if = "Option::is_none")]
	pub table_name: Option<String>,
	pub data: T,
}
impl<T> Envelope<T>
where
	T: Default,
{
	pub fn ok(data: T) -> Self {
		Self { success: true, error: None, table_name: None, data }
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self { success: false, error: Some(message.into()), table_name: None, data: T::default() }
	}

	/// Converts a result, logging the failure under `context`.
	pub fn capture(context: &str, result: Result<T>) -> Self {
		match result {
			Ok(data) => Self::ok(data),
			Err(err) => {
				tracing::error!(error = %err, "{context}");

				Self::failed(err.to_string())
			},
		}
	}

	pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
		self.table_name = Some(table_name.into());

		self
	}
}
