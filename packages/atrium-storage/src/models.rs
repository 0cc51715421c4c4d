use serde::Serialize;

#[derive(Debug, sqlx::FromRow)]
pub struct TelemetryRow {
	pub id: String,
	pub tenant_id: String,
	pub session_id: Option<String>,
	pub agent_id: Option<String>,
	pub model_used: Option<String>,
	pub tool_choice: Option<String>,
	pub metric_type: String,
	pub metric_name: String,
	pub timestamp: i64,
	pub input_tokens: Option<i64>,
	pub output_tokens: Option<i64>,
	pub cache_creation_input_tokens: i64,
	pub cache_read_input_tokens: i64,
	pub computed_cost_usd: f64,
	pub role_name: Option<String>,
	pub metadata_json: String,
}

/// Values bound by a single telemetry insert.
#[derive(Debug)]
pub struct NewTelemetry<'a> {
	pub id: &'a str,
	pub tenant_id: &'a str,
	pub session_id: &'a str,
	pub agent_id: &'a str,
	pub agent_email: &'a str,
	pub provider: &'a str,
	pub model_used: &'a str,
	pub tool_choice: Option<&'a str>,
	pub timestamp: i64,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cache_creation_input_tokens: i64,
	pub cache_read_input_tokens: i64,
	pub input_rate: f64,
	pub output_rate: f64,
	pub cache_write_rate: f64,
	pub cache_read_rate: f64,
	pub computed_cost_usd: f64,
	pub role_name: Option<&'a str>,
	pub created_by: &'a str,
	pub metadata_json: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TelemetryStats {
	pub total_calls: i64,
	pub total_input_tokens: Option<i64>,
	pub total_output_tokens: Option<i64>,
	pub total_cache_write_tokens: Option<i64>,
	pub total_cache_read_tokens: Option<i64>,
	pub total_cost_usd: Option<f64>,
	pub avg_cost_per_call: Option<f64>,
	pub first_call_timestamp: Option<i64>,
	pub last_call_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct HumanContextNote {
	pub id: i64,
	pub topic: Option<String>,
	pub note: String,
	pub author: Option<String>,
	pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct InventoryEntry {
	pub bucket_name: String,
	pub object_key: String,
	pub size_bytes: i64,
	pub last_modified_iso: Option<String>,
}
