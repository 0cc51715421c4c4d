//! LLM invocation telemetry: cost computation, recording, and querying.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use atrium_config::Telemetry;
use atrium_storage::{
	db::Db,
	models::{NewTelemetry, TelemetryRow, TelemetryStats},
};

use crate::{
	Envelope, Error, Result,
	metadata::{BillingMetadata, TelemetryMetadata},
};

pub const ID_PREFIX: &str = "tel_";
pub const DEFAULT_QUERY_LIMIT: i64 = 100;
pub const MAX_QUERY_LIMIT: i64 = 1_000;

const TOKENS_PER_RATE_UNIT: f64 = 1_000_000.0;
const METRIC_TYPE: &str = "cost";
const METRIC_NAME: &str = "llm_call";
const METRIC_UNIT: &str = "call";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordTelemetryRequest {
	pub session_id: String,
	pub agent_id: String,
	pub model_used: String,
	pub tool_choice: Option<String>,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub cache_creation_input_tokens: Option<i64>,
	pub cache_read_input_tokens: Option<i64>,
	/// Currency per million input tokens.
	pub input_rate: f64,
	pub output_rate: f64,
	pub cache_write_rate: Option<f64>,
	pub cache_read_rate: Option<f64>,
	pub role_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedTelemetry {
	pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryQuery {
	pub tenant_id: Option<String>,
	pub session_id: Option<String>,
	pub agent_id: Option<String>,
	pub start_timestamp: Option<i64>,
	pub end_timestamp: Option<i64>,
	pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryStatsQuery {
	pub session_id: Option<String>,
	pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
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
	pub metadata: TelemetryMetadata,
}
impl From<TelemetryRow> for TelemetryRecord {
	fn from(row: TelemetryRow) -> Self {
		Self {
			metadata: TelemetryMetadata::parse(&row.metadata_json),
			id: row.id,
			tenant_id: row.tenant_id,
			session_id: row.session_id,
			agent_id: row.agent_id,
			model_used: row.model_used,
			tool_choice: row.tool_choice,
			metric_type: row.metric_type,
			metric_name: row.metric_name,
			timestamp: row.timestamp,
			input_tokens: row.input_tokens,
			output_tokens: row.output_tokens,
			cache_creation_input_tokens: row.cache_creation_input_tokens,
			cache_read_input_tokens: row.cache_read_input_tokens,
			computed_cost_usd: row.computed_cost_usd,
			role_name: row.role_name,
		}
	}
}

/// Cost of one call: each token count scaled per million and weighted by its rate. Absent cache
/// counts or rates contribute nothing.
pub fn compute_cost(req: &RecordTelemetryRequest) -> f64 {
	let pairs = [
		(req.input_tokens, req.input_rate),
		(req.output_tokens, req.output_rate),
		(req.cache_creation_input_tokens.unwrap_or(0), req.cache_write_rate.unwrap_or(0.0)),
		(req.cache_read_input_tokens.unwrap_or(0), req.cache_read_rate.unwrap_or(0.0)),
	];

	pairs.iter().map(|(tokens, rate)| (*tokens as f64 / TOKENS_PER_RATE_UNIT) * rate).sum()
}

/// `tel_` followed by 8 random bytes as lowercase hex.
pub fn generate_id() -> String {
	let bytes: [u8; 8] = rand::random();

	format!("{ID_PREFIX}{}", hex::encode(bytes))
}

pub async fn record(
	db: &Db,
	cfg: &Telemetry,
	req: &RecordTelemetryRequest,
) -> Envelope<Option<RecordedTelemetry>> {
	Envelope::capture("Telemetry logging failed.", insert_record(db, cfg, req).await.map(Some))
}

pub async fn query(
	db: &Db,
	cfg: &Telemetry,
	req: &TelemetryQuery,
) -> Envelope<Vec<TelemetryRecord>> {
	Envelope::capture("Telemetry query failed.", fetch_records(db, cfg, req).await)
}

pub async fn stats(
	db: &Db,
	cfg: &Telemetry,
	req: &TelemetryStatsQuery,
) -> Envelope<Option<TelemetryStats>> {
	Envelope::capture("Telemetry stats query failed.", fetch_stats(db, cfg, req).await.map(Some))
}

async fn insert_record(
	db: &Db,
	cfg: &Telemetry,
	req: &RecordTelemetryRequest,
) -> Result<RecordedTelemetry> {
	validate_record(req)?;

	let id = generate_id();
	let metadata = TelemetryMetadata::Billing(BillingMetadata {
		billing_email: cfg.billing_email.clone(),
		operator: cfg.operator.clone(),
		repo_base_url: cfg.repo_base_url.clone(),
	});
	let metadata_json = serde_json::to_string(&metadata)?;
	let row = NewTelemetry {
		id: &id,
		tenant_id: &cfg.tenant_id,
		session_id: &req.session_id,
		agent_id: &req.agent_id,
		agent_email: &cfg.agent_email,
		provider: &cfg.provider,
		model_used: &req.model_used,
		tool_choice: req.tool_choice.as_deref(),
		timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
		input_tokens: req.input_tokens,
		output_tokens: req.output_tokens,
		cache_creation_input_tokens: req.cache_creation_input_tokens.unwrap_or(0),
		cache_read_input_tokens: req.cache_read_input_tokens.unwrap_or(0),
		input_rate: req.input_rate,
		output_rate: req.output_rate,
		cache_write_rate: req.cache_write_rate.unwrap_or(0.0),
		cache_read_rate: req.cache_read_rate.unwrap_or(0.0),
		computed_cost_usd: compute_cost(req),
		role_name: req.role_name.as_deref(),
		created_by: &cfg.operator,
		metadata_json: &metadata_json,
	};

	sqlx::query(
		"\
INSERT INTO agent_telemetry (
	id, tenant_id, session_id, agent_id, agent_email,
	provider, model_used, tool_choice,
	metric_type, metric_name, metric_value, unit, timestamp,
	input_tokens, output_tokens,
	cache_creation_input_tokens, cache_read_input_tokens,
	input_rate_per_mtok, output_rate_per_mtok, cache_write_rate_per_mtok, cache_read_rate_per_mtok,
	computed_cost_usd,
	role_name, created_by, metadata_json
)
VALUES (
	?1, ?2, ?3, ?4, ?5,
	?6, ?7, ?8,
	?9, ?10, ?11, ?12, ?13,
	?14, ?15,
	?16, ?17,
	?18, ?19, ?20, ?21,
	?22,
	?23, ?24, ?25
)",
	)
	.bind(row.id)
	.bind(row.tenant_id)
	.bind(row.session_id)
	.bind(row.agent_id)
	.bind(row.agent_email)
	.bind(row.provider)
	.bind(row.model_used)
	.bind(row.tool_choice)
	.bind(METRIC_TYPE)
	.bind(METRIC_NAME)
	.bind(1.0_f64)
	.bind(METRIC_UNIT)
	.bind(row.timestamp)
	.bind(row.input_tokens)
	.bind(row.output_tokens)
	.bind(row.cache_creation_input_tokens)
	.bind(row.cache_read_input_tokens)
	.bind(row.input_rate)
	.bind(row.output_rate)
	.bind(row.cache_write_rate)
	.bind(row.cache_read_rate)
	.bind(row.computed_cost_usd)
	.bind(row.role_name)
	.bind(row.created_by)
	.bind(row.metadata_json)
	.execute(&db.pool)
	.await?;

	tracing::debug!(id = %id, session_id = %req.session_id, "Recorded telemetry.");

	Ok(RecordedTelemetry { id })
}

fn validate_record(req: &RecordTelemetryRequest) -> Result<()> {
	for (label, value) in [
		("session_id", &req.session_id),
		("agent_id", &req.agent_id),
		("model_used", &req.model_used),
	] {
		if value.trim().is_empty() {
			return Err(Error::InvalidRequest { message: format!("{label} must be non-empty.") });
		}
	}

	let counts = [
		("input_tokens", Some(req.input_tokens)),
		("output_tokens", Some(req.output_tokens)),
		("cache_creation_input_tokens", req.cache_creation_input_tokens),
		("cache_read_input_tokens", req.cache_read_input_tokens),
	];

	for (label, count) in counts {
		if count.is_some_and(|count| count < 0) {
			return Err(Error::InvalidRequest {
				message: format!("{label} must be zero or greater."),
			});
		}
	}

	let rates = [
		("input_rate", Some(req.input_rate)),
		("output_rate", Some(req.output_rate)),
		("cache_write_rate", req.cache_write_rate),
		("cache_read_rate", req.cache_read_rate),
	];

	for (label, rate) in rates {
		if rate.is_some_and(|rate| !rate.is_finite() || rate < 0.0) {
			return Err(Error::InvalidRequest {
				message: format!("{label} must be a finite number, zero or greater."),
			});
		}
	}

	Ok(())
}

async fn fetch_records(
	db: &Db,
	cfg: &Telemetry,
	req: &TelemetryQuery,
) -> Result<Vec<TelemetryRecord>> {
	let tenant_id = non_empty(req.tenant_id.as_deref()).unwrap_or(cfg.tenant_id.as_str());
	let limit = req.limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT);
	let mut builder = QueryBuilder::<Sqlite>::new(
		"\
SELECT
	id, tenant_id, session_id, agent_id, model_used, tool_choice,
	metric_type, metric_name, timestamp,
	input_tokens, output_tokens,
	cache_creation_input_tokens, cache_read_input_tokens,
	computed_cost_usd, role_name, metadata_json
FROM agent_telemetry
WHERE tenant_id = ",
	);

	builder.push_bind(tenant_id);

	if let Some(session_id) = non_empty(req.session_id.as_deref()) {
		builder.push(" AND session_id = ");
		builder.push_bind(session_id);
	}
	if let Some(agent_id) = non_empty(req.agent_id.as_deref()) {
		builder.push(" AND agent_id = ");
		builder.push_bind(agent_id);
	}
	if let Some(start) = req.start_timestamp {
		builder.push(" AND timestamp >= ");
		builder.push_bind(start);
	}
	if let Some(end) = req.end_timestamp {
		builder.push(" AND timestamp <= ");
		builder.push_bind(end);
	}

	builder.push(" ORDER BY timestamp DESC LIMIT ");
	builder.push_bind(limit);

	let rows: Vec<TelemetryRow> = builder.build_query_as().fetch_all(&db.pool).await?;

	Ok(rows.into_iter().map(TelemetryRecord::from).collect())
}

async fn fetch_stats(
	db: &Db,
	cfg: &Telemetry,
	req: &TelemetryStatsQuery,
) -> Result<TelemetryStats> {
	let mut builder = QueryBuilder::<Sqlite>::new(
		"\
SELECT
	COUNT(*) AS total_calls,
	SUM(input_tokens) AS total_input_tokens,
	SUM(output_tokens) AS total_output_tokens,
	SUM(cache_creation_input_tokens) AS total_cache_write_tokens,
	SUM(cache_read_input_tokens) AS total_cache_read_tokens,
	SUM(computed_cost_usd) AS total_cost_usd,
	AVG(computed_cost_usd) AS avg_cost_per_call,
	MIN(timestamp) AS first_call_timestamp,
	MAX(timestamp) AS last_call_timestamp
FROM agent_telemetry
WHERE tenant_id = ",
	);

	builder.push_bind(cfg.tenant_id.as_str());

	if let Some(session_id) = non_empty(req.session_id.as_deref()) {
		builder.push(" AND session_id = ");
		builder.push_bind(session_id);
	}
	if let Some(agent_id) = non_empty(req.agent_id.as_deref()) {
		builder.push(" AND agent_id = ");
		builder.push_bind(agent_id);
	}

	Ok(builder.build_query_as().fetch_one(&db.pool).await?)
}

/// Query-string filters such as `?session_id=` arrive as empty strings and mean "no filter".
fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|value| !value.is_empty())
}
