//! Read-only aggregation queries over tables owned by the build, workflow, and worker systems.
//!
//! Every function returns an [`Envelope`]; failures are logged and carry an empty data shape.

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;

use atrium_storage::{
	db::Db,
	rows::{self, JsonRow},
};

use crate::{Envelope, Error, Result};

pub const PIPELINE_LIMIT: i64 = 50;
pub const WORKFLOW_LIMIT: i64 = 50;
pub const DEFAULT_RUN_LIMIT: i64 = 50;
pub const DEFAULT_WORKER_LIMIT: i64 = 50;
pub const DEFAULT_TABLE_LIMIT: i64 = 100;

const PIPELINES_SQL: &str = "\
SELECT
	id,
	project_id AS name,
	branch,
	status,
	deployment_url,
	build_number,
	build_time_ms AS last_run_duration_ms,
	commit_message,
	commit_author AS created_by,
	started_at AS last_run_at,
	completed_at,
	environment,
	triggered_by,
	build_log
FROM builds
ORDER BY started_at DESC NULLS LAST, created_at DESC
LIMIT ?";
const PIPELINE_RUNS_FOR_PIPELINE_SQL: &str = "\
SELECT
	id,
	pipeline_id,
	run_number,
	status,
	trigger_type,
	commit_sha,
	commit_message,
	started_at,
	completed_at,
	duration_ms,
	triggered_by,
	error_message
FROM pipeline_runs
WHERE pipeline_id = ?
ORDER BY started_at DESC
LIMIT ?";
const PIPELINE_RUNS_SQL: &str = "\
SELECT
	r.id,
	r.pipeline_id,
	p.name AS pipeline_name,
	r.run_number,
	r.status,
	r.trigger_type,
	r.commit_sha,
	r.commit_message,
	r.started_at,
	r.completed_at,
	r.duration_ms,
	r.triggered_by,
	r.error_message
FROM pipeline_runs r
LEFT JOIN pipelines p ON r.pipeline_id = p.id
ORDER BY r.started_at DESC
LIMIT ?";
const WORKFLOWS_SQL: &str = "\
SELECT
	id,
	name,
	description,
	workflow_type,
	is_active AS status,
	trigger_type,
	success_count,
	failure_count,
	last_run_at,
	created_at,
	steps
FROM workflows
ORDER BY last_run_at DESC NULLS LAST, created_at DESC
LIMIT ?";
const EXECUTIONS_FOR_WORKFLOW_SQL: &str = "\
SELECT
	id,
	workflow_id,
	execution_number,
	status,
	input_data,
	output_data,
	model_used,
	tokens_used,
	cost_usd,
	started_at,
	completed_at,
	duration_ms,
	triggered_by,
	error_message
FROM ai_workflow_executions
WHERE workflow_id = ?
ORDER BY started_at DESC
LIMIT ?";
const EXECUTIONS_SQL: &str = "\
SELECT
	e.id,
	e.workflow_id,
	w.name AS workflow_name,
	e.execution_number,
	e.status,
	e.model_used,
	e.tokens_used,
	e.cost_usd,
	e.started_at,
	e.completed_at,
	e.duration_ms,
	e.triggered_by,
	e.error_message
FROM ai_workflow_executions e
LEFT JOIN ai_workflows w ON e.workflow_id = w.id
ORDER BY e.started_at DESC
LIMIT ?";
const BUILD_STATS_SQL: &str = "\
SELECT
	COUNT(*) AS total_builds,
	SUM(CASE WHEN status IN ('completed', 'success', 'active') THEN 1 ELSE 0 END) AS successful_builds,
	SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) AS failed_builds
FROM builds";
const WORKER_STATS_SQL: &str = "\
SELECT
	COUNT(*) AS total_workers,
	SUM(CASE WHEN deployment_status = 'active' THEN 1 ELSE 0 END) AS active_workers,
	SUM(CASE WHEN deployment_status = 'failed' THEN 1 ELSE 0 END) AS failed_workers,
	SUM(requests_30d) AS total_requests_30d
FROM worker_registry
WHERE entity_status = 'active'";
const WORKFLOW_STATS_SQL: &str = "\
SELECT
	COUNT(*) AS total_workflows,
	SUM(success_count) AS total_successes,
	SUM(failure_count) AS total_failures,
	SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END) AS active_workflows
FROM workflows";
const COST_STATS_SQL: &str = "\
SELECT
	SUM(computed_cost_usd) AS total_cost_today,
	COUNT(*) AS total_calls_today
FROM agent_telemetry
WHERE DATE(timestamp, 'unixepoch') = DATE('now')";
const WORKERS_SQL: &str = "\
SELECT
	id,
	worker_name,
	deployment_status AS status,
	routes,
	bindings_count,
	last_deployment,
	days_since_deploy,
	deployment_status,
	git_repo,
	last_commit_message,
	priority,
	requests_30d,
	notes,
	updated_at,
	entity_status
FROM worker_registry
WHERE entity_status = 'active'
ORDER BY priority DESC, updated_at DESC
LIMIT ?";
const TABLES_SQL: &str = "\
SELECT name, sql
FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name";

/// Latest builds, newest start first with never-started builds last.
pub async fn pipelines(db: &Db) -> Envelope<Vec<JsonRow>> {
	let result = fetch_rows(db, sqlx::query(PIPELINES_SQL).bind(PIPELINE_LIMIT)).await;

	Envelope::capture("Failed to fetch pipelines.", result)
}

pub async fn pipeline_runs(
	db: &Db,
	pipeline_id: Option<&str>,
	limit: Option<i64>,
) -> Envelope<Vec<JsonRow>> {
	let limit = limit.unwrap_or(DEFAULT_RUN_LIMIT);
	let query = match pipeline_id {
		Some(pipeline_id) =>
			sqlx::query(PIPELINE_RUNS_FOR_PIPELINE_SQL).bind(pipeline_id.to_string()).bind(limit),
		None => sqlx::query(PIPELINE_RUNS_SQL).bind(limit),
	};

	Envelope::capture("Failed to fetch pipeline runs.", fetch_rows(db, query).await)
}

pub async fn ai_workflows(db: &Db) -> Envelope<Vec<JsonRow>> {
	let result = fetch_rows(db, sqlx::query(WORKFLOWS_SQL).bind(WORKFLOW_LIMIT)).await;

	Envelope::capture("Failed to fetch AI workflows.", result)
}

pub async fn ai_workflow_executions(
	db: &Db,
	workflow_id: Option<&str>,
	limit: Option<i64>,
) -> Envelope<Vec<JsonRow>> {
	let limit = limit.unwrap_or(DEFAULT_RUN_LIMIT);
	let query = match workflow_id {
		Some(workflow_id) =>
			sqlx::query(EXECUTIONS_FOR_WORKFLOW_SQL).bind(workflow_id.to_string()).bind(limit),
		None => sqlx::query(EXECUTIONS_SQL).bind(limit),
	};

	Envelope::capture("Failed to fetch workflow executions.", fetch_rows(db, query).await)
}

/// Build, worker, workflow, and same-day cost aggregates keyed `builds`, `workers`, `workflows`,
/// and `costs`.
pub async fn dashboard_stats(db: &Db) -> Envelope<JsonRow> {
	Envelope::capture("Failed to fetch dashboard stats.", fetch_stats(db).await)
}

pub async fn worker_deployments(db: &Db, limit: Option<i64>) -> Envelope<Vec<JsonRow>> {
	let limit = limit.unwrap_or(DEFAULT_WORKER_LIMIT);
	let result = fetch_rows(db, sqlx::query(WORKERS_SQL).bind(limit)).await;

	Envelope::capture("Failed to fetch worker deployments.", result)
}

pub async fn database_tables(db: &Db) -> Envelope<Vec<JsonRow>> {
	let result = fetch_rows(db, sqlx::query(TABLES_SQL)).await;

	Envelope::capture("Failed to fetch database tables.", result)
}

/// Browses any table by name. The name is reduced to `[A-Za-z0-9_]` before it is interpolated.
pub async fn query_table(db: &Db, table_name: &str, limit: Option<i64>) -> Envelope<Vec<JsonRow>> {
	let sanitized = sanitize_identifier(table_name);

	match fetch_table(db, &sanitized, limit.unwrap_or(DEFAULT_TABLE_LIMIT)).await {
		Ok(rows) => Envelope::ok(rows).with_table_name(sanitized),
		Err(err) => {
			tracing::error!(error = %err, table = %table_name, "Failed to query table.");

			Envelope::failed(err.to_string()).with_table_name(table_name)
		},
	}
}

pub fn sanitize_identifier(raw: &str) -> String {
	raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}

async fn fetch_rows<'q>(
	db: &Db,
	query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
) -> Result<Vec<JsonRow>> {
	let rows: Vec<SqliteRow> = query.fetch_all(&db.pool).await?;

	Ok(rows::rows_to_json(&rows)?)
}

async fn fetch_first(db: &Db, sql: &str) -> Result<Value> {
	let row = sqlx::query(sql).fetch_optional(&db.pool).await?;
	let object = match row {
		Some(row) => rows::row_to_json(&row)?,
		None => Map::new(),
	};

	Ok(Value::Object(object))
}

async fn fetch_stats(db: &Db) -> Result<JsonRow> {
	let mut out = Map::new();

	out.insert("builds".to_string(), fetch_first(db, BUILD_STATS_SQL).await?);
	out.insert("workers".to_string(), fetch_first(db, WORKER_STATS_SQL).await?);
	out.insert("workflows".to_string(), fetch_first(db, WORKFLOW_STATS_SQL).await?);
	out.insert("costs".to_string(), fetch_first(db, COST_STATS_SQL).await?);

	Ok(out)
}

async fn fetch_table(db: &Db, table: &str, limit: i64) -> Result<Vec<JsonRow>> {
	if table.is_empty() {
		return Err(Error::InvalidRequest { message: "table name is empty.".to_string() });
	}

	let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
		.bind(table)
		.fetch_all(&db.pool)
		.await?;
	let order_by = ["created_at", "timestamp"]
		.into_iter()
		.find(|candidate| columns.iter().any(|column| column == candidate))
		.map(|column| format!(" ORDER BY {column} DESC"))
		.unwrap_or_default();
	let sql = format!("SELECT * FROM {table}{order_by} LIMIT ?");

	fetch_rows(db, sqlx::query(&sql).bind(limit)).await
}
