//! JSON surface for the dashboard and telemetry layers.
//!
//! Handlers always answer 200 with an envelope; `success` carries the outcome.

use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	routing::get,
};
use serde::Deserialize;

use atrium_service::{
	Envelope, RecordTelemetryRequest, RecordedTelemetry, TelemetryQuery, TelemetryRecord,
	TelemetryStatsQuery, dashboard, telemetry,
};
use atrium_storage::{models::TelemetryStats, rows::JsonRow};

use crate::state::AppState;

type Rows = Json<Envelope<Vec<JsonRow>>>;

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
	pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PipelineRunParams {
	pub pipeline_id: Option<String>,
	pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowExecutionParams {
	pub workflow_id: Option<String>,
	pub limit: Option<i64>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/dashboard/pipelines", get(pipelines))
		.route("/v1/dashboard/pipeline_runs", get(pipeline_runs))
		.route("/v1/dashboard/workflows", get(workflows))
		.route("/v1/dashboard/workflow_executions", get(workflow_executions))
		.route("/v1/dashboard/stats", get(stats))
		.route("/v1/dashboard/workers", get(workers))
		.route("/v1/dashboard/tables", get(tables))
		.route("/v1/dashboard/tables/{name}", get(table_rows))
		.route("/v1/telemetry", get(telemetry_query).post(telemetry_record))
		.route("/v1/telemetry/stats", get(telemetry_stats))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn pipelines(State(state): State<AppState>) -> Rows {
	Json(dashboard::pipelines(&state.db).await)
}

async fn pipeline_runs(
	State(state): State<AppState>,
	Query(params): Query<PipelineRunParams>,
) -> Rows {
	Json(dashboard::pipeline_runs(&state.db, params.pipeline_id.as_deref(), params.limit).await)
}

async fn workflows(State(state): State<AppState>) -> Rows {
	Json(dashboard::ai_workflows(&state.db).await)
}

async fn workflow_executions(
	State(state): State<AppState>,
	Query(params): Query<WorkflowExecutionParams>,
) -> Rows {
	Json(
		dashboard::ai_workflow_executions(&state.db, params.workflow_id.as_deref(), params.limit)
			.await,
	)
}

async fn stats(State(state): State<AppState>) -> Json<Envelope<JsonRow>> {
	Json(dashboard::dashboard_stats(&state.db).await)
}

async fn workers(State(state): State<AppState>, Query(params): Query<LimitParams>) -> Rows {
	Json(dashboard::worker_deployments(&state.db, params.limit).await)
}

async fn tables(State(state): State<AppState>) -> Rows {
	Json(dashboard::database_tables(&state.db).await)
}

async fn table_rows(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Query(params): Query<LimitParams>,
) -> Rows {
	Json(dashboard::query_table(&state.db, &name, params.limit).await)
}

async fn telemetry_record(
	State(state): State<AppState>,
	Json(payload): Json<RecordTelemetryRequest>,
) -> Json<Envelope<Option<RecordedTelemetry>>> {
	Json(telemetry::record(&state.db, &state.telemetry, &payload).await)
}

async fn telemetry_query(
	State(state): State<AppState>,
	Query(params): Query<TelemetryQuery>,
) -> Json<Envelope<Vec<TelemetryRecord>>> {
	Json(telemetry::query(&state.db, &state.telemetry, &params).await)
}

async fn telemetry_stats(
	State(state): State<AppState>,
	Query(params): Query<TelemetryStatsQuery>,
) -> Json<Envelope<Option<TelemetryStats>>> {
	Json(telemetry::stats(&state.db, &state.telemetry, &params).await)
}
