use std::{net::SocketAddr, sync::Arc};

use axum::{
	Router,
	body::Body,
	extract::State,
	http::{HeaderMap, HeaderValue, Request, StatusCode, header},
	middleware::{self, Next},
	response::IntoResponse,
	routing::get,
};
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, Content, Implementation, JsonObject, ServerCapabilities, ServerInfo},
	transport::streamable_http_server::{
		StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
	},
};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::McpAuthState;
use atrium_service::{
	AtriumService, BucketListRequest, BucketSearchRequest, BucketSummaryRequest,
	HumanContextAddRequest, HumanContextListRequest,
};

const NOT_FOUND: &str = "Not found";
const UNAUTHORIZED: &str = "Missing or invalid bearer token for /mcp.";

#[derive(Clone)]
struct AtriumMcp {
	service: Arc<AtriumService>,
	tool_router: ToolRouter<Self>,
}
impl AtriumMcp {
	fn new(service: Arc<AtriumService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}

	fn bucket_hint(&self) -> String {
		self.service.buckets.ids().collect::<Vec<_>>().join(", ")
	}
}

#[rmcp::tool_router]
impl AtriumMcp {
	#[rmcp::tool(
		name = "list_workers",
		description = "List the workers deployed on the platform.",
		input_schema = list_workers_schema()
	)]
	async fn list_workers(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let limit = take_optional_u32(&mut params, "limit")?;

		self.service.list_workers(limit).map(text_result).map_err(service_error)
	}

	#[rmcp::tool(
		name = "platform_info",
		description = "Describe the platform: domains, databases, and buckets.",
		input_schema = empty_schema()
	)]
	async fn platform_info(&self) -> Result<CallToolResult, ErrorData> {
		Ok(text_result(self.service.platform_info()))
	}

	#[rmcp::tool(
		name = "bucket_list",
		description = "List one page of objects in a bucket, optionally under a key prefix.",
		input_schema = bucket_list_schema()
	)]
	async fn bucket_list(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let bucket = take_required_string(&mut params, "bucket")?;

		if self.service.buckets.canonical_id(&bucket).is_none() {
			return Err(ErrorData::invalid_params(
				format!("bucket must be one of {}.", self.bucket_hint()),
				None,
			));
		}

		let req = BucketListRequest {
			bucket,
			prefix: take_optional_string(&mut params, "prefix")?,
			limit: take_optional_u32(&mut params, "limit")?,
		};

		self.service.bucket_list(req).await.map(text_result).map_err(service_error)
	}

	#[rmcp::tool(
		name = "bucket_search",
		description = "Search object keys by prefix and suffix. Uses the object inventory when available, otherwise lists the bucket.",
		input_schema = bucket_search_schema()
	)]
	async fn bucket_search(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let req = BucketSearchRequest {
			bucket: take_optional_string(&mut params, "bucket")?,
			prefix: take_optional_string(&mut params, "prefix")?,
			suffix: take_optional_string(&mut params, "suffix")?,
			limit: take_optional_u32(&mut params, "limit")?,
		};

		self.service.bucket_search(req).await.map(text_result).map_err(service_error)
	}

	#[rmcp::tool(
		name = "human_context_list",
		description = "List operator notes, newest first, optionally for one topic.",
		input_schema = human_context_list_schema()
	)]
	async fn human_context_list(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let req = HumanContextListRequest {
			topic: take_optional_string(&mut params, "topic")?,
			limit: take_optional_u32(&mut params, "limit")?,
		};

		self.service.human_context_list(req).await.map(text_result).map_err(service_error)
	}

	#[rmcp::tool(
		name = "human_context_add",
		description = "Add an operator note.",
		input_schema = human_context_add_schema()
	)]
	async fn human_context_add(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let req = HumanContextAddRequest {
			note: take_required_string(&mut params, "note")?,
			topic: take_optional_string(&mut params, "topic")?,
			author: take_optional_string(&mut params, "author")?,
		};

		self.service.human_context_add(req).await.map(text_result).map_err(service_error)
	}

	#[rmcp::tool(
		name = "bucket_summary",
		description = "Count objects and total bytes per bucket. Without a bucket, every configured bucket is summarized.",
		input_schema = bucket_summary_schema()
	)]
	async fn bucket_summary(
		&self,
		mut params: JsonObject,
	) -> Result<CallToolResult, ErrorData> {
		let req = BucketSummaryRequest { bucket: take_optional_string(&mut params, "bucket")? };

		self.service.bucket_summary(req).await.map(text_result).map_err(service_error)
	}
}

#[rmcp::tool_handler]
impl ServerHandler for AtriumMcp {
	fn get_info(&self) -> ServerInfo {
		let mcp = &self.service.cfg.mcp;

		ServerInfo {
			server_info: Implementation {
				name: mcp.name.clone(),
				version: mcp.version.clone(),
				..Implementation::from_build_env()
			},
			instructions: Some(mcp.instructions.clone()),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

/// `/mcp` behind the auth layer, a plain-text greeting at `/`, and 404 everywhere else.
/// The auth layer is attached before `/` is added so the greeting stays public.
pub fn router(service: Arc<AtriumService>, auth_state: McpAuthState) -> Router {
	let greeting = service.cfg.mcp.greeting.clone();
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let mcp_service = StreamableHttpService::new(
		move || Ok(AtriumMcp::new(service.clone())),
		session_manager,
		StreamableHttpServerConfig::default(),
	);

	// Only the exact `/mcp` path reaches the transport; `/mcp/...` falls through to 404.
	Router::new()
		.route_service("/mcp", mcp_service)
		.route_layer(middleware::from_fn_with_state(auth_state, mcp_auth_middleware))
		.route("/", get(move || async move { greeting }))
		.fallback(not_found)
}

pub async fn serve_mcp(
	bind_addr: &str,
	service: Arc<AtriumService>,
	auth_state: McpAuthState,
) -> Result<()> {
	let bind_addr: SocketAddr = bind_addr.parse()?;
	let app = router(service, auth_state);
	let listener = TcpListener::bind(bind_addr).await?;

	tracing::info!(%bind_addr, "MCP server listening.");

	axum::serve(listener, app).await?;

	Ok(())
}

fn text_result(text: String) -> CallToolResult {
	CallToolResult::success(vec![Content::text(text)])
}

fn service_error(err: atrium_service::Error) -> ErrorData {
	match err {
		atrium_service::Error::InvalidRequest { message } =>
			ErrorData::invalid_params(message, None),
		other => ErrorData::internal_error(other.to_string(), None),
	}
}

impl McpAuthState {
	fn admits(&self, headers: &HeaderMap) -> bool {
		match self {
			Self::Off => true,
			Self::StaticToken { bearer_token } =>
				presented_token(headers) == Some(bearer_token.as_str()),
		}
	}
}

/// Token from `Authorization: Bearer <token>`. The scheme is matched case-insensitively.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.trim().split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn take_required_string(params: &mut JsonObject, key: &str) -> Result<String, ErrorData> {
	match params.remove(key) {
		Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
		Some(Value::String(_)) =>
			Err(ErrorData::invalid_params(format!("{key} must be non-empty."), None)),
		None | Some(Value::Null) =>
			Err(ErrorData::invalid_params(format!("{key} is required."), None)),
		Some(_) => Err(ErrorData::invalid_params(format!("{key} must be a string."), None)),
	}
}

/// Absent, null, and empty strings all read as `None`. Prefixes and suffixes keep their spaces.
fn take_optional_string(
	params: &mut JsonObject,
	key: &str,
) -> Result<Option<String>, ErrorData> {
	match params.remove(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(text)) if text.is_empty() => Ok(None),
		Some(Value::String(text)) => Ok(Some(text)),
		Some(_) => Err(ErrorData::invalid_params(format!("{key} must be a string."), None)),
	}
}

fn take_optional_u32(params: &mut JsonObject, key: &str) -> Result<Option<u32>, ErrorData> {
	let value = match params.remove(key) {
		None | Some(Value::Null) => return Ok(None),
		Some(value) => value,
	};
	let invalid = || ErrorData::invalid_params(format!("{key} must be a positive integer."), None);
	let number = match (value.as_u64(), value.as_f64()) {
		(Some(number), _) => number,
		(None, Some(float)) if float.fract() == 0.0 && float >= 0.0 => float as u64,
		_ => return Err(invalid()),
	};

	u32::try_from(number).map(Some).map_err(|_| invalid())
}

fn empty_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"properties": {}
	}))
}

fn list_workers_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"properties": {
			"limit": { "type": ["integer", "null"], "minimum": 1 }
		}
	}))
}

fn bucket_list_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"required": ["bucket"],
		"properties": {
			"bucket": { "type": "string", "description": "Configured bucket id or alias." },
			"prefix": { "type": ["string", "null"] },
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 1000 }
		}
	}))
}

fn bucket_search_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"properties": {
			"bucket": { "type": ["string", "null"], "description": "Configured bucket id or alias." },
			"prefix": { "type": ["string", "null"] },
			"suffix": { "type": ["string", "null"] },
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 200 }
		}
	}))
}

fn human_context_list_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"properties": {
			"topic": { "type": ["string", "null"] },
			"limit": { "type": ["integer", "null"], "minimum": 1, "maximum": 50 }
		}
	}))
}

fn human_context_add_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"required": ["note"],
		"properties": {
			"note": { "type": "string" },
			"topic": { "type": ["string", "null"] },
			"author": { "type": ["string", "null"] }
		}
	}))
}

fn bucket_summary_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"properties": {
			"bucket": { "type": ["string", "null"], "description": "Configured bucket id or alias." }
		}
	}))
}

async fn mcp_auth_middleware(
	State(auth_state): State<McpAuthState>,
	req: Request<Body>,
	next: Next,
) -> axum::response::Response {
	if auth_state.admits(req.headers()) {
		return next.run(req).await;
	}

	let mut response = (StatusCode::UNAUTHORIZED, UNAUTHORIZED).into_response();

	response.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));

	response
}

async fn not_found() -> (StatusCode, &'static str) {
	(StatusCode::NOT_FOUND, NOT_FOUND)
}
