use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Option<Storage>,
	#[serde(default)]
	pub object_store: ObjectStore,
	pub telemetry: Telemetry,
	#[serde(default)]
	pub mcp: Mcp,
	#[serde(default)]
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub mcp_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub sqlite: Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct Sqlite {
	/// sqlx connection string, e.g. "sqlite://atrium.db?mode=rwc".
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
	/// Create the tables Atrium owns on startup.
	#[serde(default)]
	pub ensure_schema: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectStore {
	/// Bucket id used when a selector does not name a configured bucket.
	pub primary: Option<String>,
	#[serde(default)]
	pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
	pub id: String,
	#[serde(default)]
	pub aliases: Vec<String>,
	/// A bucket without an `s3` table is known but unbound.
	pub s3: Option<S3Binding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Binding {
	pub bucket: String,
	pub endpoint_url: Option<String>,
	#[serde(default = "default_region")]
	pub region: String,
	pub access_key_id: Option<String>,
	pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Telemetry {
	pub tenant_id: String,
	pub agent_email: String,
	#[serde(default = "default_provider")]
	pub provider: String,
	pub operator: String,
	pub billing_email: String,
	pub repo_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Mcp {
	pub name: String,
	pub version: String,
	pub instructions: String,
	pub greeting: String,
	pub platform_info: String,
	pub workers: Vec<String>,
	pub default_author: String,
}
impl Default for Mcp {
	fn default() -> Self {
		Self {
			name: "Atrium MCP".to_string(),
			version: "1.0.0".to_string(),
			instructions: "Atrium exposes bucket listings, inventory search, and operator notes."
				.to_string(),
			greeting: "Atrium MCP - use /mcp".to_string(),
			platform_info: String::new(),
			workers: Vec::new(),
			default_author: "operator".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Security {
	pub auth_mode: String,
	pub bearer_token: Option<String>,
}
impl Default for Security {
	fn default() -> Self {
		Self { auth_mode: "off".to_string(), bearer_token: None }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_pool_max_conns() -> u32 {
	4
}

fn default_region() -> String {
	"auto".to_string()
}

fn default_provider() -> String {
	"cursor".to_string()
}
