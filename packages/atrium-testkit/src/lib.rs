//! Fixtures for Atrium tests: an in-memory database and object stores with scripted failures.

mod error;

pub use error::{Error, Result};

use std::{
	str::FromStr,
	sync::atomic::{AtomicUsize, Ordering},
};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use atrium_config::{Config, Mcp, ObjectStore as ObjectStoreConfig, Security, Service, Telemetry};
use atrium_objects::{BoxFuture, ListRequest, MemoryBucket, ObjectPage, ObjectStore};
use atrium_storage::db::Db;

/// Tables owned by the build, workflow, and worker systems, shaped as the dashboard reads them.
const DASHBOARD_FIXTURES: &str = include_str!("../fixtures/dashboard.sql");

/// Single-connection in-memory database with Atrium's schema applied.
///
/// The pool never recycles its connection, since an in-memory database lives and dies with it.
pub async fn memory_db() -> Result<Db> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.min_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await?;
	let db = Db::from_pool(pool);

	db.ensure_schema().await?;

	Ok(db)
}

/// [`memory_db`] plus the externally-owned dashboard tables, empty.
pub async fn dashboard_db() -> Result<Db> {
	let db = memory_db().await?;

	for statement in DASHBOARD_FIXTURES.split(';') {
		let trimmed = statement.trim();

		if trimmed.is_empty() {
			continue;
		}

		sqlx::query(trimmed)
			.execute(&db.pool)
			.await
			.map_err(|err| Error::Message(format!("Failed to create dashboard fixture: {err}.")))?;
	}

	Ok(db)
}

/// Loopback configuration without storage or buckets. Tests attach their own handles.
pub fn sample_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:8080".to_string(),
			mcp_bind: "127.0.0.1:9090".to_string(),
			log_level: "info".to_string(),
		},
		storage: None,
		object_store: ObjectStoreConfig::default(),
		telemetry: Telemetry {
			tenant_id: "tenant-test".to_string(),
			agent_email: "agent@example.com".to_string(),
			provider: "cursor".to_string(),
			operator: "ops-test".to_string(),
			billing_email: "billing@example.com".to_string(),
			repo_base_url: Some("https://git.example.com/atrium".to_string()),
		},
		mcp: Mcp {
			platform_info: "Platform: atrium test deployment.".to_string(),
			workers: vec!["api".to_string(), "mcp".to_string(), "cron".to_string()],
			..Mcp::default()
		},
		security: Security::default(),
	}
}

/// Serves pages from an inner [`MemoryBucket`] and fails every call after `pages_before_failure`.
pub struct FailingBucket {
	inner: MemoryBucket,
	pages_before_failure: usize,
	calls: AtomicUsize,
}
impl FailingBucket {
	pub fn new(inner: MemoryBucket, pages_before_failure: usize) -> Self {
		Self { inner, pages_before_failure, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl ObjectStore for FailingBucket {
	fn list<'a>(
		&'a self,
		req: ListRequest<'a>,
	) -> BoxFuture<'a, atrium_objects::Result<ObjectPage>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		if call >= self.pages_before_failure {
			return Box::pin(async move {
				Err(atrium_objects::Error::Backend {
					message: format!("listing failed on page {}", call + 1),
				})
			});
		}

		self.inner.list(req)
	}
}
