pub mod buckets;
pub mod dashboard;
pub mod human_context;
pub mod metadata;
pub mod telemetry;
pub mod workers;

mod envelope;
mod error;

pub use buckets::{BucketListRequest, BucketSearchRequest, BucketSummaryRequest};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use human_context::{HumanContextAddRequest, HumanContextListRequest};
pub use metadata::{BillingMetadata, TelemetryMetadata};
pub use telemetry::{
	RecordTelemetryRequest, RecordedTelemetry, TelemetryQuery, TelemetryRecord, TelemetryStatsQuery,
};

use atrium_config::Config;
use atrium_objects::BucketRegistry;
use atrium_storage::db::Db;

/// Text returned by tools that need the relational store when none is configured.
pub const DB_NOT_BOUND: &str = "Error: DB not bound";

/// Handles shared by every request: the optional SQL pool and the bucket registry.
pub struct AtriumService {
	pub cfg: Config,
	pub db: Option<Db>,
	pub buckets: BucketRegistry,
}
impl AtriumService {
	pub fn new(cfg: Config, db: Option<Db>, buckets: BucketRegistry) -> Self {
		Self { cfg, db, buckets }
	}

	/// Opens the configured store and buckets. A missing `[storage]` section leaves the service
	/// without a database; tools that need one answer with [`DB_NOT_BOUND`].
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = match cfg.storage.as_ref() {
			Some(storage) => {
				let db = Db::connect(&storage.sqlite).await?;

				if storage.sqlite.ensure_schema {
					db.ensure_schema().await?;
				}

				tracing::info!(dsn = %storage.sqlite.dsn, "Connected to SQLite.");

				Some(db)
			},
			None => {
				tracing::warn!("No storage section configured. Database tools are disabled.");

				None
			},
		};
		let buckets = BucketRegistry::from_config(&cfg.object_store).await?;

		Ok(Self::new(cfg, db, buckets))
	}
}

pub(crate) fn check_range(label: &str, value: u32, min: u32, max: u32) -> Result<u32> {
	if !(min..=max).contains(&value) {
		return Err(Error::InvalidRequest {
			message: format!("{label} must be between {min} and {max}."),
		});
	}

	Ok(value)
}
