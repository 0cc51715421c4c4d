use std::sync::Arc;

use color_eyre::eyre;

use atrium_config::{Config, Telemetry};
use atrium_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub db: Db,
	pub telemetry: Arc<Telemetry>,
}
impl AppState {
	/// The dashboard and telemetry surfaces are meaningless without a database, so a missing
	/// `[storage]` section is a startup error here.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let storage = config
			.storage
			.as_ref()
			.ok_or_else(|| eyre::eyre!("storage section is required for atrium-api."))?;
		let db = Db::connect(&storage.sqlite).await?;

		if storage.sqlite.ensure_schema {
			db.ensure_schema().await?;
		}

		Ok(Self::from_parts(db, config.telemetry))
	}

	pub fn from_parts(db: Db, telemetry: Telemetry) -> Self {
		Self { db, telemetry: Arc::new(telemetry) }
	}
}
