use std::str::FromStr;

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{Result, schema};

#[derive(Clone, Debug)]
pub struct Db {
	pub pool: SqlitePool,
}
impl Db {
	pub async fn connect(cfg: &atrium_config::Sqlite) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(&cfg.dsn)?;
		let pool = SqlitePoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.connect_with(options)
			.await?;

		Ok(Self { pool })
	}

	pub fn from_pool(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Creates the tables Atrium owns or reads as an index. Tables owned by other systems are left
	/// alone.
	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let mut tx = self.pool.begin().await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
