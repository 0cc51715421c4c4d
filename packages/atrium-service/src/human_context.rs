use serde::Deserialize;

use atrium_storage::models::HumanContextNote;

use crate::{AtriumService, DB_NOT_BOUND, Error, Result, check_range};

pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const MAX_LIST_LIMIT: u32 = 50;

pub const NOTE_ADDED: &str = "human_context note added";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HumanContextListRequest {
	pub topic: Option<String>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HumanContextAddRequest {
	pub note: String,
	pub topic: Option<String>,
	pub author: Option<String>,
}

impl AtriumService {
	/// Operator notes as a JSON array, newest first.
	pub async fn human_context_list(&self, req: HumanContextListRequest) -> Result<String> {
		let limit =
			check_range("limit", req.limit.unwrap_or(DEFAULT_LIST_LIMIT), 1, MAX_LIST_LIMIT)?;
		let Some(db) = self.db.as_ref() else {
			return Ok(DB_NOT_BOUND.to_string());
		};
		let query = match req.topic.as_deref() {
			Some(topic) => sqlx::query_as::<_, HumanContextNote>(
				"\
SELECT id, topic, note, author, created_at
FROM human_context
WHERE topic = ?
ORDER BY created_at DESC, id DESC
LIMIT ?",
			)
			.bind(topic)
			.bind(i64::from(limit)),
			None => sqlx::query_as::<_, HumanContextNote>(
				"\
SELECT id, topic, note, author, created_at
FROM human_context
ORDER BY created_at DESC, id DESC
LIMIT ?",
			)
			.bind(i64::from(limit)),
		};

		match query.fetch_all(&db.pool).await {
			Ok(notes) => Ok(serde_json::to_string_pretty(&notes)?),
			Err(err) => {
				tracing::error!(error = %err, "human_context_list failed.");

				Ok(format!("human_context_list failed: {err}"))
			},
		}
	}

	pub async fn human_context_add(&self, req: HumanContextAddRequest) -> Result<String> {
		if req.note.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "note must be non-empty.".to_string() });
		}

		let Some(db) = self.db.as_ref() else {
			return Ok(DB_NOT_BOUND.to_string());
		};
		let author = req.author.as_deref().unwrap_or(self.cfg.mcp.default_author.as_str());
		let inserted =
			sqlx::query("INSERT INTO human_context (topic, note, author) VALUES (?, ?, ?)")
				.bind(req.topic.as_deref())
				.bind(req.note.as_str())
				.bind(author)
				.execute(&db.pool)
				.await;

		match inserted {
			Ok(_) => Ok(NOTE_ADDED.to_string()),
			Err(err) => {
				tracing::error!(error = %err, "human_context_add failed.");

				Ok(format!("human_context_add failed: {err}"))
			},
		}
	}
}
