//! Bucket tools: one-page listing, key search, and whole-bucket size summaries.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite};
use time::OffsetDateTime;

use atrium_objects::{ListRequest, MAX_PAGE_SIZE, ObjectEntry, ObjectStore};
use atrium_storage::{db::Db, models::InventoryEntry};

use crate::{AtriumService, Error, Result, check_range};

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const MAX_LIST_LIMIT: u32 = MAX_PAGE_SIZE;
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;
pub const MAX_SEARCH_LIMIT: u32 = 200;

pub const INVENTORY_SOURCE: &str = "r2_object_inventory";
pub const LISTING_SOURCE: &str = "r2_list";
pub const NO_SEARCH_BUCKET: &str = "No bucket bound for search";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketListRequest {
	pub bucket: String,
	pub prefix: Option<String>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketSearchRequest {
	pub bucket: Option<String>,
	pub prefix: Option<String>,
	pub suffix: Option<String>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketSummaryRequest {
	pub bucket: Option<String>,
}

/// Object count and byte total for one bucket. Both are `-1` when enumeration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketTotals {
	pub count: i64,
	#[serde(rename = "totalBytes")]
	pub total_bytes: i64,
}
impl BucketTotals {
	pub const EMPTY: Self = Self { count: 0, total_bytes: 0 };
	pub const FAILED: Self = Self { count: -1, total_bytes: -1 };
}

#[derive(Debug, Serialize)]
struct SearchHit {
	key: String,
	size: i64,
	#[serde(with = "atrium_objects::time_serde::option")]
	uploaded: Option<OffsetDateTime>,
}
impl From<ObjectEntry> for SearchHit {
	fn from(entry: ObjectEntry) -> Self {
		Self { key: entry.key, size: entry.size, uploaded: entry.uploaded }
	}
}

impl AtriumService {
	pub async fn bucket_list(&self, req: BucketListRequest) -> Result<String> {
		let limit =
			check_range("limit", req.limit.unwrap_or(DEFAULT_LIST_LIMIT), 1, MAX_LIST_LIMIT)?;
		let Some(bucket) = self.buckets.canonical_id(&req.bucket) else {
			return Err(Error::InvalidRequest {
				message: format!(
					"bucket must be one of {}, got {}.",
					self.buckets.ids().collect::<Vec<_>>().join(", "),
					req.bucket
				),
			});
		};
		let Some(store) = self.buckets.resolve(bucket) else {
			return Ok(format!("Bucket {bucket} not bound"));
		};
		let page = store
			.list(ListRequest { prefix: req.prefix.as_deref(), cursor: None, limit })
			.await;

		match page {
			Ok(page) => {
				let body = json!({
					"bucket": bucket,
					"truncated": page.truncated,
					"cursor": page.cursor,
					"count": page.objects.len(),
					"objects": page.objects,
				});

				Ok(serde_json::to_string_pretty(&body)?)
			},
			Err(err) => {
				tracing::error!(error = %err, bucket = %bucket, "Bucket list failed.");

				Ok(format!("Bucket list failed: {err}"))
			},
		}
	}

	/// Searches keys through the inventory table when the database is bound, otherwise through one
	/// listing page of the bucket.
	pub async fn bucket_search(&self, req: BucketSearchRequest) -> Result<String> {
		let limit =
			check_range("limit", req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT), 1, MAX_SEARCH_LIMIT)?;
		let prefix = req.prefix.as_deref().filter(|prefix| !prefix.is_empty());
		let suffix = req.suffix.as_deref().filter(|suffix| !suffix.is_empty());

		if let Some(db) = self.db.as_ref() {
			let targets: Vec<String> = match req.bucket.as_deref() {
				Some(name) => vec![self.buckets.canonical_id(name).unwrap_or(name).to_string()],
				None => self.buckets.ids().map(str::to_string).collect(),
			};

			if !targets.is_empty() {
				match search_inventory(db, &targets, prefix, suffix, limit).await {
					Ok(rows) => {
						let body = json!({ "source": INVENTORY_SOURCE, "rows": rows });

						return Ok(serde_json::to_string_pretty(&body)?);
					},
					Err(err) => {
						tracing::warn!(
							error = %err,
							"Inventory search failed. Falling back to bucket listing."
						);
					},
				}
			}
		}

		let target = match req.bucket.as_deref() {
			Some(name) => self.buckets.resolve(name).map(|store| {
				let id = self
					.buckets
					.canonical_id(name)
					.or_else(|| self.buckets.default_bound().map(|(id, _)| id))
					.unwrap_or(name)
					.to_string();

				(id, store)
			}),
			None => self.buckets.default_bound().map(|(id, store)| (id.to_string(), store)),
		};
		let Some((bucket, store)) = target else {
			return Ok(NO_SEARCH_BUCKET.to_string());
		};

		match store.list(ListRequest { prefix, cursor: None, limit }).await {
			Ok(page) => {
				let objects: Vec<SearchHit> = page
					.objects
					.into_iter()
					.filter(|entry| suffix.is_none_or(|suffix| entry.key.ends_with(suffix)))
					.map(SearchHit::from)
					.collect();
				let body = json!({
					"bucket": bucket,
					"source": LISTING_SOURCE,
					"count": objects.len(),
					"objects": objects,
				});

				Ok(serde_json::to_string_pretty(&body)?)
			},
			Err(err) => {
				tracing::error!(error = %err, bucket = %bucket, "Bucket search failed.");

				Ok(format!("Bucket search failed: {err}"))
			},
		}
	}

	/// Totals per bucket. A failing bucket reports [`BucketTotals::FAILED`] without aborting the
	/// others.
	pub async fn bucket_summary(&self, req: BucketSummaryRequest) -> Result<String> {
		let targets: Vec<(String, Option<Arc<dyn ObjectStore>>)> = match req.bucket.as_deref() {
			Some(name) => {
				let id = self.buckets.canonical_id(name).unwrap_or(name).to_string();

				vec![(id, self.buckets.resolve(name))]
			},
			None => self
				.buckets
				.entries()
				.iter()
				.map(|entry| (entry.id.clone(), entry.store.clone()))
				.collect(),
		};
		let mut summaries = BTreeMap::new();

		for (id, store) in targets {
			let totals = match store {
				Some(store) => match summarize(store.as_ref()).await {
					Ok(totals) => totals,
					Err(err) => {
						tracing::error!(error = %err, bucket = %id, "Bucket summary failed.");

						BucketTotals::FAILED
					},
				},
				None => BucketTotals::EMPTY,
			};

			summaries.insert(id, totals);
		}

		Ok(serde_json::to_string_pretty(&summaries)?)
	}
}

/// Walks every page in order. Each cursor is only valid against the page that produced it.
pub async fn summarize(store: &dyn ObjectStore) -> Result<BucketTotals> {
	let mut totals = BucketTotals::EMPTY;
	let mut cursor: Option<String> = None;

	loop {
		let page = store
			.list(ListRequest { prefix: None, cursor: cursor.as_deref(), limit: MAX_PAGE_SIZE })
			.await?;

		for entry in &page.objects {
			totals.count += 1;
			totals.total_bytes += entry.size;
		}

		cursor = if page.truncated { page.cursor } else { None };

		if cursor.is_none() {
			return Ok(totals);
		}
	}
}

/// Escapes `%`, `_`, and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for c in raw.chars() {
		if matches!(c, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(c);
	}

	out
}

async fn search_inventory(
	db: &Db,
	buckets: &[String],
	prefix: Option<&str>,
	suffix: Option<&str>,
	limit: u32,
) -> Result<Vec<InventoryEntry>> {
	let mut builder = QueryBuilder::<Sqlite>::new(
		"SELECT bucket_name, object_key, size_bytes, last_modified_iso FROM r2_object_inventory WHERE bucket_name IN (",
	);
	let mut separated = builder.separated(", ");

	for bucket in buckets {
		separated.push_bind(bucket.as_str());
	}

	separated.push_unseparated(")");

	if let Some(prefix) = prefix {
		builder.push(" AND object_key LIKE ");
		builder.push_bind(format!("{}%", escape_like(prefix)));
		builder.push(" ESCAPE '\\'");
	}
	if let Some(suffix) = suffix {
		builder.push(" AND object_key LIKE ");
		builder.push_bind(format!("%{}", escape_like(suffix)));
		builder.push(" ESCAPE '\\'");
	}

	builder.push(" ORDER BY bucket_name, object_key LIMIT ");
	builder.push_bind(i64::from(limit));

	Ok(builder.build_query_as().fetch_all(&db.pool).await?)
}

#[cfg(test)]
mod tests {
	use crate::buckets::escape_like;

	#[test]
	fn like_wildcards_are_escaped() {
		assert_eq!(escape_like("logs/"), "logs/");
		assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
	}
}
