use std::{collections::BTreeMap, sync::RwLock};

use time::OffsetDateTime;

use crate::{BoxFuture, ListRequest, MAX_PAGE_SIZE, ObjectEntry, ObjectPage, ObjectStore, Result};

/// Bucket held in process memory, keyed in lexicographic order like S3.
#[derive(Debug, Default)]
pub struct MemoryBucket {
	objects: RwLock<BTreeMap<String, ObjectEntry>>,
}
impl MemoryBucket {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_objects<I, K>(objects: I) -> Self
	where
		I: IntoIterator<Item = (K, i64)>,
		K: Into<String>,
	{
		let bucket = Self::new();

		for (key, size) in objects {
			bucket.put(key, size, None);
		}

		bucket
	}

	pub fn put(&self, key: impl Into<String>, size: i64, uploaded: Option<OffsetDateTime>) {
		let key = key.into();
		let etag = Some(content_etag(&key, size));
		let entry = ObjectEntry { key: key.clone(), size, uploaded, etag };
		let mut objects = self.objects.write().unwrap_or_else(|err| err.into_inner());

		objects.insert(key, entry);
	}

	fn page(&self, req: ListRequest<'_>) -> ObjectPage {
		let limit = req.limit.clamp(1, MAX_PAGE_SIZE) as usize;
		let prefix = req.prefix.unwrap_or("");
		let objects = self.objects.read().unwrap_or_else(|err| err.into_inner());
		let mut matching = objects
			.range::<str, _>((
				req.cursor.map_or(std::ops::Bound::Unbounded, std::ops::Bound::Excluded),
				std::ops::Bound::Unbounded,
			))
			.filter(|(key, _)| key.starts_with(prefix))
			.map(|(_, entry)| entry.clone());
		let page: Vec<ObjectEntry> = matching.by_ref().take(limit).collect();
		let truncated = matching.next().is_some();
		let cursor = if truncated { page.last().map(|entry| entry.key.clone()) } else { None };

		ObjectPage { objects: page, truncated, cursor }
	}
}
impl ObjectStore for MemoryBucket {
	fn list<'a>(&'a self, req: ListRequest<'a>) -> BoxFuture<'a, Result<ObjectPage>> {
		Box::pin(async move { Ok(self.page(req)) })
	}
}

fn content_etag(key: &str, size: i64) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(key.as_bytes());
	hasher.update(&size.to_le_bytes());

	hasher.finalize().to_hex().to_string()
}
