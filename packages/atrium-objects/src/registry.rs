use std::sync::Arc;

use atrium_config::ObjectStore as ObjectStoreConfig;

use crate::{ObjectStore, Result, S3Bucket};

/// A configured bucket. `store` is `None` when the bucket is known but not bound to a backend.
#[derive(Clone)]
pub struct BucketEntry {
	pub id: String,
	pub aliases: Vec<String>,
	pub store: Option<Arc<dyn ObjectStore>>,
}
impl BucketEntry {
	pub fn bound(id: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
		Self { id: id.into(), aliases: Vec::new(), store: Some(store) }
	}

	pub fn unbound(id: impl Into<String>) -> Self {
		Self { id: id.into(), aliases: Vec::new(), store: None }
	}

	pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.aliases = aliases.into_iter().map(Into::into).collect();

		self
	}

	fn answers_to(&self, name: &str) -> bool {
		self.id == name || self.aliases.iter().any(|alias| alias == name)
	}
}

#[derive(Clone, Default)]
pub struct BucketRegistry {
	entries: Vec<BucketEntry>,
	primary: Option<String>,
}
impl BucketRegistry {
	pub fn new(entries: Vec<BucketEntry>, primary: Option<String>) -> Self {
		Self { entries, primary }
	}

	pub async fn from_config(cfg: &ObjectStoreConfig) -> Result<Self> {
		let mut entries = Vec::with_capacity(cfg.buckets.len());

		for bucket in &cfg.buckets {
			let store: Option<Arc<dyn ObjectStore>> = match bucket.s3.as_ref() {
				Some(binding) => Some(Arc::new(S3Bucket::connect(binding).await?)),
				None => None,
			};

			tracing::info!(bucket = %bucket.id, bound = store.is_some(), "Registered bucket.");

			entries.push(BucketEntry {
				id: bucket.id.clone(),
				aliases: bucket.aliases.clone(),
				store,
			});
		}

		Ok(Self::new(entries, cfg.primary.clone()))
	}

	pub fn entries(&self) -> &[BucketEntry] {
		&self.entries
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|entry| entry.id.as_str())
	}

	/// Canonical id for a configured bucket id or alias.
	pub fn canonical_id(&self, name: &str) -> Option<&str> {
		self.entries.iter().find(|entry| entry.answers_to(name)).map(|entry| entry.id.as_str())
	}

	/// Resolves a bucket selector to its binding.
	///
	/// A configured id or alias yields that bucket's binding, which may be absent. Any other name
	/// falls back to the default binding.
	pub fn resolve(&self, name: &str) -> Option<Arc<dyn ObjectStore>> {
		match self.entries.iter().find(|entry| entry.answers_to(name)) {
			Some(entry) => entry.store.clone(),
			None => self.default_bound().map(|(_, store)| store),
		}
	}

	/// The primary bucket when it is bound, otherwise the first bound bucket.
	pub fn default_bound(&self) -> Option<(&str, Arc<dyn ObjectStore>)> {
		let primary = self
			.primary
			.as_deref()
			.and_then(|id| self.entries.iter().find(|entry| entry.id == id))
			.filter(|entry| entry.store.is_some());

		primary
			.or_else(|| self.entries.iter().find(|entry| entry.store.is_some()))
			.and_then(|entry| entry.store.clone().map(|store| (entry.id.as_str(), store)))
	}
}
