//! Object-store collaborators.
//!
//! Atrium only ever lists buckets: a page of objects under an optional prefix, continued by an
//! opaque cursor that is valid against the previous page only.

pub mod memory;
pub mod registry;
pub mod s3;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use memory::MemoryBucket;
pub use registry::{BucketEntry, BucketRegistry};
pub use s3::S3Bucket;

use std::{future::Future, pin::Pin};

use serde::Serialize;
use time::OffsetDateTime;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Largest page size accepted by S3-compatible list calls.
pub const MAX_PAGE_SIZE: u32 = 1_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListRequest<'a> {
	pub prefix: Option<&'a str>,
	pub cursor: Option<&'a str>,
	pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
	pub key: String,
	pub size: i64,
	#[serde(with = "crate::time_serde::option")]
	pub uploaded: Option<OffsetDateTime>,
	pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
	pub objects: Vec<ObjectEntry>,
	pub truncated: bool,
	/// Continuation cursor, present only when `truncated` is set.
	pub cursor: Option<String>,
}

pub trait ObjectStore
where
	Self: Send + Sync,
{
	fn list<'a>(&'a self, req: ListRequest<'a>) -> BoxFuture<'a, Result<ObjectPage>>;
}
