use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{Client, error::DisplayErrorContext};
use time::OffsetDateTime;

use atrium_config::S3Binding;

use crate::{
	BoxFuture, Error, ListRequest, MAX_PAGE_SIZE, ObjectEntry, ObjectPage, ObjectStore, Result,
};

/// S3-compatible bucket (AWS S3, Cloudflare R2, MinIO) reached through `ListObjectsV2`.
#[derive(Clone, Debug)]
pub struct S3Bucket {
	client: Client,
	bucket: String,
}
impl S3Bucket {
	pub async fn connect(binding: &S3Binding) -> Result<Self> {
		let mut loader =
			aws_config::defaults(BehaviorVersion::latest())
				.region(Region::new(binding.region.clone()));

		if let (Some(access_key_id), Some(secret_access_key)) =
			(binding.access_key_id.as_deref(), binding.secret_access_key.as_deref())
		{
			loader = loader.credentials_provider(Credentials::new(
				access_key_id,
				secret_access_key,
				None,
				None,
				"atrium-config",
			));
		}

		let shared = loader.load().await;
		let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);

		if let Some(endpoint_url) = binding.endpoint_url.as_deref() {
			builder = builder.endpoint_url(endpoint_url);
		}

		Ok(Self { client: Client::from_conf(builder.build()), bucket: binding.bucket.clone() })
	}

	async fn list_page(&self, req: ListRequest<'_>) -> Result<ObjectPage> {
		let limit = req.limit.clamp(1, MAX_PAGE_SIZE);
		let output = self
			.client
			.list_objects_v2()
			.bucket(&self.bucket)
			.set_prefix(req.prefix.filter(|prefix| !prefix.is_empty()).map(str::to_string))
			.set_continuation_token(req.cursor.map(str::to_string))
			.max_keys(limit as i32)
			.send()
			.await
			.map_err(|err| Error::Backend { message: DisplayErrorContext(&err).to_string() })?;
		let objects = output
			.contents()
			.iter()
			.filter_map(|object| {
				let key = object.key()?.to_string();
				let uploaded = object
					.last_modified()
					.and_then(|ts| OffsetDateTime::from_unix_timestamp(ts.secs()).ok());

				Some(ObjectEntry {
					key,
					size: object.size().unwrap_or(0),
					uploaded,
					etag: object.e_tag().map(|etag| etag.trim_matches('"').to_string()),
				})
			})
			.collect();
		let truncated = output.is_truncated().unwrap_or(false);
		let cursor =
			if truncated { output.next_continuation_token().map(str::to_string) } else { None };

		tracing::debug!(bucket = %self.bucket, truncated, "Listed object page.");

		Ok(ObjectPage { objects, truncated, cursor })
	}
}
impl ObjectStore for S3Bucket {
	fn list<'a>(&'a self, req: ListRequest<'a>) -> BoxFuture<'a, Result<ObjectPage>> {
		Box::pin(self.list_page(req))
	}
}
