mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Bucket, Config, Mcp, ObjectStore, S3Binding, Security, Service, Sqlite, Storage, Telemetry,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in
		[("service.http_bind", &cfg.service.http_bind), ("service.mcp_bind", &cfg.service.mcp_bind)]
	{
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if let Some(storage) = cfg.storage.as_ref() {
		if storage.sqlite.dsn.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.sqlite.dsn must be non-empty.".to_string(),
			});
		}
		if storage.sqlite.pool_max_conns == 0 {
			return Err(Error::Validation {
				message: "storage.sqlite.pool_max_conns must be greater than zero.".to_string(),
			});
		}
	}

	validate_buckets(&cfg.object_store)?;

	for (label, value) in [
		("telemetry.tenant_id", &cfg.telemetry.tenant_id),
		("telemetry.agent_email", &cfg.telemetry.agent_email),
		("telemetry.provider", &cfg.telemetry.provider),
		("telemetry.operator", &cfg.telemetry.operator),
		("telemetry.billing_email", &cfg.telemetry.billing_email),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.mcp.default_author.trim().is_empty() {
		return Err(Error::Validation {
			message: "mcp.default_author must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn validate_buckets(store: &ObjectStore) -> Result<()> {
	let mut seen = HashSet::new();

	for bucket in &store.buckets {
		if bucket.id.trim().is_empty() {
			return Err(Error::Validation {
				message: "object_store.buckets.id must be non-empty.".to_string(),
			});
		}

		for name in std::iter::once(&bucket.id).chain(bucket.aliases.iter()) {
			if !seen.insert(name.as_str()) {
				return Err(Error::Validation {
					message: format!(
						"object_store bucket name {name:?} is declared more than once \
						 across ids and aliases."
					),
				});
			}
		}

		if let Some(s3) = bucket.s3.as_ref() {
			if s3.bucket.trim().is_empty() {
				return Err(Error::Validation {
					message: format!(
						"object_store.buckets.s3.bucket must be non-empty for {}.",
						bucket.id
					),
				});
			}
			if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
				return Err(Error::Validation {
					message: format!(
						"object_store.buckets.s3 for {} must set both access_key_id and \
						 secret_access_key, or neither.",
						bucket.id
					),
				});
			}
		}
	}

	if let Some(primary) = store.primary.as_deref()
		&& !store.buckets.iter().any(|bucket| bucket.id == primary)
	{
		return Err(Error::Validation {
			message: format!("object_store.primary {primary:?} does not name a configured bucket."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.security.bearer_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
		cfg.security.bearer_token = None;
	}
	if cfg.object_store.primary.as_deref().map(|id| id.trim().is_empty()).unwrap_or(false) {
		cfg.object_store.primary = None;
	}
	if cfg.telemetry.repo_base_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.telemetry.repo_base_url = None;
	}

	for bucket in &mut cfg.object_store.buckets {
		if let Some(s3) = bucket.s3.as_mut()
			&& s3.endpoint_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false)
		{
			s3.endpoint_url = None;
		}
	}
}
