pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("{message}")]
	Storage { message: String },
	#[error("{message}")]
	ObjectStore { message: String },
	#[error("Serialization error: {message}")]
	Serialization { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<atrium_storage::Error> for Error {
	fn from(err: atrium_storage::Error) -> Self {
		match err {
			atrium_storage::Error::Sqlx(inner) => inner.into(),
		}
	}
}

impl From<atrium_objects::Error> for Error {
	fn from(err: atrium_objects::Error) -> Self {
		Self::ObjectStore { message: err.to_string() }
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Serialization { message: err.to_string() }
	}
}
