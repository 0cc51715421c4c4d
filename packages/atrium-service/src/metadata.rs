use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata stored alongside a telemetry record.
///
/// Records written by this service carry [`BillingMetadata`]. Rows written by other producers are
/// kept as an opaque object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryMetadata {
	Billing(BillingMetadata),
	Opaque(Map<String, Value>),
}
impl TelemetryMetadata {
	/// Parses a stored blob. Text that is not a JSON object is preserved under `raw`.
	pub fn parse(raw: &str) -> Self {
		match serde_json::from_str::<Self>(raw) {
			Ok(metadata) => metadata,
			Err(_) => {
				let mut bag = Map::new();

				bag.insert("raw".to_string(), Value::String(raw.to_string()));

				Self::Opaque(bag)
			},
		}
	}

	pub fn billing(&self) -> Option<&BillingMetadata> {
		match self {
			Self::Billing(billing) => Some(billing),
			Self::Opaque(_) => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillingMetadata {
	pub billing_email: String,
	pub operator: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repo_base_url: Option<String>,
}
