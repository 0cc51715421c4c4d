use crate::{AtriumService, Result, check_range};

impl AtriumService {
	/// `Workers: a, b, c`, with `, and N more.` when `limit` cuts the configured list short.
	pub fn list_workers(&self, limit: Option<u32>) -> Result<String> {
		let workers = &self.cfg.mcp.workers;
		let limit = match limit {
			Some(limit) => check_range("limit", limit, 1, u32::MAX)? as usize,
			None => workers.len(),
		};

		if workers.is_empty() {
			return Ok("Workers: none configured.".to_string());
		}

		let shown = workers.iter().take(limit).map(String::as_str).collect::<Vec<_>>().join(", ");
		let hidden = workers.len().saturating_sub(limit);

		if hidden == 0 {
			return Ok(format!("Workers: {shown}"));
		}

		Ok(format!("Workers: {shown}, and {hidden} more."))
	}

	pub fn platform_info(&self) -> String {
		self.cfg.mcp.platform_info.clone()
	}
}
