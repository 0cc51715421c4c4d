pub mod server;

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use atrium_cli::ConfigArgs;
use atrium_config::{Config, Security};
use atrium_service::AtriumService;

#[derive(Debug, Parser)]
#[command(
	version = atrium_cli::VERSION,
	rename_all = "kebab",
	styles = atrium_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub common: ConfigArgs,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAuthState {
	Off,
	StaticToken { bearer_token: String },
}

pub async fn run(args: Args) -> Result<()> {
	let config = atrium_config::load(&args.common.config)?;

	init_tracing(&config);

	let auth_state = build_auth_state(&config.security, &config.service.mcp_bind)?;
	let mcp_bind = config.service.mcp_bind.clone();
	let service = Arc::new(AtriumService::connect(config).await?);

	server::serve_mcp(&mcp_bind, service, auth_state).await
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Anonymous access is only allowed while the listener is reachable from this host alone.
fn build_auth_state(security: &Security, mcp_bind: &str) -> Result<McpAuthState> {
	match security.auth_mode.trim() {
		"off" if binds_loopback(mcp_bind)? => Ok(McpAuthState::Off),
		"off" => Err(eyre::eyre!(
			"auth_mode \"off\" needs a loopback service.mcp_bind, got {mcp_bind}. \
			 Bind to 127.0.0.1 or switch to auth_mode \"static_token\"."
		)),
		"static_token" => security
			.bearer_token
			.as_deref()
			.map(str::trim)
			.filter(|token| !token.is_empty())
			.map(|token| McpAuthState::StaticToken { bearer_token: token.to_string() })
			.ok_or_else(|| eyre::eyre!("auth_mode \"static_token\" needs security.bearer_token.")),
		other => Err(eyre::eyre!(
			"Unsupported security.auth_mode {other:?}; expected \"off\" or \"static_token\"."
		)),
	}
}

fn binds_loopback(mcp_bind: &str) -> Result<bool> {
	let addr: SocketAddr = mcp_bind.parse().map_err(|err| {
		eyre::eyre!("service.mcp_bind {mcp_bind:?} is not a socket address: {err}")
	})?;

	Ok(addr.ip().is_loopback())
}

#[cfg(test)]
mod tests {
	use atrium_config::Security;

	use crate::{McpAuthState, build_auth_state};

	fn security(auth_mode: &str, bearer_token: Option<&str>) -> Security {
		Security {
			auth_mode: auth_mode.to_string(),
			bearer_token: bearer_token.map(str::to_string),
		}
	}

	#[test]
	fn anonymous_mode_is_limited_to_loopback_binds() {
		let err =
			build_auth_state(&security("off", None), "0.0.0.0:9090").expect_err("public bind");

		assert!(err.to_string().contains("loopback"), "unexpected error: {err}");
		assert_eq!(
			build_auth_state(&security("off", None), "127.0.0.1:9090").expect("auth state"),
			McpAuthState::Off
		);
		assert_eq!(
			build_auth_state(&security("off", None), "[::1]:9090").expect("auth state"),
			McpAuthState::Off
		);
	}

	#[test]
	fn anonymous_mode_rejects_unparseable_binds() {
		let err = build_auth_state(&security("off", None), "localhost").expect_err("bad bind");

		assert!(err.to_string().contains("not a socket address"), "unexpected error: {err}");
	}

	#[test]
	fn token_mode_trims_the_configured_token() {
		let auth_state =
			build_auth_state(&security("static_token", Some(" token-1 ")), "0.0.0.0:9090")
				.expect("auth state");

		assert_eq!(auth_state, McpAuthState::StaticToken { bearer_token: "token-1".to_string() });
	}

	#[test]
	fn token_mode_without_a_token_fails_startup() {
		for token in [None, Some("  ")] {
			let err = build_auth_state(&security("static_token", token), "127.0.0.1:9090")
				.expect_err("missing token");

			assert!(err.to_string().contains("bearer_token"), "unexpected error: {err}");
		}
	}

	#[test]
	fn unsupported_modes_fail_startup() {
		let err = build_auth_state(&security("oauth", None), "127.0.0.1:9090")
			.expect_err("unsupported mode");

		assert!(err.to_string().contains("\"oauth\""), "unexpected error: {err}");
	}
}
