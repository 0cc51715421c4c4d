pub mod routes;
pub mod state;

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;
use atrium_cli::ConfigArgs;

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

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = atrium_config::load(&args.common.config)?;

	init_tracing(&config);

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let state = AppState::new(config).await?;
	let app = routes::router(state);
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(listener, app).await?;

	Ok(())
}

fn init_tracing(config: &atrium_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
