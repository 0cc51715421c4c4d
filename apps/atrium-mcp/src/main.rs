use clap::Parser;

use atrium_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	atrium_mcp::run(args).await
}
