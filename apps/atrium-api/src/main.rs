use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = atrium_api::Args::parse();

	atrium_api::run(args).await
}
