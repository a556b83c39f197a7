use clap::Parser;

use nlm_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	nlm_mcp::run(args).await
}
