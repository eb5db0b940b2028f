use clap::Parser;

use sift_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	sift_eval::run(args).await
}
