use anyhow::Result;
use carbon_upload::cli::{run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // CARBON_API_URL / CARBON_API_TOKEN may come from a local .env
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    tracing::debug!("carbon-upload starting");
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "carbon-upload exited with error");
    }
    result
}
