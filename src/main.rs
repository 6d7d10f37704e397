use anyhow::Result;
use edge_welcome::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
