//! Territoires Server - HTTP API resolving French territorial names to
//! official codes, with admission control and bulk batches.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    server::start_server(config).await?;
    Ok(())
}
