//! mcp-pmdex server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = pmdex_core::config::AppConfig::load()?;
    config.validate()?;

    tracing::info!("Starting mcp-pmdex server on stdio transport (db: {})", config.db_path.display());

    let db = pmdex_core::CacheDb::open(&config.db_path).await?;

    let handler = handler::PmdexServer::new(db, config);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
