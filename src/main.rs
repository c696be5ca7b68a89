use clap::Parser;

use pyin_notes::{init_logging, server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = ServerConfig::parse();
    server::serve(config).await
}
