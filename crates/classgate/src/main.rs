use std::path::Path;

use classgate::{load_env_file, GatewayBuilder, GatewayConfig, GatewayError};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Before the subscriber, so RUST_LOG may come from the file too.
    let env_file = load_env_file(Path::new(".env"));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match env_file {
        Ok(true) => debug!("read .env"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "ignoring .env"),
    }

    if let Err(e) = run().await {
        error!(error = %e, "classgate failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), GatewayError> {
    let config = GatewayConfig::from_env()?;
    GatewayBuilder::new(config).build().await?.run().await
}
