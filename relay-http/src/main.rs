use anyhow::Result;
use relay_http::{start_server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay_http=info,relay_llm=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let engine = relay_llm::engine_from_env()?;

    start_server(config, engine).await
}
