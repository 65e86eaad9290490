#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use capacity_planner::{Planner, PlannerConfig, SqlitePlannerStore, http_api};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PlannerConfig::load()?;
    let addr: SocketAddr = config.http_addr.parse()?;
    let store = SqlitePlannerStore::new(&config.database_path)?;
    tracing::info!(database = %config.database_path.display(), "opened planner database");

    let state = http_api::AppState::new(Arc::new(store), Planner::from_config(&config));
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
