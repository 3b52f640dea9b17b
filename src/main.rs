use rockexam_backend::{
    config::{get_config, init_config},
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    init_config()?;
    let config = get_config();
    info!(
        "Generating with model {} (content limit {} chars, sampling {})",
        config.gemini_model, config.content_limit, config.content_sampling
    );

    let app_state = AppState::new()?;

    {
        let workspaces = app_state.workspaces.clone();
        let ttl = Duration::from_secs(config.workspace_idle_ttl_secs);
        let period = Duration::from_secs(config.workspace_sweep_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                workspaces.evict_idle(ttl);
            }
        });
    }

    let app = routes::router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
