use health_tracker::{ai::AiClient, router, storage, AppState, Config};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;

    let db = storage::connect(&config.database_url).await?;

    let ai = match config.ai.clone() {
        Some(settings) => {
            let client = AiClient::new(settings)?;
            info!(model = client.model(), "AI insights enabled");
            Some(client)
        }
        None => {
            warn!("DEEPSEEK_API_KEY not set, AI insights disabled");
            None
        }
    };

    let app = router(AppState::new(db, ai));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
