// Community Hub Server

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use community_hub::{api::create_router, app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("community_hub=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::new(config.clone()).await?;
    let app = create_router(state);

    let addr = config.server_address();
    info!("Community Hub listening on http://{}", addr);
    info!("  POST   /api/v1/users/{{id}}/follow    - Follow a user");
    info!("  GET    /api/v1/feed/following        - Posts from followed users");
    info!("  POST   /api/v1/showcases/{{id}}/upvote - Upvote a showcase");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
