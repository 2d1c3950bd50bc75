use relay_mock::MockState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_ADDR: &str = "127.0.0.1:5000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_mock=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("RELAY_MOCK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let state = Arc::new(MockState::demo());
    for (token, user) in state.accounts() {
        info!(token = %token, user_id = %user.id, role = %user.role, "Demo account");
    }

    let (local, handle) = relay_mock::spawn(addr, state).await?;
    info!("Mock backend listening on http://{local}");
    handle.await??;
    Ok(())
}
