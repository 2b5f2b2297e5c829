use nearcast::prelude::*;

const DEFAULT_ADDR: &str = "0.0.0.0:8000";

/// `NEARCAST_ADDR` wins; otherwise `PORT` on all interfaces.
fn bind_addr() -> String {
    if let Ok(addr) = std::env::var("NEARCAST_ADDR") {
        return addr;
    }
    match std::env::var("PORT") {
        Ok(port) => format!("0.0.0.0:{port}"),
        Err(_) => DEFAULT_ADDR.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), NearcastError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server = NearcastServer::builder()
        .bind(&bind_addr())
        .pair_index(UniformGrid::new())
        .build()
        .await?;

    let world = server.world();
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            world.shutdown().await
        }
    }
}
