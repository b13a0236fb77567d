//! Binary entry point: parses configuration, wires up tracing, and runs the
//! server until a shutdown signal arrives.

use clap::Parser;
use proxy_server::{ServerConfig, ServerModule};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = ServerConfig::parse();
    let server = ServerModule::bootstrap(config).await?;
    server.serve(shutdown_signal()).await
}

/// Waits for Ctrl+C or, on Unix, SIGTERM — the same dual-signal shutdown the
/// teacher workspace's own server binary waits on.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
