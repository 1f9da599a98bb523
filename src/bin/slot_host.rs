//! message-slot host binary.
//!
//! Owns the slot registry for the lifetime of the process and exposes it
//! over HTTP to `message_sender` and `message_reader`. On Ctrl-C the host
//! stops accepting requests, closes every handle and tears the registry
//! down.
//!
//! # Environment Variables
//!
//! - `MESSAGE_SLOT_ADDR` — bind address (default: 127.0.0.1:7350)
//! - `PORT` — port on all interfaces, when `MESSAGE_SLOT_ADDR` is unset
//! - `MESSAGE_SLOT_MAX_MESSAGE_SIZE`, `MESSAGE_SLOT_MAX_SLOTS` — registry limits
//! - `RUST_LOG` — Tracing filter (default: "info,message_slot=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin slot_host
//! ```

use anyhow::Context;
use message_slot::config::HostConfig;
use message_slot::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,message_slot=debug".into()),
        )
        .init();

    // Rejects bad limits up front; the global registry reads the same variables.
    let config = HostConfig::from_env().context("invalid host configuration")?;
    let state = AppState::global();
    let app = app_router(state.clone());

    tracing::info!("message-slot host starting on {}", config.bind_addr);
    tracing::info!(
        "limits: {} slots, {} bytes per message",
        state.registry.config().max_slots,
        state.registry.config().max_message_size
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    let report = state.shutdown();
    tracing::info!(
        "shutdown complete: released {} slots, {} channels, {} bytes",
        report.slots,
        report.channels,
        report.bytes
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
