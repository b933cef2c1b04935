// src/main.rs

//! # VC Portal - Main Entry Point
//!
//! Loads settings, wires the lifecycle controller to the credential
//! authority and serves the role-based JSON API.
//!
//! ## Environment Variables
//! - `VC_PORTAL_AUTHORITY_URL`: (Optional) authority base URL (default: http://localhost:8080)
//! - `VC_PORTAL_REQUEST_TIMEOUT_SECS`: (Optional) per-call timeout (default: 10)
//! - `VC_PORTAL_LISTEN_ADDR`: (Optional) API address (default: 127.0.0.1:3000)
//! - `RUST_LOG`: (Optional) log filter (default: info)

use anyhow::Context as _;
use log::info;
use vc_portal::config::Settings;
use vc_portal::services::api_server::ApiServer;
use vc_portal::{Context, LifecycleController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load settings")?;
    let addr = settings.socket_addr()?;
    let context = Context::new(settings).context("failed to initialise authority client")?;
    info!(
        "credential authority at {} (timeout {}s)",
        context.settings.authority_base(),
        context.settings.request_timeout_secs
    );

    let controller = LifecycleController::new(context);
    let api_server = ApiServer::new(controller);

    info!("Available endpoints:");
    info!("- GET  /issuer/credentials");
    info!("- POST /issuer/credentials");
    info!("- GET  /holder/credentials?holder=");
    info!("- POST /holder/selection/:name");
    info!("- POST /holder/presentations");
    info!("- POST /verifier/credentials/:name");
    info!("- POST /verifier/presentations/:name");

    api_server.run(addr).await.context("API server stopped")?;
    Ok(())
}
