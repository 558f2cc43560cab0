//! voxgate - telephony voice-agent platform
//!
//! Boot order: logging, configuration, store migration, agent registry,
//! dashboard, then the SIP trunk. The process then serves one call at a
//! time until interrupted.

mod app;
mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use voxgate_access_store::AccessStore;
use voxgate_agent_core::{builtin_registry, TaskRegistry};
use voxgate_call_engine::CallLogLayer;
use voxgate_sip_trunk::{probe_public_address, SipTrunk, TrunkConfig};
use voxgate_web_console::ConsoleState;

use crate::app::AppHandler;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(CallLogLayer::new())
        .init();

    let config = Config::from_env()?;
    info!(server = %config.sip_server, "voxgate starting");

    let store = AccessStore::open(&config.database_path)
        .await
        .context("opening access store")?;

    // Public address: configuration wins, STUN is the fallback.
    let public_ip = match config.public_ip {
        Some(ip) => ip,
        None => probe_public_address(&config.stun_servers)
            .await
            .context("no VOX_PUBLIC_IP and every STUN probe failed")?,
    };
    info!(public_ip = %public_ip, "public address resolved");

    let registry = Arc::new(builtin_registry());
    let tasks = TaskRegistry::new();
    let (events, _) = tokio::sync::broadcast::channel(256);

    let console = ConsoleState {
        store,
        registry,
        tasks,
        events,
        active_call: Arc::new(tokio::sync::RwLock::new(None)),
        status: Arc::new(tokio::sync::RwLock::new(Default::default())),
    };
    let _status_tracker = console.spawn_status_tracker();

    let dashboard = {
        let state = console.clone();
        let addr = config.dashboard_addr;
        tokio::spawn(async move {
            if let Err(e) = voxgate_web_console::serve(addr, state).await {
                tracing::error!(error = %e, "dashboard server failed");
            }
        })
    };

    let handler = Arc::new(AppHandler::new(
        console,
        config.ai.clone(),
        config.unlock_code.clone(),
    ));
    let trunk_config = TrunkConfig {
        server_host: config.sip_server.clone(),
        server_port: config.sip_port,
        username: config.sip_user.clone(),
        password: config.sip_password.clone(),
        public_ip,
        local_sip_port: config.sip_local_port,
        media_port_min: config.media_port_min,
        media_port_max: config.media_port_max,
        user_agent: format!("voxgate/{}", env!("CARGO_PKG_VERSION")),
    };
    let trunk = Arc::new(
        SipTrunk::start(trunk_config, handler.clone())
            .await
            .context("starting SIP trunk")?,
    );
    handler.attach_trunk(trunk.clone());

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    dashboard.abort();
    trunk.shutdown().await;
    Ok(())
}
