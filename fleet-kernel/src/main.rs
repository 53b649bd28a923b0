/**
 * FLEET KERNEL - Entry point of the shutdown tracker server
 *
 * ROLE: loads .env and kernel.yaml, seeds the demo fleet, wires the
 * probe, lifecycle service, auth and health tracker into the HTTP router,
 * then serves until Ctrl-C.
 */

use anyhow::Context;
use fleet_kernel::auth::Auth;
use fleet_kernel::config::load_config;
use fleet_kernel::demo::demo_rows;
use fleet_kernel::health::HealthTracker;
use fleet_kernel::http::{build_router, AppState};
use fleet_kernel::probe::CommandProbe;
use fleet_kernel::state::new_state;
use fleet_kernel::{Fleet, Inventory};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // .env is optional

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleet_kernel=info")),
        )
        .init();

    let cfg = load_config().await;

    let mut inventory = Inventory::new();
    if cfg.demo.servers > 0 {
        let seeded = inventory.init(demo_rows(cfg.demo.servers));
        info!(seeded, "demo fleet loaded");
    }
    let inventory = new_state(inventory);

    let probe = CommandProbe::from_template(&cfg.probe.command)
        .with_context(|| format!("invalid probe.command `{}`", cfg.probe.command))?;
    let fleet = Fleet::new(inventory, Arc::new(probe))
        .with_probe_timeout(cfg.probe.timeout())
        .with_gate_policy(cfg.sequence_gate);
    info!(gate = ?cfg.sequence_gate, command = %cfg.probe.command, "fleet service ready");

    let app_state = AppState {
        fleet,
        auth: Auth::from_env(cfg.auth.session_ttl()),
        health: HealthTracker::new(),
    };
    let app = build_router(app_state);

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("cannot bind {}", cfg.listen))?;
    info!("listening on http://{}", cfg.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c handler failed, running until killed");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
