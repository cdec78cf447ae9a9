mod api;
mod config;
mod engine;
mod error;
mod ledger;
mod seed;
mod session;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::engine::SettlementEngine;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::session::SessionStore;
use crate::state::SiteStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- In-memory site state ---
    let store = SiteStore::new(seed::default_currency());
    seed::seed_site(&store);
    info!(
        options = store.all_options().len(),
        streams = store.streams().len(),
        "site state seeded"
    );

    // --- Accounts, sessions, ledger ---
    let sessions = SessionStore::new(cfg.admin_username.clone(), cfg.admin_password.clone());
    let ledger = Ledger::new();
    seed::seed_accounts(&sessions, &ledger)?;

    // --- Settlement engine: single writer for bets, transactions, balances ---
    let health = Arc::new(HealthState::new());
    let (engine, handle) =
        SettlementEngine::new(Arc::clone(&store), Arc::clone(&ledger), Arc::clone(&health));
    tokio::spawn(async move { engine.run().await });

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        sessions,
        ledger,
        engine: handle,
        health,
        auth_delay_ms: cfg.auth_delay_ms,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
