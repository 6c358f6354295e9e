//! Raffle storefront server entry point.
//!
//! Serves the public raffle catalog and ticket purchases plus the admin API
//! over a SQLite (or in-memory) store, and runs a background sweeper for
//! session expiry and optional date-driven status changes.

mod admin;
mod api;
mod auth;
mod config;
mod db;
mod errors;
mod store;
mod sweeper;

use std::sync::Arc;

use raffle_core::sample;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::AppState;
use config::{Config, StoreBackend};
use db::SqliteStore;
use store::{MemoryStore, RaffleStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    let store = open_store(&config).await?;

    if config.seed_sample_data && seed_if_empty(store.as_ref()).await? {
        info!("Seeded sample raffles into an empty store");
    }

    let state = Arc::new(AppState::new(store, config.clone()));
    let cancel = CancellationToken::new();

    // ─── Background sweeper ───────────────────────────────
    let sweeper = tokio::spawn(sweeper::run(state.clone(), cancel.clone()));

    // ─── REST API ─────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API listening on http://{addr}");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        shutdown.cancel();
    });

    serve(listener, state, cancel).await?;
    sweeper.await?;
    Ok(())
}

async fn open_store(config: &Config) -> errors::Result<Arc<dyn RaffleStore>> {
    let store: Arc<dyn RaffleStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            info!("Using SQLite store at {}", config.database_url);
            Arc::new(SqliteStore::connect(&config.database_url, 5).await?)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Import the sample catalog unless the store already holds raffles.
async fn seed_if_empty(store: &dyn RaffleStore) -> errors::Result<bool> {
    if !store.list_raffles().await?.is_empty() {
        return Ok(false);
    }
    store
        .import(sample::raffles(), sample::participants())
        .await?;
    Ok(true)
}

/// Serve the API on `listener` until `cancel` fires.
async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn seeding_happens_once() {
        let store = MemoryStore::new();
        assert!(seed_if_empty(&store).await.unwrap());
        assert!(!seed_if_empty(&store).await.unwrap());
        assert_eq!(store.list_raffles().await.unwrap().len(), 3);
        assert_eq!(store.list_participants().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn end_to_end_over_tcp() {
        let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
        seed_if_empty(&store).await.unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(store),
            api::tests::test_config(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, state, cancel.clone()));

        let client = reqwest::Client::new();
        let health: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let bought = client
            .post(format!("{base}/raffles/2/purchases"))
            .json(&json!({
                "name": "Sofía Ruiz",
                "email": "sofia@email.com",
                "phone": "+54 11 7777-8888",
                "numbers": [1, 2],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(bought.status(), reqwest::StatusCode::CREATED);

        let login: Value = client
            .post(format!("{base}/admin/login"))
            .json(&json!({ "username": "admin", "password": "admin123" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = login["token"].as_str().unwrap();

        let report: Value = client
            .get(format!("{base}/admin/raffles/2/reconciliation"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["recorded_sold"], 236);
        assert_eq!(report["actual_sold"], 6);

        drop(client);
        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
