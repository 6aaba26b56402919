pub mod categories;
pub mod config;
pub mod entities;
pub mod error;
pub mod players;
pub mod socket;

#[cfg(test)]
mod test_logger;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::Context;
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::config::Cli;

pub struct AppState {
    pub db: DatabaseConnection,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Health {
    pub ok: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Health>) {
    match storage::ping(&state.db).await {
        Ok(()) => (StatusCode::OK, Json(Health { ok: true })),
        Err(e) => {
            log::error!("health check failed: {e:#}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(Health { ok: false }))
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(socket::ws_handler))
        .merge(categories::routes())
        .merge(players::routes())
        .with_state(state)
}

/// Connect to the store, bring the schema up to date and build the router.
pub async fn setup(cli: &Cli) -> anyhow::Result<Router> {
    let db = storage::connect(&cli.pool_settings()).await?;
    Migrator::up(&db, None)
        .await
        .context("failed to run migrations")?;
    log::info!("schema is up to date");
    Ok(app(Arc::new(AppState { db })))
}

#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    let db = storage::connect(&storage::PoolSettings::default())
        .await
        .unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}
