use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the data-access layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("unknown category ids: {0:?}")]
    UnknownCategories(Vec<i64>),
    #[error("category {id} is still assigned to {players} player(s)")]
    CategoryInUse { id: i64, players: u64 },
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl StoreError {
    pub fn category(id: i64) -> Self {
        StoreError::NotFound {
            entity: "category",
            id,
        }
    }

    pub fn player(id: i32) -> Self {
        StoreError::NotFound {
            entity: "player",
            id: id.into(),
        }
    }

    /// Whether the store itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Db(DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::UnknownCategories(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::CategoryInUse { .. } => StatusCode::CONFLICT,
            StoreError::Db(_) if self.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A write referenced a row that does not exist, or a delete would orphan one.
pub(crate) fn is_foreign_key_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
