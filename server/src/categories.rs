//! Category records and their HTTP handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, Condition, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;

use crate::AppState;
use crate::entities::{categories, player_category, players};
use crate::error::{StoreError, is_foreign_key_violation};
use crate::players::{self as player_store, Player};

pub type Category = categories::Model;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub logo_url: String,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub logo_url: Option<String>,
}

impl CategoryChanges {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.logo_url.is_none()
    }
}

pub async fn create(db: &DatabaseConnection, new: NewCategory) -> Result<Category, StoreError> {
    let active = categories::ActiveModel {
        name: Set(new.name),
        logo_url: Set(new.logo_url),
        ..Default::default()
    };
    let category = active.insert(db).await?;
    log::debug!("created category {}", category.id);
    Ok(category)
}

pub async fn get(db: &DatabaseConnection, id: i64) -> Result<Category, StoreError> {
    categories::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(StoreError::category(id))
}

pub async fn list(db: &DatabaseConnection) -> Result<Vec<Category>, StoreError> {
    let all = categories::Entity::find()
        .order_by_asc(categories::Column::Id)
        .all(db)
        .await?;
    Ok(all)
}

pub async fn update(
    db: &DatabaseConnection,
    id: i64,
    changes: CategoryChanges,
) -> Result<Category, StoreError> {
    let current = get(db, id).await?;
    if changes.is_empty() {
        return Ok(current);
    }
    let mut active = current.into_active_model();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(logo_url) = changes.logo_url {
        active.logo_url = Set(logo_url);
    }
    let category = active.update(db).await?;
    log::debug!("updated category {id}");
    Ok(category)
}

/// Delete a category. Refused while any player still references it.
pub async fn delete(db: &DatabaseConnection, id: i64) -> Result<(), StoreError> {
    let category = get(db, id).await?;
    let players = assigned_players(db, id).await?;
    if players > 0 {
        log::warn!("refusing to delete category {id}: assigned to {players} player(s)");
        return Err(StoreError::CategoryInUse { id, players });
    }
    delete_unassigned(db, category).await
}

/// Remove a category the caller found unassigned. The foreign key still
/// guards against a player picking it up in the meantime.
async fn delete_unassigned(db: &DatabaseConnection, category: Category) -> Result<(), StoreError> {
    let id = category.id;
    match category.delete(db).await {
        Ok(_) => {
            log::debug!("deleted category {id}");
            Ok(())
        }
        Err(e) if is_foreign_key_violation(&e) => {
            let players = assigned_players(db, id).await?;
            log::warn!("refusing to delete category {id}: assigned to {players} player(s)");
            Err(StoreError::CategoryInUse { id, players })
        }
        Err(e) => Err(e.into()),
    }
}

/// Every player holding the category, each with its full category set.
pub async fn players_in(db: &DatabaseConnection, id: i64) -> Result<Vec<Player>, StoreError> {
    let category = get(db, id).await?;
    let ids: Vec<i32> = category
        .find_related(players::Entity)
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found =
        player_store::find_eager(db, Condition::all().add(players::Column::Id.is_in(ids))).await?;
    Ok(found)
}

async fn assigned_players(db: &DatabaseConnection, id: i64) -> Result<u64, StoreError> {
    let count = player_category::Entity::find()
        .filter(player_category::Column::CategoryId.eq(id))
        .count(db)
        .await?;
    Ok(count)
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", routing::get(list_handler).post(create_handler))
        .route(
            "/categories/:id",
            routing::get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .route("/categories/:id/players", routing::get(players_handler))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Category>>, StoreError> {
    Ok(Json(list(&state.db).await?))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), StoreError> {
    let category = create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_handler(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Category>, StoreError> {
    Ok(Json(get(&state.db, id).await?))
}

async fn update_handler(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CategoryChanges>,
) -> Result<Json<Category>, StoreError> {
    Ok(Json(update(&state.db, id, payload).await?))
}

async fn delete_handler(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, StoreError> {
    delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn players_handler(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Player>>, StoreError> {
    Ok(Json(players_in(&state.db, id).await?))
}
