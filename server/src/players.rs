//! Player records. A player is always loaded together with its categories.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing,
};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::categories::Category;
use crate::entities::{categories, player_category, players};
use crate::error::{StoreError, is_foreign_key_violation};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i32,
    pub name: String,
    pub logo_url: String,
    /// Sorted by id, no duplicates.
    pub categories: Vec<Category>,
}

impl Player {
    fn assemble(model: players::Model, mut categories: Vec<Category>) -> Self {
        categories.sort_by_key(|c| c.id);
        categories.dedup_by_key(|c| c.id);
        Self {
            id: model.id,
            name: model.name,
            logo_url: model.logo_url,
            categories,
        }
    }

    pub fn category_ids(&self) -> Vec<i64> {
        self.categories.iter().map(|c| c.id).collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub name: String,
    pub logo_url: String,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

/// Partial update. `category_ids`, when present, replaces the whole set.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChanges {
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub category_ids: Option<Vec<i64>>,
}

/// Insert a player and its category links in one transaction. Nothing is
/// written when any category id is unknown.
pub async fn create(db: &DatabaseConnection, new: NewPlayer) -> Result<Player, StoreError> {
    let wanted: BTreeSet<i64> = new.category_ids.into_iter().collect();
    let txn = db.begin().await?;
    ensure_categories_exist(&txn, &wanted).await?;
    let model = players::ActiveModel {
        name: Set(new.name),
        logo_url: Set(new.logo_url),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    if let Err(e) = link(&txn, model.id, &wanted).await {
        txn.rollback().await?;
        return Err(narrow_unknown(db, &wanted, e).await);
    }
    txn.commit().await?;
    log::debug!("created player {} with categories {wanted:?}", model.id);
    get(db, model.id).await
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<Player, StoreError> {
    find_eager(db, Condition::all().add(players::Column::Id.eq(id)))
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::player(id))
}

pub async fn list(db: &DatabaseConnection) -> Result<Vec<Player>, StoreError> {
    Ok(find_eager(db, Condition::all()).await?)
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    changes: PlayerChanges,
) -> Result<Player, StoreError> {
    let txn = db.begin().await?;
    let current = players::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(StoreError::player(id))?;

    if changes.name.is_some() || changes.logo_url.is_some() {
        let mut active = current.into_active_model();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(logo_url) = changes.logo_url {
            active.logo_url = Set(logo_url);
        }
        active.update(&txn).await?;
    }

    if let Some(ids) = changes.category_ids {
        let wanted: BTreeSet<i64> = ids.into_iter().collect();
        ensure_categories_exist(&txn, &wanted).await?;
        unlink_all(&txn, id).await?;
        if let Err(e) = link(&txn, id, &wanted).await {
            txn.rollback().await?;
            return Err(narrow_unknown(db, &wanted, e).await);
        }
    }

    txn.commit().await?;
    log::debug!("updated player {id}");
    get(db, id).await
}

/// Assign one category. Assigning it twice is a no-op.
pub async fn add_category(
    db: &DatabaseConnection,
    player_id: i32,
    category_id: i64,
) -> Result<Player, StoreError> {
    ensure_player_exists(db, player_id).await?;
    let wanted = BTreeSet::from([category_id]);
    ensure_categories_exist(db, &wanted).await?;
    link(db, player_id, &wanted).await?;
    get(db, player_id).await
}

/// Drop one category from a player. Removing an unassigned category is a no-op.
pub async fn remove_category(
    db: &DatabaseConnection,
    player_id: i32,
    category_id: i64,
) -> Result<Player, StoreError> {
    ensure_player_exists(db, player_id).await?;
    player_category::Entity::delete_many()
        .filter(player_category::Column::PlayerId.eq(player_id))
        .filter(player_category::Column::CategoryId.eq(category_id))
        .exec(db)
        .await?;
    get(db, player_id).await
}

/// Delete a player together with its category links. Categories stay.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), StoreError> {
    let txn = db.begin().await?;
    unlink_all(&txn, id).await?;
    let res = players::Entity::delete_by_id(id).exec(&txn).await?;
    if res.rows_affected == 0 {
        txn.rollback().await?;
        return Err(StoreError::player(id));
    }
    txn.commit().await?;
    log::debug!("deleted player {id}");
    Ok(())
}

/// Players matching `filter`, ordered by id, categories resolved in the same
/// query.
pub(crate) async fn find_eager<C: ConnectionTrait>(
    conn: &C,
    filter: Condition,
) -> Result<Vec<Player>, DbErr> {
    let rows = players::Entity::find()
        .filter(filter)
        .order_by_asc(players::Column::Id)
        .find_with_related(categories::Entity)
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(model, categories)| Player::assemble(model, categories))
        .collect())
}

async fn ensure_player_exists<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), StoreError> {
    players::Entity::find_by_id(id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or(StoreError::player(id))
}

async fn ensure_categories_exist<C: ConnectionTrait>(
    conn: &C,
    ids: &BTreeSet<i64>,
) -> Result<(), StoreError> {
    if ids.is_empty() {
        return Ok(());
    }
    let found: BTreeSet<i64> = categories::Entity::find()
        .select_only()
        .column(categories::Column::Id)
        .filter(categories::Column::Id.is_in(ids.iter().copied()))
        .into_tuple::<i64>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    let missing: Vec<i64> = ids.difference(&found).copied().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::UnknownCategories(missing))
    }
}

/// Insert the player's links; existing ones are left alone. A category that
/// vanished since it was checked is reported as unknown.
async fn link<C: ConnectionTrait>(
    conn: &C,
    player_id: i32,
    ids: &BTreeSet<i64>,
) -> Result<(), StoreError> {
    if ids.is_empty() {
        return Ok(());
    }
    let rows = ids.iter().map(|&category_id| player_category::ActiveModel {
        player_id: Set(player_id),
        category_id: Set(category_id),
    });
    let res = player_category::Entity::insert_many(rows)
        .on_conflict(
            OnConflict::columns([
                player_category::Column::PlayerId,
                player_category::Column::CategoryId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await;
    match res {
        Ok(_) => Ok(()),
        Err(e) if is_foreign_key_violation(&e) => {
            Err(StoreError::UnknownCategories(ids.iter().copied().collect()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Pin down which of `wanted` are really gone once the failed transaction
/// has been rolled back.
async fn narrow_unknown(
    db: &DatabaseConnection,
    wanted: &BTreeSet<i64>,
    err: StoreError,
) -> StoreError {
    if !matches!(err, StoreError::UnknownCategories(_)) {
        return err;
    }
    match ensure_categories_exist(db, wanted).await {
        Err(narrowed) => narrowed,
        Ok(()) => err,
    }
}

async fn unlink_all<C: ConnectionTrait>(conn: &C, player_id: i32) -> Result<(), DbErr> {
    player_category::Entity::delete_many()
        .filter(player_category::Column::PlayerId.eq(player_id))
        .exec(conn)
        .await?;
    Ok(())
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/players", routing::get(list_handler).post(create_handler))
        .route(
            "/players/:id",
            routing::get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .route(
            "/players/:id/categories/:category_id",
            routing::put(add_category_handler).delete(remove_category_handler),
        )
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Player>>, StoreError> {
    Ok(Json(list(&state.db).await?))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPlayer>,
) -> Result<(StatusCode, Json<Player>), StoreError> {
    let player = create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

async fn get_handler(
    Path(id): Path<i32>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Player>, StoreError> {
    Ok(Json(get(&state.db, id).await?))
}

async fn update_handler(
    Path(id): Path<i32>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlayerChanges>,
) -> Result<Json<Player>, StoreError> {
    Ok(Json(update(&state.db, id, payload).await?))
}

async fn delete_handler(
    Path(id): Path<i32>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, StoreError> {
    delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_category_handler(
    Path((id, category_id)): Path<(i32, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Player>, StoreError> {
    Ok(Json(add_category(&state.db, id, category_id).await?))
}

async fn remove_category_handler(
    Path((id, category_id)): Path<(i32, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Player>, StoreError> {
    Ok(Json(remove_category(&state.db, id, category_id).await?))
}
