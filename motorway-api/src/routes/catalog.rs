//! Generic catalogue routes for the cached entity families.
//!
//! Reads go through the [`CacheManager`]'s memoized reads. Writes go straight
//! to the store through the shared retry executor and, once they succeed,
//! invalidate the caches the write may have made stale.
//!
//! # Routes Created
//!
//! - `GET /` - List every entity
//! - `GET /:id` - Get entity by ID
//! - `PUT /:id` - Create or replace entity
//! - `DELETE /:id` - Delete entity
//! - `GET /{category|status}/:group` - Entities in one group
//!
//! [`CacheManager`]: motorway_cache::CacheManager

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use motorway_cache::{CachedEntity, CatalogStores, EntityStore};
use motorway_core::{Auction, Car, EntityId, Service};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{ApiError, ApiResult, CachedResultExt},
    extractors::PathId,
    state::AppState,
};

// ============================================================================
// RESOURCE TRAIT
// ============================================================================

/// A cached entity family exposed over HTTP.
pub trait CatalogResource: CachedEntity + Serialize + DeserializeOwned {
    /// Storage collaborator that write paths use.
    fn store(stores: &CatalogStores) -> Arc<dyn EntityStore<Self>>;
}

impl CatalogResource for Service {
    fn store(stores: &CatalogStores) -> Arc<dyn EntityStore<Self>> {
        Arc::clone(&stores.services)
    }
}

impl CatalogResource for Car {
    fn store(stores: &CatalogStores) -> Arc<dyn EntityStore<Self>> {
        Arc::clone(&stores.cars)
    }
}

impl CatalogResource for Auction {
    fn store(stores: &CatalogStores) -> Arc<dyn EntityStore<Self>> {
        Arc::clone(&stores.auctions)
    }
}

// ============================================================================
// ROUTE FACTORY
// ============================================================================

/// Create the catalogue router for `T`. The grouped route is named after
/// the family's grouping attribute.
pub fn catalog_routes<T: CatalogResource>() -> Router<AppState> {
    let group_route = format!("/{}/:group", T::kind().group_attribute());

    Router::new()
        .route("/", get(list_route::<T>))
        .route(
            "/:id",
            get(get_route::<T>)
                .put(upsert_route::<T>)
                .delete(delete_route::<T>),
        )
        .route(&group_route, get(group_route_handler::<T>))
}

// ============================================================================
// READ HANDLERS
// ============================================================================

async fn list_route<T: CatalogResource>(State(state): State<AppState>) -> ApiResult<Json<Vec<T>>> {
    state
        .cache
        .caches::<T>()
        .all()
        .await
        .into_api_result()
        .map(Json)
}

async fn get_route<T: CatalogResource>(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<Json<T>> {
    state
        .cache
        .caches::<T>()
        .get(id)
        .await
        .into_api_result()?
        .map(Json)
        .ok_or_else(|| ApiError::entity_not_found(T::kind().as_str(), id))
}

async fn group_route_handler<T: CatalogResource>(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> ApiResult<Json<Vec<T>>> {
    state
        .cache
        .caches::<T>()
        .by_group(&group)
        .await
        .into_api_result()
        .map(Json)
}

// ============================================================================
// WRITE HANDLERS
// ============================================================================

/// PUT /:id - 201 when the entity is new, 200 when it replaced one.
async fn upsert_route<T: CatalogResource>(
    State(state): State<AppState>,
    PathId(id): PathId,
    Json(entity): Json<T>,
) -> ApiResult<(StatusCode, Json<T>)> {
    if entity.id() != id {
        return Err(ApiError::invalid_input(format!(
            "Body id {} does not match path id {}",
            entity.id(),
            id
        )));
    }

    let store = T::store(&state.stores);
    let label = format!("{}.save", T::kind().plural());
    let previous = state
        .cache
        .retry_executor()
        .run(&label, || {
            let store = Arc::clone(&store);
            let entity = entity.clone();
            async move { store.save(entity).await }
        })
        .await
        .into_api_result()?;

    state.cache.invalidate::<T>(
        Some(id),
        previous.as_ref().map(|prev| prev.group()),
        Some(entity.group()),
    );

    let status = if previous.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(entity)))
}

/// DELETE /:id - 204, or 404 when nothing was stored under the id.
async fn delete_route<T: CatalogResource>(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<StatusCode> {
    let removed = delete_entity::<T>(&state, id).await?;

    match removed {
        Some(entity) => {
            state
                .cache
                .invalidate::<T>(Some(id), Some(entity.group()), None);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::entity_not_found(T::kind().as_str(), id)),
    }
}

async fn delete_entity<T: CatalogResource>(state: &AppState, id: EntityId) -> ApiResult<Option<T>> {
    let store = T::store(&state.stores);
    let label = format!("{}.delete", T::kind().plural());
    state
        .cache
        .retry_executor()
        .run(&label, || {
            let store = Arc::clone(&store);
            async move { store.delete(id).await }
        })
        .await
        .into_api_result()
}
