//! HTTP tests for the cached catalogue routes: read-through caching, write
//! invalidation and storage error mapping.

use axum::http::StatusCode;
use motorway_test_utils::{
    fixtures, new_entity_id, Auction, AuctionStatus, Car, Service, StorageError, StoreOp,
    TestCatalog,
};

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::test_app;

fn cars_only(cars: Vec<Car>) -> TestCatalog {
    TestCatalog::new(Vec::<Service>::new(), cars, Vec::<Auction>::new())
}

// ============================================================================
// READS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_list_is_served_from_cache() {
    let app = test_app(fixtures::sample_catalog());

    let (status, first) = app.get("/api/cars").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first.as_array().map(Vec::len), Some(3));

    let (status, second) = app.get("/api/cars").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(app.catalog.cars.calls(StoreOp::List), 1);
}

#[tokio::test(start_paused = true)]
async fn test_get_by_id_caches_hits_and_misses() {
    let car = fixtures::car("suv");
    let app = test_app(cars_only(vec![car.clone()]));

    let (status, body) = app.get(&format!("/api/cars/{}", car.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], car.id.to_string());
    assert_eq!(body["category"], "suv");

    let missing = new_entity_id();
    for _ in 0..2 {
        let (status, body) = app.get(&format!("/api/cars/{}", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "ENTITY_NOT_FOUND");
    }

    app.get(&format!("/api/cars/{}", car.id)).await;
    assert_eq!(app.catalog.cars.calls(StoreOp::Get), 2);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_id_is_rejected_before_storage() {
    let app = test_app(fixtures::sample_catalog());

    let (status, body) = app.get("/api/cars/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");
    assert_eq!(app.catalog.cars.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_grouped_routes_follow_grouping_attribute() {
    let app = test_app(fixtures::sample_catalog());

    let (status, suvs) = app.get("/api/cars/category/suv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suvs.as_array().map(Vec::len), Some(2));

    let (status, live) = app.get("/api/auctions/status/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live.as_array().map(Vec::len), Some(1));
    assert_eq!(live[0]["status"], "live");

    let (status, detailing) = app.get("/api/services/category/detailing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detailing.as_array().map(Vec::len), Some(1));

    let (status, none) = app.get("/api/cars/category/convertible").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(none.as_array().map(Vec::len), Some(0));
}

// ============================================================================
// WRITES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_put_new_entity_invalidates_list_and_group() -> Result<(), serde_json::Error> {
    let app = test_app(fixtures::sample_catalog());
    app.get("/api/cars").await;
    app.get("/api/cars/category/estate").await;

    let estate = fixtures::car("estate");
    let (status, body) = app
        .put(&format!("/api/cars/{}", estate.id), serde_json::to_value(&estate)?)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], estate.id.to_string());

    let (_, list) = app.get("/api/cars").await;
    assert_eq!(list.as_array().map(Vec::len), Some(4));
    let (_, group) = app.get("/api/cars/category/estate").await;
    assert_eq!(group.as_array().map(Vec::len), Some(1));

    assert_eq!(app.catalog.cars.calls(StoreOp::List), 2);
    assert_eq!(app.catalog.cars.calls(StoreOp::ListByGroup), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_moving_category_invalidates_old_and_new_groups_only() -> Result<(), serde_json::Error>
{
    let mut car = fixtures::car("suv");
    let app = test_app(cars_only(vec![car.clone(), fixtures::car("hatchback")]));

    app.get("/api/cars/category/suv").await;
    app.get("/api/cars/category/hatchback").await;
    app.get("/api/cars/category/estate").await;
    app.get(&format!("/api/cars/{}", car.id)).await;
    assert_eq!(app.catalog.cars.calls(StoreOp::ListByGroup), 3);

    car.category = "hatchback".to_string();
    let (status, _) = app
        .put(&format!("/api/cars/{}", car.id), serde_json::to_value(&car)?)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, suvs) = app.get("/api/cars/category/suv").await;
    let (_, hatchbacks) = app.get("/api/cars/category/hatchback").await;
    app.get("/api/cars/category/estate").await;
    assert_eq!(suvs.as_array().map(Vec::len), Some(0));
    assert_eq!(hatchbacks.as_array().map(Vec::len), Some(2));
    assert_eq!(app.catalog.cars.calls(StoreOp::ListByGroup), 5);

    let (_, fetched) = app.get(&format!("/api/cars/{}", car.id)).await;
    assert_eq!(fetched["category"], "hatchback");
    assert_eq!(app.catalog.cars.calls(StoreOp::Get), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_put_with_mismatched_id_is_rejected() -> Result<(), serde_json::Error> {
    let app = test_app(fixtures::sample_catalog());
    let car = fixtures::car("suv");

    let (status, body) = app
        .put(&format!("/api/cars/{}", new_entity_id()), serde_json::to_value(&car)?)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(app.catalog.cars.calls(StoreOp::Save), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_invalidates_and_reports_missing() {
    let auction = fixtures::auction(AuctionStatus::Live);
    let app = test_app(TestCatalog::new(
        Vec::<Service>::new(),
        Vec::<Car>::new(),
        vec![auction.clone()],
    ));
    let uri = format!("/api/auctions/{}", auction.id);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    let (_, live) = app.get("/api/auctions/status/live").await;
    assert_eq!(live.as_array().map(Vec::len), Some(1));

    let (status, body) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, serde_json::Value::Null);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, live) = app.get("/api/auctions/status/live").await;
    assert_eq!(live.as_array().map(Vec::len), Some(0));

    let (status, body) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");
}

// ============================================================================
// STORAGE FAILURES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_constraint_violation_is_not_retried() -> Result<(), serde_json::Error> {
    let app = test_app(fixtures::sample_catalog());
    app.catalog
        .cars
        .fail_next(StorageError::unique_violation("duplicate vin WVW123"));

    let car = fixtures::car("suv");
    let (status, body) = app
        .put(&format!("/api/cars/{}", car.id), serde_json::to_value(&car)?)
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONSTRAINT_VIOLATION");
    assert_eq!(body["details"]["storageCode"], "23505");
    assert_eq!(body["details"]["attempts"], 1);
    assert!(!body.to_string().contains("WVW123"));
    assert_eq!(app.catalog.cars.calls(StoreOp::Save), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_exhausts_retries_and_is_not_cached() {
    let app = test_app(fixtures::sample_catalog());
    app.catalog
        .cars
        .fail_always(StorageError::connection_failed("connection refused"));

    let (status, body) = app.get("/api/cars").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["details"]["storageCode"], "08006");
    assert_eq!(body["details"]["attempts"], 3);
    assert_eq!(app.catalog.cars.calls(StoreOp::List), 3);

    app.catalog.cars.heal();
    let (status, list) = app.get("/api/cars").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(3));
    assert_eq!(app.catalog.cars.calls(StoreOp::List), 4);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_within_attempts() {
    let app = test_app(fixtures::sample_catalog());
    app.catalog
        .services
        .fail_times(2, StorageError::timeout("statement timeout"));

    let (status, list) = app.get("/api/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(2));
    assert_eq!(app.catalog.services.calls(StoreOp::List), 3);
}
