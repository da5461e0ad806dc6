//! 閲覧 API（/api/listings）

mod common;

use axum::http::StatusCode;
use common::{spawn_app, TestApp};

async fn seed(app: &TestApp, table: &str, brand: &str, city: &str, created_at_ms: i64) {
    sqlx::query(&format!(
        "INSERT INTO {} (brand, model, year, price, city, created_at_ms) VALUES (?, ?, ?, ?, ?, ?)",
        table
    ))
    .bind(brand)
    .bind("Base")
    .bind(2019_i64)
    .bind(450_000_i64)
    .bind(city)
    .bind(created_at_ms)
    .execute(&app.state.db)
    .await
    .unwrap();
}

#[tokio::test]
async fn health_reports_ok() {
    let app = spawn_app().await;
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn lists_newest_first_and_filters_by_city() {
    let app = spawn_app().await;
    seed(&app, "car_buyer_listings", "Maruti", "Pune", 1_000).await;
    seed(&app, "car_buyer_listings", "Hyundai", "Mumbai", 2_000).await;
    seed(&app, "car_buyer_listings", "Tata", "pune", 3_000).await;
    seed(&app, "bike_buyer_listings", "Bajaj", "Pune", 4_000).await;

    let (status, body) = app.get("/api/listings/car").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    let brands: Vec<&str> = body["listings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["brand"].as_str().unwrap())
        .collect();
    assert_eq!(brands, vec!["Tata", "Hyundai", "Maruti"]);

    let (status, body) = app.get("/api/listings/car?city=Pune").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = app.get("/api/listings/bike?limit=1").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["listings"][0]["brand"], "Bajaj");
}

#[tokio::test]
async fn detail_returns_listing_or_404() {
    let app = spawn_app().await;
    seed(&app, "bike_buyer_listings", "Royal Enfield", "Goa", 1_000).await;

    let (status, body) = app.get("/api/listings/bike/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listing"]["brand"], "Royal Enfield");

    let (status, body) = app.get("/api/listings/car/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_vehicle_is_rejected() {
    let app = spawn_app().await;
    let (status, body) = app.get("/api/listings/truck").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("truck"));
}
