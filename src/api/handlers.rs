// HTTP request handlers for API endpoints

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::api::server::ApiSettings;
use crate::database_ops::db::Db;
use crate::database_ops::directory::{
    self, CategoryEntry, CategoryScope, PlaceDetail, PlaceNames,
};
use crate::database_ops::filters::NameFilter;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

/// Render a handler outcome; failures are logged and wrapped in the error envelope.
fn respond<T: Serialize>(
    endpoint: &str,
    settings: &ApiSettings,
    result: Result<ApiResponse<T>, ApiError>,
) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(err) => {
            err.log(endpoint);
            err.to_response(settings.legacy_error_status)
        }
    }
}

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> HttpResponse {
    let database = if db.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Subcategories grouped per category, or aggregated over a category list.
pub async fn get_categories(
    query: web::Query<CategoriesQuery>,
    db: web::Data<Db>,
    settings: web::Data<ApiSettings>,
) -> HttpResponse {
    let result = load_categories(&query, &db, &settings).await;
    respond("get_categories", &settings, result)
}

async fn load_categories(
    query: &CategoriesQuery,
    db: &Db,
    settings: &ApiSettings,
) -> Result<ApiResponse<CategoryEntry>, ApiError> {
    let scope = CategoryScope::parse(query.categories.as_deref());
    scope
        .filter()
        .validate("categories", settings.max_filter_values)?;

    tracing::info!(?scope, "categories requested");
    let mut conn = db.pool.acquire().await?;
    let listing = directory::categories(&mut conn, &scope).await?;
    Ok(listing.into())
}

/// Distinct place names matching the category/subcategory filters.
pub async fn get_places(
    query: web::Query<PlacesQuery>,
    db: web::Data<Db>,
    settings: web::Data<ApiSettings>,
) -> HttpResponse {
    let result = load_places(&query, &db, &settings).await;
    respond("get_places", &settings, result)
}

async fn load_places(
    query: &PlacesQuery,
    db: &Db,
    settings: &ApiSettings,
) -> Result<ApiResponse<PlaceNames>, ApiError> {
    let categories = NameFilter::parse(query.categories.as_deref());
    let subcategories = NameFilter::parse(query.subcategories.as_deref());
    categories.validate("categories", settings.max_filter_values)?;
    subcategories.validate("subcategories", settings.max_filter_values)?;

    tracing::info!(?categories, ?subcategories, "places requested");
    let mut conn = db.pool.acquire().await?;
    let listing = directory::places(&mut conn, &categories, &subcategories).await?;
    Ok(listing.into())
}

/// Full records for places, one object per place/category/subcategory row.
pub async fn get_info_place(
    query: web::Query<PlaceInfoQuery>,
    db: web::Data<Db>,
    settings: web::Data<ApiSettings>,
) -> HttpResponse {
    let result = load_place_info(&query, &db, &settings).await;
    respond("get_info_place", &settings, result)
}

async fn load_place_info(
    query: &PlaceInfoQuery,
    db: &Db,
    settings: &ApiSettings,
) -> Result<ApiResponse<PlaceDetail>, ApiError> {
    let places = NameFilter::parse(query.places.as_deref());
    let categories = NameFilter::parse(query.categories.as_deref());
    let subcategories = NameFilter::parse(query.subcategories.as_deref());
    places.validate("places", settings.max_filter_values)?;
    categories.validate("categories", settings.max_filter_values)?;
    subcategories.validate("subcategories", settings.max_filter_values)?;

    tracing::info!(?places, ?categories, ?subcategories, "place info requested");
    let mut conn = db.pool.acquire().await?;
    let listing =
        directory::place_details(&mut conn, &places, &categories, &subcategories).await?;
    Ok(listing.into())
}

/// Fallback for unknown routes.
pub async fn not_found(req: HttpRequest, settings: web::Data<ApiSettings>) -> HttpResponse {
    let err = ApiError::NotFound(format!("no route for {} {}", req.method(), req.path()));
    err.log("not_found");
    err.to_response(settings.legacy_error_status)
}
