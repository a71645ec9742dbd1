// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facility API routes.

use crate::error::{AppError, Result};
use crate::models::amenity::ClosestAmenityResponse;
use crate::models::category::UnknownCategory;
use crate::models::{
    AmenityCategory, AmenityResponse, AmenityUpdate, BuildingResponse, BuildingUpdate,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/buildings", get(list_buildings))
        .route("/api/buildings/geojson", get(buildings_geojson))
        .route(
            "/api/buildings/{id}",
            get(get_building).patch(update_building).delete(delete_building),
        )
        .route("/api/buildings/{id}/amenity", get(get_building_amenity))
        .route(
            "/api/buildings/{id}/closest-amenity",
            get(get_closest_amenity),
        )
        .route("/api/amenities", get(list_amenities))
        .route("/api/amenities/geojson", get(amenities_geojson))
        .route(
            "/api/amenities/{id}",
            get(get_amenity).patch(update_amenity).delete(delete_amenity),
        )
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid id '{}'", raw)))
}

fn building_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Building {} not found", id))
}

fn amenity_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Amenity {} not found", id))
}

// ─── Buildings ───────────────────────────────────────────────

/// All buildings with their assigned amenity.
async fn list_buildings(State(state): State<Arc<AppState>>) -> Result<Json<Vec<BuildingResponse>>> {
    let buildings = state.facilities.get_buildings().await?;
    Ok(Json(buildings.iter().map(BuildingResponse::from).collect()))
}

/// All buildings as a GeoJSON FeatureCollection.
async fn buildings_geojson(
    State(state): State<Arc<AppState>>,
) -> Result<Json<geojson::FeatureCollection>> {
    let buildings = state.facilities.get_buildings().await?;
    Ok(Json(buildings.iter().map(|b| b.to_feature()).collect()))
}

async fn get_building(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BuildingResponse>> {
    let id = parse_id(&id)?;
    let building = state
        .facilities
        .get_building(id)
        .await?
        .ok_or_else(|| building_not_found(id))?;
    Ok(Json(BuildingResponse::from(&building)))
}

async fn update_building(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<BuildingUpdate>,
) -> Result<Json<BuildingResponse>> {
    let id = parse_id(&id)?;
    update.validate()?;
    let building = state
        .facilities
        .update_building(id, &update)
        .await?
        .ok_or_else(|| building_not_found(id))?;
    Ok(Json(BuildingResponse::from(&building)))
}

async fn delete_building(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    if !state.facilities.delete_building(id).await? {
        return Err(building_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The building's assigned (or contained) amenity.
async fn get_building_amenity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AmenityResponse>> {
    let id = parse_id(&id)?;
    let amenity = state
        .assignment
        .get_building_amenity(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No amenity found for building {}", id)))?;
    Ok(Json(AmenityResponse::from(&amenity)))
}

#[derive(Deserialize)]
struct ClosestAmenityQuery {
    /// Category label ("Food and Drink") or slug ("food_and_drink")
    category: String,
}

/// Nearest amenity of a category, with its distance.
async fn get_closest_amenity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ClosestAmenityQuery>,
) -> Result<Json<ClosestAmenityResponse>> {
    let id = parse_id(&id)?;
    let category: AmenityCategory = params
        .category
        .parse()
        .map_err(|e: UnknownCategory| AppError::BadRequest(e.to_string()))?;

    let closest = state
        .assignment
        .get_closest_amenity(id, category)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No '{}' amenity within range of building {}",
                category, id
            ))
        })?;

    Ok(Json(ClosestAmenityResponse {
        building_id: id,
        category,
        amenity: AmenityResponse::from(&closest.amenity),
        distance_meters: closest.distance_meters,
    }))
}

// ─── Amenities ───────────────────────────────────────────────

async fn list_amenities(State(state): State<Arc<AppState>>) -> Result<Json<Vec<AmenityResponse>>> {
    let amenities = state.facilities.get_amenities().await?;
    Ok(Json(amenities.iter().map(AmenityResponse::from).collect()))
}

async fn amenities_geojson(
    State(state): State<Arc<AppState>>,
) -> Result<Json<geojson::FeatureCollection>> {
    let amenities = state.facilities.get_amenities().await?;
    Ok(Json(amenities.iter().map(|a| a.to_feature()).collect()))
}

async fn get_amenity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AmenityResponse>> {
    let id = parse_id(&id)?;
    let amenity = state
        .facilities
        .get_amenity(id)
        .await?
        .ok_or_else(|| amenity_not_found(id))?;
    Ok(Json(AmenityResponse::from(&amenity)))
}

async fn update_amenity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<AmenityUpdate>,
) -> Result<Json<AmenityResponse>> {
    let id = parse_id(&id)?;
    update.validate()?;
    let amenity = state
        .facilities
        .update_amenity(id, &update)
        .await?
        .ok_or_else(|| amenity_not_found(id))?;
    Ok(Json(AmenityResponse::from(&amenity)))
}

async fn delete_amenity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    if !state.facilities.delete_amenity(id).await? {
        return Err(amenity_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
