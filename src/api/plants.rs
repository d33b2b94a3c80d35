use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{Account, CreatePlantRequest, PlantListResponse, PlantResponse, SuccessResponse};
use crate::plants::NewPlant;
use crate::AppState;

/// Plant ids that do not parse are reported like ids that do not exist
fn plant_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::not_found("Plant not found"))
}

/// List all plants owned by the caller
pub async fn list_plants(
    State(state): State<Arc<AppState>>,
    account: Account,
) -> Result<Json<PlantListResponse>, ApiError> {
    let plants = state.plants.list(&account).await?;
    Ok(Json(PlantListResponse {
        plants: plants.into_iter().map(PlantResponse::from).collect(),
    }))
}

/// Get a single plant by ID
pub async fn get_plant(
    State(state): State<Arc<AppState>>,
    account: Account,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<PlantResponse>, ApiError> {
    let id = plant_id(id)?;
    let plant = state.plants.get(&account, id).await?;
    Ok(Json(plant.into()))
}

/// Create a plant from a name, a watering cycle and a data URI image
pub async fn create_plant(
    State(state): State<Arc<AppState>>,
    account: Account,
    payload: Result<Json<CreatePlantRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlantResponse>), ApiError> {
    let Json(req) = payload?;
    let new_plant = NewPlant::from_parts(req.watering_time, req.name, req.image, req.plant_tag)?;

    let plant = state.plants.create(&account, new_plant).await?;
    Ok((StatusCode::CREATED, Json(plant.into())))
}

/// Delete a plant and its image
pub async fn remove_plant(
    State(state): State<Arc<AppState>>,
    account: Account,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = plant_id(id)?;
    state.plants.remove(&account, id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Mark a plant as watered, restarting its cycle
pub async fn water_plant(
    State(state): State<Arc<AppState>>,
    account: Account,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<PlantResponse>, ApiError> {
    let id = plant_id(id)?;
    let plant = state.plants.reset_cycle(&account, id).await?;
    Ok(Json(plant.into()))
}
