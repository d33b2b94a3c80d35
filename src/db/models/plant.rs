//! Plant models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Asset, AssetResponse};

#[derive(Debug, Clone, FromRow)]
pub struct Plant {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub plant_tag: Option<String>,
    /// Watering cycle length in milliseconds
    pub watering_time: f64,
    /// Milliseconds since `start_time`, as of the last recalculation
    pub time_elapsed: f64,
    pub start_time: String,
    pub watering_date: String,
    pub creation_date: String,
}

/// A plant together with its image
#[derive(Debug, Clone)]
pub struct PlantWithAsset {
    pub plant: Plant,
    pub asset: Asset,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePlantRequest {
    #[serde(default)]
    pub watering_time: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub plant_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantResponse {
    pub id: i64,
    pub user_id: i64,
    pub watering_time: f64,
    pub name: String,
    pub time_elapsed: f64,
    pub start_time: String,
    pub watering_date: String,
    pub creation_date: String,
    pub image: AssetResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_tag: Option<String>,
}

impl From<PlantWithAsset> for PlantResponse {
    fn from(record: PlantWithAsset) -> Self {
        let image = AssetResponse::from(&record.asset);
        let plant = record.plant;
        Self {
            id: plant.id,
            user_id: plant.user_id,
            watering_time: plant.watering_time,
            name: plant.name,
            time_elapsed: plant.time_elapsed,
            start_time: plant.start_time,
            watering_date: plant.watering_date,
            creation_date: plant.creation_date,
            image,
            plant_tag: plant.plant_tag,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantListResponse {
    pub plants: Vec<PlantResponse>,
}
