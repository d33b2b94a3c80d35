//! Plant records and their images.
//!
//! Every query is scoped by owner, so a plant belonging to someone else is
//! indistinguishable from one that does not exist.

pub mod asset;

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{format_timestamp, Account, Asset, DbPool, Plant, PlantWithAsset};
use crate::error::{Result, ServiceError};
use crate::storage::ObjectStore;
use asset::{decode_data_uri, generate_salt};

/// Fresh salts to try before giving up on finding an unused one
const SALT_ATTEMPTS: usize = 5;

/// Longest accepted watering cycle: one hundred years, in milliseconds
pub const MAX_WATERING_TIME_MS: f64 = 100.0 * 365.0 * 24.0 * 3600.0 * 1000.0;

/// Validated input for a new plant
#[derive(Debug, Clone)]
pub struct NewPlant {
    pub name: String,
    /// Watering cycle in milliseconds
    pub watering_time: f64,
    pub image: String,
    pub plant_tag: Option<String>,
}

impl NewPlant {
    /// Build from optional request fields, rejecting missing or malformed ones
    pub fn from_parts(
        watering_time: Option<f64>,
        name: Option<String>,
        image: Option<String>,
        plant_tag: Option<String>,
    ) -> Result<Self> {
        let watering_time =
            watering_time.ok_or_else(|| ServiceError::invalid_input("watering_time is required"))?;
        if !watering_time.is_finite() || watering_time <= 0.0 {
            return Err(ServiceError::invalid_input(
                "watering_time must be a positive number of milliseconds",
            ));
        }
        if watering_time > MAX_WATERING_TIME_MS {
            return Err(ServiceError::invalid_input(format!(
                "watering_time must not exceed {} milliseconds",
                MAX_WATERING_TIME_MS
            )));
        }

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ServiceError::invalid_input("name is required"))?;

        let image = image
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_input("image is required"))?;

        Ok(Self {
            name,
            watering_time,
            image,
            plant_tag: plant_tag.filter(|t| !t.is_empty()),
        })
    }
}

/// `start + watering_time` milliseconds, kept to microsecond precision
pub fn watering_date(start: DateTime<Utc>, watering_time: f64) -> Result<DateTime<Utc>> {
    let out_of_range = || ServiceError::invalid_input("watering_time is out of range");

    let micros = (watering_time * 1000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    start
        .checked_add_signed(Duration::microseconds(micros as i64))
        .ok_or_else(out_of_range)
}

/// Plant columns joined with its asset's, aliased to fit [`PlantAssetRow`]
const PLANT_WITH_ASSET: &str = r#"
    SELECT
        plants.id, plants.user_id, plants.name, plants.plant_tag, plants.watering_time,
        plants.time_elapsed, plants.start_time, plants.watering_date, plants.creation_date,
        assets.id AS asset_id, assets.base_url AS asset_base_url, assets.salt AS asset_salt,
        assets.extension AS asset_extension, assets.width AS asset_width,
        assets.height AS asset_height, assets.created_at AS asset_created_at
    FROM plants
    JOIN assets ON assets.plant_id = plants.id
"#;

#[derive(FromRow)]
struct PlantAssetRow {
    #[sqlx(flatten)]
    plant: Plant,
    asset_id: i64,
    asset_base_url: String,
    asset_salt: String,
    asset_extension: String,
    asset_width: i64,
    asset_height: i64,
    asset_created_at: String,
}

impl From<PlantAssetRow> for PlantWithAsset {
    fn from(row: PlantAssetRow) -> Self {
        let asset = Asset {
            id: row.asset_id,
            plant_id: row.plant.id,
            base_url: row.asset_base_url,
            salt: row.asset_salt,
            extension: row.asset_extension,
            width: row.asset_width,
            height: row.asset_height,
            created_at: row.asset_created_at,
        };
        PlantWithAsset {
            plant: row.plant,
            asset,
        }
    }
}

#[derive(Clone)]
pub struct PlantRepository {
    db: DbPool,
    storage: Arc<dyn ObjectStore>,
    base_url: String,
}

impl PlantRepository {
    pub fn new(db: DbPool, storage: Arc<dyn ObjectStore>, base_url: String) -> Self {
        Self {
            db,
            storage,
            base_url,
        }
    }

    /// All plants owned by `account`, oldest first
    pub async fn list(&self, account: &Account) -> Result<Vec<PlantWithAsset>> {
        let sql = format!("{} WHERE plants.user_id = ? ORDER BY plants.id ASC", PLANT_WITH_ASSET);
        let rows: Vec<PlantAssetRow> = sqlx::query_as(&sql)
            .bind(account.id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(PlantWithAsset::from).collect())
    }

    pub async fn get(&self, account: &Account, id: i64) -> Result<PlantWithAsset> {
        let sql = format!("{} WHERE plants.id = ? AND plants.user_id = ?", PLANT_WITH_ASSET);
        let row: Option<PlantAssetRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(account.id)
            .fetch_optional(&self.db)
            .await?;

        row.map(PlantWithAsset::from).ok_or_else(plant_not_found)
    }

    /// Create a plant and its image.
    ///
    /// The image is uploaded before anything is written, then the plant and
    /// asset rows are committed together. A failed commit leaves at worst an
    /// orphaned object in the bucket, which is cleaned up best-effort.
    pub async fn create(&self, account: &Account, new_plant: NewPlant) -> Result<PlantWithAsset> {
        let now = Utc::now();
        let due = watering_date(now, new_plant.watering_time)?;

        let image = decode_data_uri(&new_plant.image)?;
        let salt = self.unused_salt().await?;
        let key = format!("{}.{}", salt, image.extension);

        self.storage
            .put_public(&key, image.bytes, &image.mime)
            .await?;

        let created = self
            .insert_records(
                account,
                &new_plant,
                &salt,
                &image.extension,
                (image.width, image.height),
                now,
                due,
            )
            .await;

        match created {
            Ok(record) => {
                info!(
                    account_id = account.id,
                    plant_id = record.plant.id,
                    key = %key,
                    "Created plant"
                );
                Ok(record)
            }
            Err(e) => {
                error!(account_id = account.id, key = %key, error = %e, "Failed to save plant, removing uploaded image");
                if let Err(cleanup) = self.storage.delete(&key).await {
                    warn!(key = %key, error = %cleanup, "Left orphaned image in storage");
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_records(
        &self,
        account: &Account,
        new_plant: &NewPlant,
        salt: &str,
        extension: &str,
        (width, height): (u32, u32),
        now: DateTime<Utc>,
        due: DateTime<Utc>,
    ) -> Result<PlantWithAsset> {
        let created_at = format_timestamp(now);
        let due = format_timestamp(due);

        let mut tx = self.db.begin().await?;

        let plant: Plant = sqlx::query_as(
            r#"
            INSERT INTO plants (user_id, name, plant_tag, watering_time, time_elapsed, start_time, watering_date, creation_date)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(&new_plant.name)
        .bind(&new_plant.plant_tag)
        .bind(new_plant.watering_time)
        .bind(&created_at)
        .bind(&due)
        .bind(&created_at)
        .fetch_one(&mut *tx)
        .await?;

        let asset: Asset = sqlx::query_as(
            r#"
            INSERT INTO assets (plant_id, base_url, salt, extension, width, height, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(plant.id)
        .bind(&self.base_url)
        .bind(salt)
        .bind(extension)
        .bind(width as i64)
        .bind(height as i64)
        .bind(&created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PlantWithAsset { plant, asset })
    }

    /// Delete a plant, its image object and its asset row.
    ///
    /// The object is deleted first, outside any transaction, so a slow bucket
    /// never holds the database write lock. If that delete fails both rows
    /// stay. The rows are then removed together with the ownership check
    /// repeated.
    pub async fn remove(&self, account: &Account, id: i64) -> Result<()> {
        let record = self.get(account, id).await?;
        self.storage.delete(&record.asset.object_key()).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM assets
            WHERE plant_id = (SELECT id FROM plants WHERE id = ? AND user_id = ?)
            "#,
        )
        .bind(id)
        .bind(account.id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM plants WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(account.id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            // Removed by a concurrent request after the lookup
            return Err(plant_not_found());
        }

        tx.commit().await?;

        info!(account_id = account.id, plant_id = id, "Removed plant");
        Ok(())
    }

    /// Remove every plant owned by `account`. Stops at the first failure.
    pub async fn remove_all(&self, account: &Account) -> Result<usize> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM plants WHERE user_id = ? ORDER BY id")
            .bind(account.id)
            .fetch_all(&self.db)
            .await?;

        for (id,) in &ids {
            self.remove(account, *id).await?;
        }
        Ok(ids.len())
    }

    /// Restart the watering cycle from now
    pub async fn reset_cycle(&self, account: &Account, id: i64) -> Result<PlantWithAsset> {
        let now = Utc::now();
        let start = format_timestamp(now);

        let mut tx = self.db.begin().await?;

        let watering_time: Option<(f64,)> = sqlx::query_as(
            r#"
            UPDATE plants SET start_time = ?, time_elapsed = 0
            WHERE id = ? AND user_id = ?
            RETURNING watering_time
            "#,
        )
        .bind(&start)
        .bind(id)
        .bind(account.id)
        .fetch_optional(&mut *tx)
        .await?;
        let (watering_time,) = watering_time.ok_or_else(plant_not_found)?;

        let plant: Plant = sqlx::query_as("UPDATE plants SET watering_date = ? WHERE id = ? RETURNING *")
            .bind(format_timestamp(watering_date(now, watering_time)?))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let asset: Asset = sqlx::query_as("SELECT * FROM assets WHERE plant_id = ?")
            .bind(plant.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(account_id = account.id, plant_id = plant.id, "Watered plant");
        Ok(PlantWithAsset { plant, asset })
    }

    async fn unused_salt(&self) -> Result<String> {
        for _ in 0..SALT_ATTEMPTS {
            let salt = generate_salt();
            let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM assets WHERE salt = ?")
                .bind(&salt)
                .fetch_optional(&self.db)
                .await?;
            if taken.is_none() {
                return Ok(salt);
            }
        }
        Err(ServiceError::Internal("Could not generate a unique image salt".to_string()))
    }
}

fn plant_not_found() -> ServiceError {
    ServiceError::not_found("Plant not found")
}
