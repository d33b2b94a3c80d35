pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod plants;
pub mod storage;

#[cfg(test)]
pub mod test_support;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::plants::PlantRepository;
use crate::storage::ObjectStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub storage: Arc<dyn ObjectStore>,
    pub sessions: SessionManager,
    pub plants: PlantRepository,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, storage: Arc<dyn ObjectStore>) -> error::Result<Self> {
        let sessions = SessionManager::new(db.clone(), &config.auth)?;
        let plants = PlantRepository::new(db.clone(), storage.clone(), config.storage.base_url());
        Ok(Self {
            config,
            db,
            storage,
            sessions,
            plants,
        })
    }
}
