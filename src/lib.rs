pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::config::Config;
use crate::database::store::{AttemptStore, DifficultyStore, TestCatalog};
use crate::services::{
    attempt_service::{AttemptService, AttemptSettings},
    classifier_service::DifficultyClassifier,
    difficulty_service::{DifficultyService, DifficultyThresholds},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub attempt_service: AttemptService,
    pub difficulty_service: DifficultyService,
}

impl AppState {
    /// Wire services over one store that serves every storage capability.
    pub fn new<S>(config: Config, store: Arc<S>, classifier: Arc<dyn DifficultyClassifier>) -> Self
    where
        S: TestCatalog + AttemptStore + DifficultyStore + 'static,
    {
        let attempt_service = AttemptService::new(
            store.clone(),
            store.clone(),
            AttemptSettings::from(&config),
        );
        let difficulty_service =
            DifficultyService::new(store, classifier, DifficultyThresholds::from(&config));

        Self {
            config: Arc::new(config),
            attempt_service,
            difficulty_service,
        }
    }
}
