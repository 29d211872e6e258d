use serde::{Deserialize, Serialize};

use crate::services::difficulty_service::PredictiveSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalRecalcResponse {
    pub strategy: String,
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveRecalcResponse {
    pub strategy: String,
    #[serde(flatten)]
    pub summary: PredictiveSummary,
}
