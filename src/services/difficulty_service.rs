use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Config, DifficultyStrategy};
use crate::database::store::DifficultyStore;
use crate::error::Result;
use crate::models::difficulty::Difficulty;
use crate::services::classifier_service::DifficultyClassifier;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyThresholds {
    /// Questions with fewer graded answers keep their label.
    pub min_answers: i64,
    /// Correct ratio at or above which a question is easy.
    pub easy_ratio: f64,
    /// Correct ratio at or below which a question is hard.
    pub hard_ratio: f64,
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self {
            min_answers: 50,
            easy_ratio: 0.7,
            hard_ratio: 0.3,
        }
    }
}

impl From<&Config> for DifficultyThresholds {
    fn from(config: &Config) -> Self {
        Self {
            min_answers: config.difficulty_min_answers,
            easy_ratio: config.difficulty_easy_ratio,
            hard_ratio: config.difficulty_hard_ratio,
        }
    }
}

impl DifficultyThresholds {
    pub fn label_for(&self, correct_ratio: f64) -> Difficulty {
        if correct_ratio >= self.easy_ratio {
            Difficulty::Easy
        } else if correct_ratio <= self.hard_ratio {
            Difficulty::Hard
        } else {
            Difficulty::Medium
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictiveSummary {
    pub processed: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct DifficultyService {
    store: Arc<dyn DifficultyStore>,
    classifier: Arc<dyn DifficultyClassifier>,
    thresholds: DifficultyThresholds,
}

impl DifficultyService {
    pub fn new(
        store: Arc<dyn DifficultyStore>,
        classifier: Arc<dyn DifficultyClassifier>,
        thresholds: DifficultyThresholds,
    ) -> Self {
        Self {
            store,
            classifier,
            thresholds,
        }
    }

    /// Relabel questions from observed correctness. Only changed labels are
    /// written, so a second run over the same data updates nothing.
    pub async fn recalc_statistical(&self) -> Result<u64> {
        let stats = self.store.question_stats(self.thresholds.min_answers).await?;

        let updates: Vec<(i64, Difficulty)> = stats
            .iter()
            .filter_map(|s| {
                let label = self.thresholds.label_for(s.correct_ratio());
                (s.current != Some(label)).then_some((s.question_id, label))
            })
            .collect();

        if updates.is_empty() {
            tracing::info!(eligible = stats.len(), "Difficulty labels already up to date");
            return Ok(0);
        }

        let updated = self.store.apply_difficulty(&updates).await?;
        tracing::info!(eligible = stats.len(), updated, "Statistical difficulty recalculated");
        Ok(updated)
    }

    /// Ask the classifier about every question. A failure on one question is
    /// logged and counted, the rest still get processed.
    pub async fn recalc_predictive(&self) -> Result<PredictiveSummary> {
        let questions = self.store.list_question_texts().await?;
        let mut summary = PredictiveSummary::default();

        for (question_id, text, current) in questions {
            let label = match self.classifier.classify(&text).await {
                Ok(label) => label,
                Err(e) => {
                    tracing::warn!(question_id, error = %e, "Difficulty prediction failed");
                    summary.failed += 1;
                    continue;
                }
            };

            if current != Some(label) {
                if let Err(e) = self.store.set_difficulty(question_id, label).await {
                    tracing::warn!(question_id, error = %e, "Failed to store predicted difficulty");
                    summary.failed += 1;
                    continue;
                }
            }
            summary.processed += 1;
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "Predictive difficulty recalculated"
        );
        Ok(summary)
    }

    /// Entry point for the scheduled job; errors are logged, not returned.
    pub async fn run_scheduled(&self, strategy: DifficultyStrategy) {
        let outcome = match strategy {
            DifficultyStrategy::Statistical => self.recalc_statistical().await.map(|_| ()),
            DifficultyStrategy::Predictive => self.recalc_predictive().await.map(|_| ()),
        };
        if let Err(e) = outcome {
            tracing::error!(error = %e, ?strategy, "Scheduled difficulty recalculation failed");
        }
    }
}
