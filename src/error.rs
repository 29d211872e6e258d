use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Test {0} not found")]
    TestNotFound(i64),

    #[error("Question {0} not found")]
    QuestionNotFound(i64),

    #[error("Attempt {0} not found")]
    AttemptNotFound(Uuid),

    #[error("Attempt {attempt_id} is already in progress for this test")]
    AttemptConflict { attempt_id: Uuid },

    #[error("Attempt {0} is already finished")]
    AttemptAlreadyFinished(Uuid),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::TestNotFound(_) => "test_not_found",
            Error::QuestionNotFound(_) => "question_not_found",
            Error::AttemptNotFound(_) => "attempt_not_found",
            Error::AttemptConflict { .. } => "attempt_conflict",
            Error::AttemptAlreadyFinished(_) => "attempt_already_finished",
            Error::InvalidAnswer(_) | Error::Validation(_) => "validation_error",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::Database(_) | Error::Migrate(_) => "storage_error",
            Error::Scheduler(_) | Error::Internal(_) => "internal_error",
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_)
            | Error::InvalidAnswer(_)
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_)
            | Error::TestNotFound(_)
            | Error::QuestionNotFound(_)
            | Error::AttemptNotFound(_) => StatusCode::NOT_FOUND,
            Error::AttemptConflict { .. } | Error::AttemptAlreadyFinished(_) => {
                StatusCode::CONFLICT
            }
            Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            Error::Database(err) => {
                tracing::error!(error = ?err, "storage failure");
                "A storage error occurred".to_string()
            }
            Error::Migrate(_) | Error::Scheduler(_) | Error::Internal(_) | Error::Config(_) => {
                tracing::error!(error = %self, "internal failure");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "error": self.code(), "message": message });
        if let Error::AttemptConflict { attempt_id } = &self {
            body["attempt_id"] = json!(attempt_id);
        }
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::UpstreamUnavailable(err.to_string())
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}
