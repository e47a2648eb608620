use axum::{http::StatusCode, response::IntoResponse, Json};

#[derive(Debug, thiserror::Error)]
pub enum SlaError {
    #[error("SLA configuration error: {0}")]
    Configuration(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(String),
}

impl IntoResponse for SlaError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Self::Configuration(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Store(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<diesel::result::Error> for SlaError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for SlaError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Store(format!("connection pool: {err}"))
    }
}
