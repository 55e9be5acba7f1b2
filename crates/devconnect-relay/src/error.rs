use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Too many connections (max {max})")]
    TooManyConnections { max: usize },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RelayError::TooManyConnections { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            RelayError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            RelayError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
