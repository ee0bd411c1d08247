//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use minido_domain::error::MinidoError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`MinidoError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(MinidoError);

impl From<MinidoError> for ApiError {
    fn from(err: MinidoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            MinidoError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            MinidoError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            MinidoError::Transport(err) => {
                tracing::warn!(error = %err, "bus transport unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "bus transport unavailable".to_string(),
                )
            }
            MinidoError::Storage(_) | MinidoError::Frame(_) => {
                tracing::error!(error = %self.0, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minido_domain::error::{BoxError, NotFoundError, ValidationError};

    fn status_of(err: MinidoError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn should_map_errors_to_status_codes() {
        assert_eq!(
            status_of(ValidationError::ChannelOutOfRange(9).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                NotFoundError {
                    entity: "Module",
                    id: "42".to_string(),
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        let boxed: BoxError = "gone".into();
        assert_eq!(
            status_of(MinidoError::Transport(boxed)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let boxed: BoxError = "locked".into();
        assert_eq!(
            status_of(MinidoError::Storage(boxed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
