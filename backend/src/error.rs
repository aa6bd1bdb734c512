use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared::constants::SPIN_FAILED_ERROR;
use shared::shared_spin_game::{SpinErrorBody, SpinRejection};

use crate::services::rotation_service::RotationError;

#[derive(Debug)]
pub enum Error {
    Spin(SpinRejection),
    Receipt,
    Rotation(RotationError),
}

impl From<SpinRejection> for Error {
    fn from(err: SpinRejection) -> Self {
        Error::Spin(err)
    }
}

impl From<RotationError> for Error {
    fn from(err: RotationError) -> Self {
        Error::Rotation(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Spin(rejection) => (
                StatusCode::BAD_REQUEST,
                Json(SpinErrorBody { message: rejection.message().to_string() }),
            )
                .into_response(),
            Error::Receipt => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SpinErrorBody { message: SPIN_FAILED_ERROR.to_string() }),
            )
                .into_response(),
            Error::Rotation(e) => {
                let status = if e.is_not_found() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, Json(json!({ "error": e.to_string() }))).into_response()
            }
        }
    }
}
