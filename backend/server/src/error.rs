use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shared::{InvalidCount, InvalidHandle, payloads::ErrorResponse};
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    InvalidHandle(#[from] InvalidHandle),

    #[error(transparent)]
    InvalidCount(#[from] InvalidCount),

    #[error("Whoa there! You're popping too fast! Take a breather and try again in a few seconds.")]
    RateLimited,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload | AppError::InvalidHandle(_) | AppError::InvalidCount(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let AppError::Store(e) = &self {
            error!("Store failure: {e}");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
