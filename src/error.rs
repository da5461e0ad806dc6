//! API Error
//! ドメインエラー → HTTP ステータス + `{ "success": false, "error": ... }`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::draft::DraftError;
use crate::media::MediaError;
use crate::pricing::PromoError;
use crate::publish::PublishError;
use crate::wizard::StepError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Promo(#[from] PromoError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("DB error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

fn draft_status(e: &DraftError) -> StatusCode {
    match e {
        DraftError::NotFound(_) => StatusCode::NOT_FOUND,
        DraftError::Conflict(_) => StatusCode::CONFLICT,
        DraftError::Storage(_) | DraftError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Draft(e) => draft_status(e),
            ApiError::Step(_) | ApiError::Promo(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Media(MediaError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(_) => StatusCode::BAD_REQUEST,
            ApiError::Publish(e) => match e {
                PublishError::NoVehicle | PublishError::ChecklistIncomplete(_) => StatusCode::BAD_REQUEST,
                PublishError::AlreadyPublished(_) => StatusCode::CONFLICT,
                PublishError::Draft(d) => draft_status(d),
                PublishError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth(e) => match e {
                AuthError::InvalidPhone | AuthError::InvalidCode => StatusCode::BAD_REQUEST,
                AuthError::VerificationExpired => StatusCode::GONE,
                AuthError::WrongCode | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
                AuthError::Delivery(_) => StatusCode::BAD_GATEWAY,
                AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("API Error ({}): {}", status, message);
        } else {
            warn!("API Error ({}): {}", status, message);
        }
        error_response(status, message).into_response()
    }
}

pub fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { success: false, error: message }))
}
