//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use raffle_core::{FieldErrors, RaffleError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Domain(#[from] RaffleError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numbers: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<&'static str>,
}

impl ErrorResponse {
    fn new(error: String, code: &'static str) -> Self {
        Self {
            error,
            code,
            fields: None,
            numbers: None,
            redirect_to: None,
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) => match e {
                RaffleError::NotFound { .. } => StatusCode::NOT_FOUND,
                RaffleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RaffleError::NumbersTaken { .. }
                | RaffleError::NotOnSale { .. }
                | RaffleError::InvalidTransition { .. }
                | RaffleError::InvalidPaymentTransition { .. }
                | RaffleError::HasParticipants { .. } => StatusCode::CONFLICT,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Migrate(_) | Self::Config(_) | Self::CorruptRow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Domain(e) => match e {
                RaffleError::NotFound { .. } => "not_found",
                RaffleError::Validation(_) => "validation",
                RaffleError::NumbersTaken { .. } => "numbers_taken",
                RaffleError::NotOnSale { .. } => "not_on_sale",
                RaffleError::InvalidTransition { .. } => "invalid_transition",
                RaffleError::InvalidPaymentTransition { .. } => "invalid_payment_transition",
                RaffleError::HasParticipants { .. } => "has_participants",
            },
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Database(_) | Self::Migrate(_) | Self::Config(_) | Self::CorruptRow(_) => {
                "internal"
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        let mut body = ErrorResponse::new(self.to_string(), self.code());
        match self {
            Self::Domain(RaffleError::Validation(fields)) => {
                body.error = "validation failed".to_string();
                body.fields = Some(fields);
            }
            Self::Domain(RaffleError::NumbersTaken { numbers, .. }) => {
                body.numbers = Some(numbers);
            }
            Self::Unauthorized(_) => body.redirect_to = Some("/admin/login"),
            Self::Database(_) | Self::Migrate(_) | Self::CorruptRow(_) => {
                body.error = "internal error".to_string();
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
