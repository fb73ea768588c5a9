// src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    AuthError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
            ApiError::AuthError(msg) => write!(f, "Auth Error: {}", msg),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) | ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DatabaseError(_) | ApiError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            message: self.to_string(),
        })
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

// Dispatch-specific errors
impl ApiError {
    pub fn bin_not_found(bin_no: &str) -> Self {
        ApiError::NotFound(format!("Bin '{}' not found", bin_no))
    }

    pub fn bin_already_exists(bin_no: &str) -> Self {
        ApiError::Conflict(format!("Bin '{}' already exists", bin_no))
    }

    pub fn invoice_not_found(invoice_number: &str) -> Self {
        ApiError::NotFound(format!("Invoice '{}' not found", invoice_number))
    }

    pub fn invoice_already_exists(invoice_number: &str) -> Self {
        ApiError::Conflict(format!("Invoice '{}' already exists", invoice_number))
    }

    pub fn part_not_found(part_number: &str) -> Self {
        ApiError::NotFound(format!("Part '{}' not found", part_number))
    }

    pub fn part_already_exists(part_number: &str) -> Self {
        ApiError::Conflict(format!("Part '{}' already exists", part_number))
    }

    pub fn bin_quantity_exceeded(bin_no: &str, quantity: u32, scanned: u32) -> Self {
        ApiError::BadRequest(format!(
            "Bin '{}' holds {} parts, cannot record {} scanned",
            bin_no, quantity, scanned
        ))
    }
}

/// Map a UNIQUE constraint violation to a conflict, anything else to a database error.
pub fn conflict_on_unique(err: sqlx::Error, conflict: impl FnOnce() -> ApiError) -> ApiError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => conflict(),
        _ => ApiError::DatabaseError(err),
    }
}
