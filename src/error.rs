use crate::auth::PasswordError;
use crate::database::StoreError;
use crate::session::SessionError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("patient not found")]
    PatientNotFound,

    #[error("invalid password")]
    InvalidPassword,

    #[error("data store failure: {0}")]
    Store(#[from] StoreError),

    /// Store failure on a read-only listing endpoint.
    #[error("listing query failed: {0}")]
    Listing(StoreError),

    #[error("password processing failed: {0}")]
    Password(#[from] PasswordError),

    #[error("session store failure: {0}")]
    Session(#[from] SessionError),

    #[error("session could not be destroyed: {0}")]
    Logout(SessionError),
}

/// One entry of a 400 validation response.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Flatten validator output into `{field, message}` pairs, ordered by field.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |err| FieldError {
                field: field.clone(),
                message: err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string()),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedBody(_) | AppError::EmailTaken => StatusCode::BAD_REQUEST,
            AppError::PatientNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AppError::Store(_)
            | AppError::Listing(_)
            | AppError::Password(_)
            | AppError::Session(_)
            | AppError::Logout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            // The cause stays in the logs; clients get a generic message.
            tracing::error!(error = %self, "request failed");
        }

        let mut builder = HttpResponse::build(status);
        match self {
            AppError::Validation(errors) => {
                builder.json(serde_json::json!({"errors": field_errors(errors)}))
            }
            AppError::MalformedBody(message) => builder.json(serde_json::json!({
                "errors": [FieldError { field: "body".to_string(), message: message.clone() }]
            })),
            AppError::EmailTaken => builder.json(serde_json::json!({"message": "Email already registered."})),
            AppError::PatientNotFound => builder.content_type(ContentType::plaintext()).body("Patient not found"),
            AppError::InvalidPassword => builder.content_type(ContentType::plaintext()).body("Invalid password"),
            AppError::Listing(_) => builder.json(serde_json::json!({"error": "Failed to retrieve records"})),
            AppError::Logout(_) => {
                builder.json(serde_json::json!({"message": "Logout error. Please try again later."}))
            }
            AppError::Store(_) | AppError::Password(_) | AppError::Session(_) => {
                builder.json(serde_json::json!({"message": SERVER_ERROR_MESSAGE}))
            }
        }
    }
}
