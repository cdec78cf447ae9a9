use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: balance {balance:.2} is less than {amount:.2}")]
    InsufficientFunds { balance: f64, amount: f64 },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} already settled as {status}")]
    AlreadySettled {
        kind: &'static str,
        id: u64,
        status: String,
    },

    #[error("Not authorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Settlement engine unavailable: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Validation(_) | AppError::InsufficientFunds { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AlreadySettled { .. } | AppError::AccountExists(_) => StatusCode::CONFLICT,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Engine(_) | AppError::Config(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_settled_message_names_record_and_state() {
        let e = AppError::AlreadySettled {
            kind: "bet",
            id: 7,
            status: "won".to_string(),
        };
        assert_eq!(e.to_string(), "bet 7 already settled as won");
    }
}
