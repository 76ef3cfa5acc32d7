/// Error handling for the HTTP surface
///
/// Maps every registry failure to a stable machine-readable code and
/// an HTTP status, in one response shape shared by all endpoints.
use crate::ledger::LedgerError;
use crate::records::RecordError;
use crate::registry::RegistryError;
use crate::roster::RosterError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Standard error response format for all API endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "table_not_found")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (structured data)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let error_response = self.to_error_response();

        if status.is_server_error() {
            tracing::error!(error = %error_response, "server error");
        } else {
            tracing::info!(error = %error_response, "client error");
        }

        error_response.into_response(status)
    }
}

impl IntoErrorResponse for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::AlreadyInProgress(_) => StatusCode::CONFLICT,
            RegistryError::UnknownConnection(_) => StatusCode::FORBIDDEN,
            RegistryError::Roster(err) => match err {
                RosterError::NotFound(_) => StatusCode::NOT_FOUND,
                RosterError::TableFull(_) | RosterError::AlreadyJoined(_) => StatusCode::CONFLICT,
                RosterError::NotSeated(_) => StatusCode::FORBIDDEN,
                RosterError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RegistryError::Ledger(err) => match err {
                LedgerError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                LedgerError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RegistryError::Game(_) => StatusCode::BAD_REQUEST,
            RegistryError::Record(RecordError::StoragePoisoned)
            | RegistryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::SessionNotFound(_) => "game_not_found",
            RegistryError::AlreadyInProgress(_) => "game_in_progress",
            RegistryError::UnknownConnection(_) => "unknown_connection",
            RegistryError::Roster(err) => match err {
                RosterError::NotFound(_) => "table_not_found",
                RosterError::TableFull(_) => "table_full",
                RosterError::AlreadyJoined(_) => "already_joined",
                RosterError::NotSeated(_) => "not_seated",
                RosterError::StoragePoisoned => "internal_error",
            },
            RegistryError::Ledger(err) => match err {
                LedgerError::InsufficientFunds { .. } => "insufficient_funds",
                LedgerError::StoragePoisoned => "internal_error",
            },
            RegistryError::Game(err) => err.kind(),
            RegistryError::Record(_) | RegistryError::StoragePoisoned => "internal_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            RegistryError::Ledger(LedgerError::InsufficientFunds {
                needed, available, ..
            }) => Some(json!({ "needed": needed, "available": available })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonk_engine::errors::GameError;
    use uuid::Uuid;

    #[test]
    fn error_response_serialization() {
        let error = ErrorResponse::new("table_full", "Table is full");
        let json = serde_json::to_value(&error).expect("serialize");

        assert_eq!(json["error"], "table_full");
        assert_eq!(json["message"], "Table is full");
        assert!(json["details"].is_null());
    }

    #[test]
    fn registry_errors_map_to_stable_codes() {
        let table_id = Uuid::new_v4();
        let cases: &[(RegistryError, StatusCode, &str)] = &[
            (
                RegistryError::SessionNotFound(table_id),
                StatusCode::NOT_FOUND,
                "game_not_found",
            ),
            (
                RegistryError::AlreadyInProgress(table_id),
                StatusCode::CONFLICT,
                "game_in_progress",
            ),
            (
                RegistryError::Roster(RosterError::TableFull(table_id)),
                StatusCode::CONFLICT,
                "table_full",
            ),
            (
                RegistryError::Game(GameError::InvalidMeld),
                StatusCode::BAD_REQUEST,
                "invalid_meld",
            ),
            (
                RegistryError::StoragePoisoned,
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), *status, "{err}");
            assert_eq!(err.error_code(), *code, "{err}");
        }
    }

    #[test]
    fn insufficient_funds_carries_amount_details() {
        let err = RegistryError::Ledger(LedgerError::InsufficientFunds {
            player_id: Uuid::new_v4(),
            needed: 10,
            available: 3,
        });
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        let response = err.to_error_response();
        let details = response.details.expect("details present");
        assert_eq!(details["needed"], 10);
        assert_eq!(details["available"], 3);
    }
}
