use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::TransactionError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error payload returned to HTTP callers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Identifier of the resource that caused the conflict, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_id: Option<Uuid>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Rate window overlaps active rate {conflicting_rate_id} ({from} to {until})")]
    RateOverlap {
        conflicting_rate_id: Uuid,
        from: chrono::NaiveDate,
        until: String,
    },

    #[error("Storage pricing window overlaps active policy {0}")]
    PolicyOverlap(Uuid),

    #[error("In use: {0}")]
    InUse(String),

    #[error("Bin unavailable: {0}")]
    BinUnavailable(String),

    #[error("Package {0} already has an active bin assignment")]
    AlreadyAssigned(Uuid),

    #[error("Bin {bin_id} is at capacity ({capacity})")]
    CapacityExceeded { bin_id: Uuid, capacity: i32 },

    #[error("No storage pricing policy covers {from} to {until}")]
    PolicyNotFound {
        from: chrono::NaiveDate,
        until: chrono::NaiveDate,
    },

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(e) => ServiceError::DatabaseError(e),
            TransactionError::Transaction(e) => e,
        }
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Self::RateOverlap { .. }
            | Self::PolicyOverlap(_)
            | Self::InUse(_)
            | Self::AlreadyAssigned(_)
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BinUnavailable(_) | Self::CapacityExceeded { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::PolicyNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Internal failures return a
    /// generic message so implementation details never leak to callers.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Identifier of the conflicting resource, for errors that carry one.
    pub fn conflicting_id(&self) -> Option<Uuid> {
        match self {
            Self::RateOverlap {
                conflicting_rate_id, ..
            } => Some(*conflicting_rate_id),
            Self::PolicyOverlap(id) => Some(*id),
            Self::CapacityExceeded { bin_id, .. } => Some(*bin_id),
            Self::AlreadyAssigned(id) => Some(*id),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: self.response_message(),
            conflicting_id: self.conflicting_id(),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_error_maps_to_conflict() {
        let err = ServiceError::RateOverlap {
            conflicting_rate_id: Uuid::new_v4(),
            from: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            until: "open-ended".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.conflicting_id().is_some());
    }

    #[test]
    fn capacity_error_maps_to_unprocessable() {
        let err = ServiceError::CapacityExceeded {
            bin_id: Uuid::new_v4(),
            capacity: 3,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn database_error_message_is_generic() {
        let err = ServiceError::DatabaseError(sea_orm::DbErr::Custom("secret dsn".into()));
        assert_eq!(err.response_message(), "Database error");
    }
}
