use service_core::error::AppError;
use thiserror::Error;

use super::connectors::ConnectorError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No directory connectors are registered")]
    NoConnectors,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("All connectors rejected {operation}: {reason}")]
    AllConnectorsRejected {
        operation: &'static str,
        reason: ConnectorError,
    },

    #[error("Account resolution failed: {0}")]
    Resolution(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidIdentifier(e) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid identifier: {}", e))
            }
            EngineError::AllConnectorsRejected { reason, .. } => {
                AppError::BadRequest(anyhow::anyhow!(reason.to_string()))
            }
            EngineError::NoConnectors => AppError::ServiceUnavailable,
            EngineError::Resolution(e) => AppError::InternalError(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn contract_violations_are_bad_requests() {
        let err = EngineError::AllConnectorsRejected {
            operation: "search",
            reason: ConnectorError::InvalidRequest("Search query is empty".to_string()),
        };
        assert_eq!(AppError::from(err).status_code(), StatusCode::BAD_REQUEST);

        let err = EngineError::InvalidIdentifier("empty".to_string());
        assert_eq!(AppError::from(err).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn resolution_failure_is_internal() {
        let err = EngineError::Resolution("boom".to_string());
        assert_eq!(
            AppError::from(err).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
