//! Error types for the scoring engine
//!
//! Errors are classified by how the refresh pass reacts to them:
//! - Retryable: collector or notification channel timeouts and failures.
//!   The affected lead is skipped and picked up again on the next pass.
//! - Isolated: malformed engagement records, treated as absent data.
//! - Fatal: invariant violations in the scoring parameters. The process
//!   must not start with them.

use thiserror::Error;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum ScoringError {
    /// Rejected configuration update. The current configuration is untouched.
    #[error("Invalid alert configuration: {0}")]
    Validation(String),

    #[error("Malformed engagement record: {0}")]
    Data(String),

    #[error("{operation} timed out after {secs} seconds")]
    ExternalTimeout { operation: String, secs: u64 },

    #[error("External call failed: {0}")]
    External(String),

    #[error("Scoring invariant violated: {0}")]
    Invariant(String),

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ScoringError {
    /// Returns true if the failed step should simply be retried on the next pass
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScoringError::ExternalTimeout { .. } | ScoringError::External(_)
        )
    }

    /// Returns true if the process must refuse to run with this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoringError::Invariant(_))
    }

    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        ScoringError::ExternalTimeout {
            operation: operation.into(),
            secs,
        }
    }
}

/// Serializable error representation for API responses
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Validation,
    NotFound,
    Retryable,
    Internal,
}

impl From<&ScoringError> for ErrorReport {
    fn from(err: &ScoringError) -> Self {
        let error_type = match err {
            ScoringError::Validation(_) => ErrorType::Validation,
            ScoringError::LeadNotFound(_) => ErrorType::NotFound,
            e if e.is_retryable() => ErrorType::Retryable,
            _ => ErrorType::Internal,
        };

        ErrorReport {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable_not_fatal() {
        let err = ScoringError::timeout("Fetch records for lead-1", 30);
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Fetch records for lead-1 timed out after 30 seconds");
    }

    #[test]
    fn test_invariant_is_fatal() {
        let err = ScoringError::Invariant("weights sum to 0.9".to_string());
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_report_classifies_validation() {
        let err = ScoringError::Validation("warm >= hot".to_string());
        let report = ErrorReport::from(&err);
        assert_eq!(report.error_type, ErrorType::Validation);
        assert!(!report.can_retry);
    }

    #[test]
    fn test_report_classifies_not_found() {
        let err = ScoringError::LeadNotFound("demo-9".to_string());
        let report = ErrorReport::from(&err);
        assert_eq!(report.error_type, ErrorType::NotFound);
    }
}
