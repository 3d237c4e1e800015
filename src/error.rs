//! Error types for the readiness service.

use serde::Serialize;
use uuid::Uuid;

use crate::assessment::steps::StepFailure;

/// Startup failures of the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Version conflict on {id}: expected version {expected}")]
    VersionConflict { id: String, expected: i64 },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by the assessment engine to its callers.
///
/// `ValidationFailed` and `OutOfRange` are recoverable: the caller re-prompts
/// without losing entered data. `NotFound`, `VersionConflict` and
/// `StoreUnavailable` are explicit failures of the request; only the last
/// one is worth retrying. `MalformedDocument` is a stored body that no
/// longer decodes.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("Assessment {id} not found for partition {customer_id}")]
    NotFound { id: Uuid, customer_id: String },

    #[error("Validation failed for steps: {}", step_names(.failures))]
    ValidationFailed { failures: Vec<StepFailure> },

    #[error("Step index {index} out of range: {reason}")]
    OutOfRange { index: usize, reason: String },

    #[error("Assessment {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: Uuid, expected: i64 },

    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Assessment {id} cannot be decoded: {reason}")]
    MalformedDocument { id: Uuid, reason: String },
}

impl AssessmentError {
    /// Lift a store error into the engine taxonomy for a given document.
    pub fn from_store(err: DatabaseError, id: Uuid, customer_id: &str) -> Self {
        match err {
            DatabaseError::NotFound { .. } => Self::NotFound {
                id,
                customer_id: customer_id.to_string(),
            },
            DatabaseError::VersionConflict { expected, .. } => {
                Self::VersionConflict { id, expected }
            }
            DatabaseError::Serialization(reason) => Self::MalformedDocument { id, reason },
            other => Self::StoreUnavailable(other.to_string()),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<DatabaseError> for AssessmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => Self::StoreUnavailable(format!(
                "unexpected missing {entity} {id}"
            )),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Local refusals of the wizard state machine. Never fatal to a session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressionError {
    #[error("Step index {index} out of range: {reason}")]
    OutOfRange { index: usize, reason: String },

    #[error("Cannot finish, invalid steps: {}", step_names(.failures))]
    ValidationFailed { failures: Vec<StepFailure> },

    #[error("Cannot {action} while {position}")]
    InvalidTransition { action: String, position: String },
}

impl From<ProgressionError> for AssessmentError {
    fn from(err: ProgressionError) -> Self {
        match err {
            ProgressionError::OutOfRange { index, reason } => Self::OutOfRange { index, reason },
            ProgressionError::ValidationFailed { failures } => Self::ValidationFailed { failures },
            ProgressionError::InvalidTransition { action, position } => Self::OutOfRange {
                index: 0,
                reason: format!("cannot {action} while {position}"),
            },
        }
    }
}

/// JSON error body shared by the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<StepFailure>>,
}

fn step_names(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(|f| f.step.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::steps::{FieldIssue, Step};

    #[test]
    fn store_not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = AssessmentError::from_store(
            DatabaseError::NotFound {
                entity: "assessment".into(),
                id: id.to_string(),
            },
            id,
            "cust-1",
        );
        assert!(matches!(err, AssessmentError::NotFound { customer_id, .. } if customer_id == "cust-1"));
    }

    #[test]
    fn store_query_failure_is_transient() {
        let id = Uuid::new_v4();
        let err = AssessmentError::from_store(DatabaseError::Query("locked".into()), id, "c");
        assert!(err.is_transient());
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn startup_errors_keep_their_source() {
        let err: Error = DatabaseError::Migration("002 failed".into()).into();
        assert_eq!(err.to_string(), "Database error: Migration failed: 002 failed");
        let err: Error = ConfigError::MissingEnvVar("EV_DB_PATH".into()).into();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn undecodable_document_is_not_transient() {
        let id = Uuid::new_v4();
        let err = AssessmentError::from_store(
            DatabaseError::Serialization("missing field `createdAt`".into()),
            id,
            "c",
        );
        assert!(matches!(err, AssessmentError::MalformedDocument { id: got, .. } if got == id));
        assert!(!err.is_transient());
    }

    #[test]
    fn validation_message_lists_steps() {
        let err = AssessmentError::ValidationFailed {
            failures: vec![
                StepFailure {
                    step: Step::Vehicle,
                    issues: vec![FieldIssue::new("brand", "is required")],
                },
                StepFailure {
                    step: Step::EvCharger,
                    issues: vec![FieldIssue::new("charger.brand", "is required")],
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Validation failed for steps: vehicle, ev_charger"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn progression_refusal_lifts_into_engine_error() {
        let err: AssessmentError = ProgressionError::OutOfRange {
            index: 9,
            reason: "beyond last step".into(),
        }
        .into();
        assert!(matches!(err, AssessmentError::OutOfRange { index: 9, .. }));
    }
}
