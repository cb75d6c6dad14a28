use thiserror::Error;
use uuid::Uuid;

pub type LineResult<T> = Result<T, LineError>;

#[derive(Error, Debug)]
pub enum LineError {
    #[error("{operation} not allowed for contract line(s): {}", format_ids(.line_ids))]
    PermissionDenied {
        operation: &'static str,
        line_ids: Vec<Uuid>,
    },

    #[error("Invariant violated on contract line {line_id}: {reason}")]
    InvariantViolation { line_id: Uuid, reason: String },

    #[error("Corrupted successor chain at contract line {line_id}: {detail}")]
    IllegalChainState { line_id: Uuid, detail: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineError {
    pub fn permission_denied(operation: &'static str, line_ids: Vec<Uuid>) -> Self {
        Self::PermissionDenied {
            operation,
            line_ids,
        }
    }

    pub fn invariant(line_id: Uuid, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            line_id,
            reason: reason.into(),
        }
    }

    /// Chain corruption is not recoverable by the caller; everything else is
    /// a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IllegalChainState { .. })
    }
}

fn format_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
