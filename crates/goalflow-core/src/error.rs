use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoalflowError {
    // Generator errors
    #[error("Generator request failed: {0}")]
    Network(String),

    #[error("Generator API error: {status}, {body}")]
    Remote { status: u16, body: String },

    #[error("Generator returned empty content")]
    EmptyResponse,

    // Lookup errors
    #[error("No search results for: {0}")]
    NoResults(String),

    #[error("Lookup backend failed: {backend}: {message}")]
    Backend { backend: String, message: String },

    // Handler errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Unsupported expression: {0}")]
    Eval(String),

    #[error("Handler timeout after {timeout_secs}s: {tool}")]
    HandlerTimeout { tool: String, timeout_secs: u64 },

    #[error("Handler failed: {tool}: {message}")]
    Handler { tool: String, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GoalflowError {
    /// Whether retrying the same external call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GoalflowError::Network(_) => true,
            GoalflowError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GoalflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GoalflowError::Network("connection reset".into()).is_transient());
        assert!(GoalflowError::Remote {
            status: 503,
            body: "busy".into()
        }
        .is_transient());
        assert!(GoalflowError::Remote {
            status: 429,
            body: "slow down".into()
        }
        .is_transient());
        assert!(!GoalflowError::Remote {
            status: 401,
            body: "bad key".into()
        }
        .is_transient());
        assert!(!GoalflowError::EmptyResponse.is_transient());
    }

    #[test]
    fn test_remote_display_matches_api_error_format() {
        let e = GoalflowError::Remote {
            status: 400,
            body: "bad request".into(),
        };
        assert_eq!(e.to_string(), "Generator API error: 400, bad request");
    }
}
