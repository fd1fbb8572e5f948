use thiserror::Error;

use crate::classifier::ErrorCategory;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("WebDriver error: {0}")]
    Driver(String),

    #[error("Browser session is closed: {0}")]
    SessionClosed(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Login failed ({category}): {message}")]
    Login {
        category: ErrorCategory,
        message: String,
    },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Taxpayer processing exceeded its budget of {0:?}")]
    ProcessingTimeout(std::time::Duration),

    #[error("Run cancelled")]
    Cancelled,

    #[error("All fallback strategies failed for '{operation}': tried {attempted:?}")]
    FallbacksExhausted {
        operation: String,
        attempted: Vec<String>,
    },

    #[error("Roster format error: {0}")]
    RosterFormat(String),

    #[error("Host command failed: {0}")]
    HostCommand(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractorError {
    /// Category used for the taxpayer's outcome record when this error ends its run.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExtractorError::Login { category, .. } => *category,
            ExtractorError::Navigation(_) | ExtractorError::FallbacksExhausted { .. } => {
                ErrorCategory::NavigationFailure
            }
            ExtractorError::ProcessingTimeout(_) => ErrorCategory::ProcessingTimeout,
            _ => ErrorCategory::Unclassified,
        }
    }

    /// Errors that end the taxpayer's run wherever they surface; everything
    /// else may be absorbed by traversal.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ExtractorError::ProcessingTimeout(_) | ExtractorError::Cancelled
        )
    }

    pub fn login(category: ErrorCategory, message: impl Into<String>) -> Self {
        ExtractorError::Login {
            category,
            message: message.into(),
        }
    }
}

impl From<fantoccini::error::CmdError> for ExtractorError {
    fn from(e: fantoccini::error::CmdError) -> Self {
        if e.is_no_such_element() {
            ExtractorError::ElementNotFound(e.to_string())
        } else {
            ExtractorError::Driver(e.to_string())
        }
    }
}

impl From<fantoccini::error::NewSessionError> for ExtractorError {
    fn from(e: fantoccini::error::NewSessionError) -> Self {
        ExtractorError::Driver(format!("could not start a WebDriver session: {e}"))
    }
}

pub type Result<T, E = ExtractorError> = std::result::Result<T, E>;
