//! Error taxonomy for the automation pipeline

use thiserror::Error;

/// Automation errors
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// Reserved for flows that can positively detect a rejected login.
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Session state error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for automation operations
pub type Result<T> = std::result::Result<T, AutomationError>;
