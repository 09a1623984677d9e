//! Error types for the AlterEgo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is what a turn
//! surfaces to its caller.

use thiserror::Error;

/// The top-level error type for all AlterEgo operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Startup ---
    #[error("Persona could not be loaded: {0}")]
    Persona(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Completion service ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tools ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Malformed arguments for tool '{tool_name}': {reason}")]
    ToolArguments { tool_name: String, reason: String },

    // --- Turn control ---
    #[error("Tool resolution did not settle after {rounds} rounds")]
    MaxRoundsExceeded { rounds: u32 },

    #[error("Turn cancelled")]
    Cancelled,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failure to deliver an outbound notification.
///
/// Never propagated into a turn; see `alterego_tools::NotificationSink`.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Notification channel not configured: {0}")]
    NotConfigured(String),

    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_argument_error_names_the_tool() {
        let err = Error::ToolArguments {
            tool_name: "record_user_details".into(),
            reason: "expected value at line 1 column 1".into(),
        };
        assert!(err.to_string().contains("record_user_details"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = Error::Config {
            message: "temperature must be between 0.0 and 2.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: temperature must be between 0.0 and 2.0"
        );
    }

    #[test]
    fn max_rounds_reports_count() {
        let err = Error::MaxRoundsExceeded { rounds: 8 };
        assert_eq!(err.to_string(), "Tool resolution did not settle after 8 rounds");
    }
}
