//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors. All of these abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Invalid trigger regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("Invalid message pattern: {0}")]
    InvalidTemplate(#[from] TemplateError),

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

/// Message pattern parse errors, raised when a route is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {offset}")]
    Unclosed { offset: usize },

    #[error("unsupported action '{{{{{action}}}}}' (only {{{{.Field}}}} is supported)")]
    Unsupported { action: String },
}

/// Message pattern execution errors, raised at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("can't evaluate field {field}")]
    UnknownField { field: String },
}

/// Transport-related errors. Always transient from the bridge's point of view.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{transport} is not connected")]
    NotConnected { transport: String },

    #[error("Failed to connect {transport}: {message}")]
    ConnectFailed { transport: String, message: String },

    #[error("Failed to send via {transport}: {message}")]
    SendFailed { transport: String, message: String },

    #[error("Send via {transport} timed out")]
    Timeout { transport: String },
}

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
