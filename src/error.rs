//! Error handling module for jmxctl
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Library code returns these; the binary wraps them with anyhow context.

use thiserror::Error;

/// Main error type for jmxctl
#[derive(Error, Debug)]
pub enum JmxError {
    /// IO errors (file operations, directory creation, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input in the option file, raised before any side effect
    #[error("Validation error: {0}")]
    Validation(String),

    /// Certificate or private key missing, unreadable or not PEM
    #[error("Key material error: {0}")]
    KeyMaterial(String),

    /// External command (keytool, openssl, systemctl) failed
    #[error("Command failed: {0}")]
    Command(String),

    /// OS account for artifact ownership does not exist
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Environment file could not be edited safely
    #[error("Environment file error: {0}")]
    EnvFile(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for jmxctl operations
pub type Result<T> = std::result::Result<T, JmxError>;

// Convenient error constructors
impl JmxError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a key material error
    pub fn key_material(msg: impl Into<String>) -> Self {
        Self::KeyMaterial(msg.into())
    }

    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create an environment file error
    pub fn env_file(msg: impl Into<String>) -> Self {
        Self::EnvFile(msg.into())
    }
}
