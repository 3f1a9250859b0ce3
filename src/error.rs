//! Error types for RosterDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RosterError
pub type Result<T> = std::result::Result<T, RosterError>;

/// Unified error type for RosterDB operations
#[derive(Debug, Error)]
pub enum RosterError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lock Errors
    // -------------------------------------------------------------------------
    #[error("could not acquire lock on '{resource}' within {timeout_secs}s (held by pid {holder_pid})")]
    LockTimeout {
        resource: String,
        timeout_secs: u64,
        holder_pid: u32,
    },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("record not found: id {id}")]
    NotFound { id: u64 },

    #[error("student code '{code}' is already in use")]
    DuplicateCode { code: String },

    #[error("invalid student code {code:?}: expected 8 to 10 digits")]
    InvalidCode { code: String },

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("table file is corrupt: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),
}
