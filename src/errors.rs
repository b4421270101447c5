//! Unified error types for the matching and allocation core.
//!
//! Every operation in `core` returns [`Result`]. Validation, state, and
//! capacity errors are raised before any write (or roll the open database
//! transaction back), so a returned error always means nothing was mutated.
//! Notification and email failures are handled at the call site and never
//! surface through this enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input supplied by the caller.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A referenced donation, request, transaction, delivery, or user
    /// does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Operation is invalid for the current lifecycle state, e.g. accepting
    /// a transaction that is no longer pending.
    #[error("{entity} {id} cannot be modified in its current state ({state})")]
    StateConflict {
        entity: &'static str,
        id: i64,
        state: String,
    },

    /// An allocated quantity exceeds what the donation still holds. Carries
    /// the offending line so the caller can correct it.
    #[error("allocated quantity {requested} exceeds available {available} for {item} {item_id}")]
    Capacity {
        item: &'static str,
        item_id: i64,
        requested: i32,
        available: i32,
    },

    /// Donation and request belong to different categories.
    #[error("donation category {donation} does not match request category {request}")]
    CategoryMismatch { donation: String, request: String },

    /// Meal lines allocated against a product donation, or vice versa.
    #[error("allocation kind does not match donation category {category}")]
    MixedCategoryAllocation { category: String },

    /// Configuration error (missing file, bad TOML, invalid tuning value).
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
