//! Application-wide error types.
//!
//! The first group of variants is the registry's validation taxonomy; each is
//! terminal and surfaces verbatim to the caller. The second group wraps
//! infrastructure failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Address {0} is already registered")]
    DuplicateAddress(String),

    #[error("Registration ID {0} is already taken")]
    DuplicateRegistrationId(String),

    #[error("Batch {0} already exists")]
    DuplicateBatchId(String),

    #[error("A {from} cannot hand a batch to a {to}")]
    InvalidRoleTransition { from: String, to: String },

    #[error("Batch {batch_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        batch_id: String,
        from: String,
        to: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event parse error: {0}")]
    EventParse(String),
}

impl RegistryError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NotAuthorized(_) => "not_authorized",
            Self::DuplicateAddress(_) => "duplicate_address",
            Self::DuplicateRegistrationId(_) => "duplicate_registration_id",
            Self::DuplicateBatchId(_) => "duplicate_batch_id",
            Self::InvalidRoleTransition { .. } => "invalid_role_transition",
            Self::InvalidStatusTransition { .. } => "invalid_status_transition",
            Self::InvalidInput(_) => "invalid_input",
            Self::Database(_)
            | Self::Migrate(_)
            | Self::Http(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Config(_)
            | Self::EventParse(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
