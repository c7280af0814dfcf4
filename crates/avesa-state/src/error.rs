use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conditional write conflict: {0}")]
    Conflict(String),

    #[error("chunk already in a terminal state: {0}")]
    AlreadyTerminal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn already_terminal(what: impl Into<String>) -> Self {
        Self::AlreadyTerminal(what.into())
    }
}

pub type Result<T> = std::result::Result<T, StateError>;

impl From<StateError> for avesa_core::AvesaError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(msg) => avesa_core::AvesaError::NotFound(msg),
            StateError::Conflict(msg) => avesa_core::AvesaError::Conflict(msg),
            StateError::AlreadyTerminal(msg) => avesa_core::AvesaError::AlreadyTerminal(msg),
            StateError::Database(e) => avesa_core::AvesaError::Fatal(e.to_string()),
            StateError::Migration(e) => avesa_core::AvesaError::Fatal(e.to_string()),
            StateError::Serialization(e) => avesa_core::AvesaError::Fatal(e.to_string()),
        }
    }
}
