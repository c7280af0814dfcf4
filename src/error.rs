/*!
 * Top-level CLI error type and the `spec` §6 exit-code mapping.
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] avesa_core::AvesaError),

    #[error("config error: {0}")]
    Config(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<avesa_state::StateError> for AppError {
    fn from(err: avesa_state::StateError) -> Self {
        AppError::Pipeline(err.into())
    }
}

impl From<avesa_connect::ConnectError> for AppError {
    fn from(err: avesa_connect::ConnectError) -> Self {
        AppError::Pipeline(err.into())
    }
}

impl From<avesa_mapping::MappingError> for AppError {
    fn from(err: avesa_mapping::MappingError) -> Self {
        AppError::Pipeline(avesa_core::AvesaError::MappingError(err.to_string()))
    }
}

impl From<avesa_engine::OrchestratorError> for AppError {
    fn from(err: avesa_engine::OrchestratorError) -> Self {
        AppError::Pipeline(err.into())
    }
}

impl From<avesa_engine::BackfillError> for AppError {
    fn from(err: avesa_engine::BackfillError) -> Self {
        match err {
            avesa_engine::BackfillError::State(e) => AppError::Pipeline(e.into()),
            avesa_engine::BackfillError::Connect(e) => AppError::Pipeline(e.into()),
            avesa_engine::BackfillError::EmptyWindow { .. } => AppError::Usage(err.to_string()),
        }
    }
}

impl AppError {
    /// `spec` §6 exit codes: `0` success, `1` partial, `2` failed,
    /// `3` usage error, `4` state-store unreachable. This only covers the
    /// codes that correspond to a hard error; `0`/`1` are decided by the
    /// caller from a successful `RunResult`/`BackfillResult`'s status.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) => 3,
            AppError::Config(_) => 3,
            AppError::Io(_) => 4,
            AppError::TomlParse(_) => 3,
            AppError::Pipeline(e) => e.exit_code(),
        }
    }
}
