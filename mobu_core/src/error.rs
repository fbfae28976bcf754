//! Error types for the monkey engine

use mobu_jupyter_client::JupyterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonkeyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown business {0}")]
    UnknownBusiness(String),

    #[error("monkey {0} not found")]
    NotFound(String),

    #[error("monkey {0} already exists")]
    AlreadyExists(String),

    #[error("monkey {0} already started")]
    AlreadyStarted(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Jupyter(#[from] JupyterError),
}

pub type Result<T> = std::result::Result<T, MonkeyError>;
