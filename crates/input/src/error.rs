use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input backend init failed: {0}")]
    InitFailed(String),
    #[error("failed to type text: {0}")]
    TypeFailed(String),
    #[error("failed to send key: {0}")]
    KeyFailed(String),
}

pub type Result<T> = std::result::Result<T, InputError>;
