use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("audit error: {0}")]
    Audit(String),

    #[error("render error: {0}")]
    Render(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
