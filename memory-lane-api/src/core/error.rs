/// Failures surfaced by the managers. Each variant maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{message}")]
    Storage {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    pub fn storage(message: impl Into<String>) -> impl FnOnce(anyhow::Error) -> ServiceError {
        let message = message.into();
        move |source| ServiceError::Storage { message, source }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
