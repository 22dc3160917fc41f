use thiserror::Error;

pub type Result<T, E = GaitError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GaitError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid feature range: min {min} and max {max} must be finite and distinct")]
    InvalidRange { min: f32, max: f32 },

    #[error("input error: {0}")]
    Input(String),

    #[error("console io failed: {0}")]
    Console(#[from] std::io::Error),

    #[error("{service} request failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },
}

impl GaitError {
    pub fn external(service: &'static str, message: impl ToString) -> Self {
        GaitError::ExternalService {
            service,
            message: message.to_string(),
        }
    }
}
