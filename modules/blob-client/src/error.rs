use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Blob not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        BlobError::Network(err.to_string())
    }
}
