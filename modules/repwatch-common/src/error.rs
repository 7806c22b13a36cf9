use thiserror::Error;

/// Failure taxonomy by external collaborator. Each variant is constructed at
/// the seam that talks to that collaborator; anything without a dedicated
/// seam travels as `Anyhow`.
#[derive(Error, Debug)]
pub enum RepwatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RepwatchError>;
