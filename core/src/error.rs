use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date '{value}' in stored record")]
    InvalidDate { value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
