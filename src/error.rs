use thiserror::Error;

use crate::ingest::IngestionError;
use crate::transform::TransformError;

pub type Result<T> = std::result::Result<T, Error>;

/// Diagnostic payload for a platform that rejected a post. `body` keeps the
/// raw response when it could not be decoded into something structured.
#[derive(Debug, Clone)]
pub struct PostFailure {
    pub message: String,
    pub body: Option<String>,
}

impl PostFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            body: Some(body.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}: {1}")]
    Context(String, Box<Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Url parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("No adapter registered for website: {0}")]
    UnknownWebsite(String),

    #[error("Post rejected: {}", .0.message)]
    Post(PostFailure),

    #[error("Not supported by {0}")]
    NotSupported(&'static str),

    #[error("An unexpected error occurred: {0}")]
    Other(String),
}

pub trait Context<T, E> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e.into())))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
