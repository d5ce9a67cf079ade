use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported content type: {0}")]
    InvalidFileType(String),

    #[error("pdf contains no extractable text: {0}")]
    NoExtractableText(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("vector store error: {0}")]
    Store(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("failed to persist chunks: {0}")]
    Persistence(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search request failed: {0}")]
    Request(String),
}

/// Failure reported by a chat model.
///
/// The split between the two variants drives model fallback: only
/// `RateLimited` moves generation on to the next configured model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("model {model} is rate limited: {message}")]
    RateLimited { model: String, message: String },

    #[error("model {model} failed: {message}")]
    Failed { model: String, message: String },
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn model(&self) -> &str {
        match self {
            Self::RateLimited { model, .. } | Self::Failed { model, .. } => model,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] SearchError),

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("no chat models configured")]
    NoModels,
}
