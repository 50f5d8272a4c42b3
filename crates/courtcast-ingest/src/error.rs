// Errors raised while fetching or parsing upstream payloads.

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        source: serde_json::Error,
    },

    #[error("unexpected {what} payload: {message}")]
    Shape { what: String, message: String },

    #[error("{what} payload contained no usable rows")]
    Empty { what: String },
}

impl IngestError {
    pub(crate) fn shape(what: &str, message: impl Into<String>) -> Self {
        IngestError::Shape {
            what: what.to_string(),
            message: message.into(),
        }
    }
}
