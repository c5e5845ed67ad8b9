/// Result alias that carries the custom [`PipelineError`] type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Common error type for the core crate.
///
/// Engine-reported absence is never an error; it surfaces as `None` from the
/// query that produced it. Errors are reserved for byte transfers and for
/// configuration or scenario parsing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A reference could not be resolved to bytes.
    #[error("failed to fetch `{reference}`: {source}")]
    Fetch {
        reference: String,
        #[source]
        source: std::io::Error,
    },
    /// An HTTP reference could not be retrieved.
    #[error("failed to fetch `{reference}`: {source}")]
    Http {
        reference: String,
        #[source]
        source: reqwest::Error,
    },
    /// The worker fetching a reference went away without reporting a result.
    #[error("fetch of `{reference}` was aborted")]
    FetchAborted { reference: String },
    /// The tracker or source a load was issued for was destroyed before the
    /// data arrived.
    #[error("load target was released before the data arrived")]
    Released,
}

impl PipelineError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}
