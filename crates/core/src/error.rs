/// Result alias that carries the custom [`BandscopeError`] type.
pub type Result<T> = std::result::Result<T, BandscopeError>;

/// Common error type for the core crate.
///
/// Nothing on the ingestion path can fail, so these only show up while
/// building a pipeline, loading configuration, or inside a transform backend.
#[derive(Debug, thiserror::Error)]
pub enum BandscopeError {
    /// A configuration value cannot produce a working pipeline.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The accelerated transform could not be initialised or run. The
    /// pipeline recovers from this by switching to the direct transform.
    #[error("spectral backend unavailable: {0}")]
    BackendUnavailable(String),
    /// Free-form failure reported by a caller, such as the app.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration file or frame failed to (de)serialise.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BandscopeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Shorthand for [`BandscopeError::InvalidConfig`].
    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<String> for BandscopeError {
    fn from(value: String) -> Self {
        Self::msg(value)
    }
}
