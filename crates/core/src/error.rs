/// Result alias that carries the custom [`LedMatrixError`] type.
pub type Result<T> = std::result::Result<T, LedMatrixError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LedMatrixError {
    /// Free-form failure that does not fit a more specific variant.
    #[error("{0}")]
    Message(String),
    /// A configuration value is outside its documented range. Raised before
    /// any effect state is allocated.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown effect `{0}`")]
    UnknownEffect(String),
    #[error("unknown palette `{0}`")]
    UnknownPalette(String),
    /// The text handed to the text effect contains an escape we cannot decode.
    #[error("malformed text escape: {0}")]
    TextEscape(String),
    /// The display sink refused a frame or could not be cleared.
    #[error("display sink failure: {0}")]
    Sink(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl LedMatrixError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn sink<T: Into<String>>(msg: T) -> Self {
        Self::Sink(msg.into())
    }

    /// Returns true for errors raised while validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::UnknownEffect(_)
                | Self::UnknownPalette(_)
                | Self::TextEscape(_)
        )
    }
}

impl From<&str> for LedMatrixError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LedMatrixError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
