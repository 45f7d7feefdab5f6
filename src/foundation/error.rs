/// Convenience result type used across the compositor.
pub type CompositeResult<T> = Result<T, CompositeError>;

/// Top-level error taxonomy used by compositor APIs.
///
/// A source that has not decoded a frame yet is not an error; it is reported through
/// readiness checks and render outcomes instead.
#[derive(thiserror::Error, Debug)]
pub enum CompositeError {
    /// Invalid user-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// A frame source handed over pixels that do not match its declared shape.
    #[error("source error: {0}")]
    Source(String),

    /// Failures inside one composite pass.
    #[error("render error: {0}")]
    Render(String),

    /// Calibration or scene persistence failures.
    #[error("config error: {0}")]
    Config(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositeError {
    /// Build a [`CompositeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompositeError::Source`] value.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Build a [`CompositeError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`CompositeError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`CompositeError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
