use thiserror::Error;

/// Failures a single page load can surface. Everything else degrades to a
/// default or gets skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Rejected before any storage access (client-error class).
    #[error("{0}")]
    Invalid(String),

    /// Nothing at the resolved location.
    #[error("{0}")]
    NotFound(String),
}

impl PageError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// HTTP-style status class for the rendering layer.
    pub fn status(&self) -> u16 {
        match self {
            PageError::Invalid(_) => 400,
            PageError::NotFound(_) => 404,
        }
    }
}

pub type PageResult<T> = std::result::Result<T, PageError>;
