use thiserror::Error;

/// Errors raised by the photo routines.
///
/// Every variant names the routine that detected the problem so callers can
/// surface it across the FFI boundary without extra context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhotoError {
    /// An internal precondition on the inputs did not hold.
    #[error("{func}: assertion failed: {detail}")]
    Assertion {
        /// Routine that raised the error.
        func: &'static str,
        /// Failed condition.
        detail: String,
    },

    /// Two inputs that must share a size do not.
    #[error("{func}: sizes of input arguments do not match: {detail}")]
    SizeMismatch {
        /// Routine that raised the error.
        func: &'static str,
        /// Offending sizes.
        detail: String,
    },

    /// Depth or channel count the routine cannot process.
    #[error("{func}: unsupported format or combination of formats: {detail}")]
    UnsupportedFormat {
        /// Routine that raised the error.
        func: &'static str,
        /// Offending format.
        detail: String,
    },

    /// A scalar argument is outside its accepted range.
    #[error("{func}: bad argument: {detail}")]
    BadArgument {
        /// Routine that raised the error.
        func: &'static str,
        /// Offending argument.
        detail: String,
    },
}

impl PhotoError {
    /// Stable numeric code for the error class.
    pub fn code(&self) -> i32 {
        match self {
            PhotoError::Assertion { .. } => -215,
            PhotoError::SizeMismatch { .. } => -209,
            PhotoError::UnsupportedFormat { .. } => -210,
            PhotoError::BadArgument { .. } => -5,
        }
    }

    /// Short class name, e.g. `"Assertion failed"`.
    pub fn class(&self) -> &'static str {
        match self {
            PhotoError::Assertion { .. } => "Assertion failed",
            PhotoError::SizeMismatch { .. } => "Sizes of input arguments do not match",
            PhotoError::UnsupportedFormat { .. } => "Unsupported format or combination of formats",
            PhotoError::BadArgument { .. } => "Bad argument",
        }
    }

    /// Routine that raised the error.
    pub fn func(&self) -> &'static str {
        match self {
            PhotoError::Assertion { func, .. }
            | PhotoError::SizeMismatch { func, .. }
            | PhotoError::UnsupportedFormat { func, .. }
            | PhotoError::BadArgument { func, .. } => func,
        }
    }

    pub(crate) fn assertion(func: &'static str, detail: impl Into<String>) -> Self {
        PhotoError::Assertion { func, detail: detail.into() }
    }

    pub(crate) fn size_mismatch(func: &'static str, detail: impl Into<String>) -> Self {
        PhotoError::SizeMismatch { func, detail: detail.into() }
    }

    pub(crate) fn unsupported(func: &'static str, detail: impl Into<String>) -> Self {
        PhotoError::UnsupportedFormat { func, detail: detail.into() }
    }

    pub(crate) fn bad_argument(func: &'static str, detail: impl Into<String>) -> Self {
        PhotoError::BadArgument { func, detail: detail.into() }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PhotoError>;

/// Returns an assertion error from `func` unless `cond` holds.
pub(crate) fn ensure(cond: bool, func: &'static str, detail: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(PhotoError::assertion(func, detail))
    }
}
