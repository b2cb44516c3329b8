use photo_core::PhotoError;
use thiserror::Error;

/// Failures detected while serving an entry point.
#[derive(Error, Debug)]
pub enum ShimError {
    /// The photo library rejected the call.
    #[error(transparent)]
    Library(#[from] PhotoError),

    /// An input handle, or the object it points to, is null.
    #[error("{0} handle is null")]
    NullHandle(&'static str),

    /// No callback was supplied for the result.
    #[error("callback is null")]
    NullCallback,

    /// An out-parameter pointer is null.
    #[error("output pointer `{0}` is null")]
    NullOutput(&'static str),

    /// Caller-supplied raw data cannot describe a matrix.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Sequence index past the end.
    #[error("index {index} out of range for sequence of {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: i32,
        /// Sequence length.
        len: usize,
    },

    /// A panic was caught at the boundary.
    #[error("unknown exception{}", payload_suffix(.0))]
    Panic(Option<String>),
}

fn payload_suffix(payload: &Option<String>) -> String {
    payload.as_deref().map(|p| format!(": {p}")).unwrap_or_default()
}

impl ShimError {
    /// Status code reported to the caller.
    pub fn code(&self) -> i32 {
        match self {
            ShimError::Library(e) => e.code(),
            ShimError::Panic(_) => -99,
            _ => -1,
        }
    }

    /// Short classification stored in the status `err` field.
    pub fn class(&self) -> &'static str {
        match self {
            ShimError::Library(e) => e.class(),
            ShimError::Panic(_) => "unknown exception",
            _ => "internal error",
        }
    }
}
