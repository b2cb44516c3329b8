use thiserror::Error;

/// Application-level errors produced by the photo runner.
#[derive(Error, Debug)]
pub enum AppError {
    /// Input image file does not exist.
    #[error("Input file does not exist: {0}")]
    MissingInput(String),

    /// Job file does not exist.
    #[error("Job file does not exist: {0}")]
    MissingParams(String),

    /// Shim dynamic library does not exist.
    #[error("Photo library does not exist: {0}")]
    MissingLibrary(String),

    /// The operation needs more input images than were given.
    #[error("{operation} needs at least {needed} input image(s), got {given}")]
    NotEnoughInputs {
        /// Operation name from the job file.
        operation: &'static str,
        /// Minimum number of `--input` images.
        needed: usize,
        /// Number of `--input` images given.
        given: usize,
    },

    /// I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error occurred while decoding or encoding an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error occurred while loading the shim library.
    #[error("Library load error: {0}")]
    Library(#[from] libloading::Error),

    /// Job file is not valid TOML or names an unknown operation.
    #[error("Invalid job file: {0}")]
    Job(#[from] toml::de::Error),

    /// An entry point returned a failure status.
    #[error("{entry} failed (kind {kind}, code {code}): {message}")]
    Status {
        /// Entry point that failed.
        entry: &'static str,
        /// Status kind reported by the shim.
        kind: i32,
        /// Status code reported by the shim.
        code: i32,
        /// Diagnostic message reported by the shim.
        message: String,
    },

    /// An entry point reported success but delivered the wrong number of handles.
    #[error("{entry} delivered {got} handle(s), expected {expected}")]
    Delivery {
        /// Entry point that was called.
        entry: &'static str,
        /// Handles expected.
        expected: usize,
        /// Handles received.
        got: usize,
    },

    /// Result matrix has a type that cannot be written as an image.
    #[error("Cannot encode a matrix of type {0}")]
    UnsupportedOutput(i32),
}
