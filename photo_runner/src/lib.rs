#![deny(missing_docs)]

//! Command-line driver for the photo shim: loads the shim dynamically and
//! runs one job described in a TOML file.

/// Conversion between image files and shim pixel buffers.
pub mod convert;

/// Error types used by the runner.
pub mod error;

/// C layouts and entry point signatures of the shim.
pub mod ffi;

/// Job file parsing.
pub mod job;

/// Dynamic loading of the shim.
pub mod loader;

/// Calling the shim for a job.
pub mod session;
