#![deny(missing_docs)]
#![allow(non_snake_case)]

//! C ABI over `photo_core`.
//!
//! Images, sequences and configured algorithms cross the boundary as opaque
//! one-field handles. Every operation returns a `*mut CvStatus` (null on
//! success) and hands its outputs to a caller-supplied callback before
//! returning.

/// Errors detected at the boundary.
pub mod error;

/// Handle types with their constructors, accessors and releases.
pub mod handle;

/// The `*_Async` photography entry points.
pub mod photo;

/// Status reporting and the callback types.
pub mod status;

pub use error::ShimError;
pub use handle::{AlignMTB, Mat, MergeMertens, Point, VecMat};
pub use status::{CvCallback_1, CvCallback_2, CvStatus, CvStatus_Close, StatusKind};
