#![warn(missing_docs)]

//! Computational photography routines on a small dense matrix type.
//!
//! Seamless cloning and its gradient-domain relatives, non-local means
//! denoising, Mertens exposure fusion, median threshold bitmap alignment,
//! domain-transform based stylization and inpainting. Every routine is
//! deterministic and single-threaded: equal inputs give bit-identical
//! outputs.
//!
//! Three-channel images are BGR ordered.

/// Seamless cloning and gradient-domain local edits.
pub mod cloning;

/// Non-local means denoising.
pub mod denoise;

/// Error type shared by all routines.
pub mod error;

/// Exposure fusion and alignment.
pub mod hdr;

/// Inpainting.
pub mod inpaint;

/// The matrix type and its element types.
pub mod mat;

/// Non-photorealistic rendering filters.
pub mod npr;

mod color;
mod edges;
mod plane;
mod poisson;

pub use cloning::{CloneMode, color_change, illumination_change, seamless_clone, texture_flattening};
pub use denoise::{
    NlMeansParams, fast_nl_means_denoising, fast_nl_means_denoising_colored,
    fast_nl_means_denoising_colored_multi,
};
pub use error::{PhotoError, Result};
pub use hdr::{AlignMtb, MergeMertens};
pub use inpaint::{InpaintMethod, inpaint};
pub use mat::{Depth, Mat, MatType, Point};
pub use npr::{EdgeFilter, detail_enhance, edge_preserving_filter, pencil_sketch, stylization};
