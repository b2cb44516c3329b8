//! Exposure fusion and exposure alignment.

mod align;
mod merge;

pub use align::{AlignMtb, shift_mat};
pub use merge::MergeMertens;
