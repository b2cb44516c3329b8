use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One operation read from a TOML job file.
///
/// The `operation` key selects the variant. Scalars left out fall back to
/// the library defaults. For operations with a parameter-free entry point,
/// leaving every tuning knob out calls that entry point instead of its
/// `WithParams` form.
///
/// ```toml
/// operation = "seamless_clone"
/// dst = "beach.png"
/// mask = "mask.png"
/// p = [120, 80]
/// flags = 2
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Job {
    /// `ColorChange_Async`.
    ColorChange {
        /// Region to recolour.
        mask: PathBuf,
        /// Red gradient multiplier.
        #[serde(default = "unit")]
        red_mul: f32,
        /// Green gradient multiplier.
        #[serde(default = "unit")]
        green_mul: f32,
        /// Blue gradient multiplier.
        #[serde(default = "unit")]
        blue_mul: f32,
    },
    /// `SeamlessClone_Async`; the first input is the source.
    SeamlessClone {
        /// Destination image.
        dst: PathBuf,
        /// Region of the source to clone.
        mask: PathBuf,
        /// Centre of the clone in `dst`; defaults to the centre of `dst`.
        p: Option<[i32; 2]>,
        /// 1 normal, 2 mixed, 3 monochrome transfer.
        #[serde(default = "normal_clone")]
        flags: i32,
    },
    /// `IlluminationChange_Async`.
    IlluminationChange {
        /// Region to relight.
        mask: PathBuf,
        /// Gradient gain.
        #[serde(default = "default_alpha")]
        alpha: f32,
        /// Gradient compression exponent.
        #[serde(default = "default_beta")]
        beta: f32,
    },
    /// `TextureFlattening_Async`.
    TextureFlattening {
        /// Region to flatten.
        mask: PathBuf,
        /// Lower Canny threshold.
        #[serde(default = "default_low_threshold")]
        low_threshold: f32,
        /// Upper Canny threshold.
        #[serde(default = "default_high_threshold")]
        high_threshold: f32,
        /// Sobel aperture (3, 5 or 7).
        #[serde(default = "default_kernel_size")]
        kernel_size: i32,
    },
    /// `FastNlMeansDenoising_Async` or its `WithParams` form.
    FastNlMeansDenoising {
        /// Filter strength.
        h: Option<f32>,
        /// Template patch size.
        template_window_size: Option<i32>,
        /// Search window size.
        search_window_size: Option<i32>,
    },
    /// `FastNlMeansDenoisingColored_Async` or its `WithParams` form.
    FastNlMeansDenoisingColored {
        /// Lightness filter strength.
        h: Option<f32>,
        /// Colour filter strength.
        h_color: Option<f32>,
        /// Template patch size.
        template_window_size: Option<i32>,
        /// Search window size.
        search_window_size: Option<i32>,
    },
    /// `FastNlMeansDenoisingColoredMulti_Async` or its `WithParams` form;
    /// every input is one frame.
    FastNlMeansDenoisingColoredMulti {
        /// Frame to denoise.
        img_to_denoise_index: i32,
        /// Number of frames used, odd.
        temporal_window_size: i32,
        /// Lightness filter strength.
        h: Option<f32>,
        /// Colour filter strength.
        h_color: Option<f32>,
        /// Template patch size.
        template_window_size: Option<i32>,
        /// Search window size.
        search_window_size: Option<i32>,
    },
    /// `MergeMertens_Create[WithParams]_Async` then `MergeMertens_Process_Async`;
    /// every input is one exposure.
    MergeMertens {
        /// Contrast exponent.
        contrast_weight: Option<f32>,
        /// Saturation exponent.
        saturation_weight: Option<f32>,
        /// Well-exposedness exponent.
        exposure_weight: Option<f32>,
    },
    /// `AlignMTB_Create[WithParams]_Async` then `AlignMTB_Process_Async`;
    /// every input is one exposure.
    AlignMtb {
        /// Pyramid depth bound.
        max_bits: Option<i32>,
        /// Noise band around the median.
        exclude_range: Option<i32>,
        /// Crop to the common area.
        cut: Option<bool>,
    },
    /// `DetailEnhance_Async`.
    DetailEnhance {
        /// Spatial sigma.
        #[serde(default = "default_detail_sigma_s")]
        sigma_s: f32,
        /// Range sigma.
        #[serde(default = "default_detail_sigma_r")]
        sigma_r: f32,
    },
    /// `EdgePreservingFilter_Async`.
    EdgePreservingFilter {
        /// 1 recursive, 2 normalized convolution.
        #[serde(default = "recursive_filter")]
        filter: i32,
        /// Spatial sigma.
        #[serde(default = "default_sigma_s")]
        sigma_s: f32,
        /// Range sigma.
        #[serde(default = "default_edge_sigma_r")]
        sigma_r: f32,
    },
    /// `PencilSketch_Async`. Writes the sketch to the output path and the
    /// colour rendering next to it.
    PencilSketch {
        /// Spatial sigma.
        #[serde(default = "default_sigma_s")]
        sigma_s: f32,
        /// Range sigma.
        #[serde(default = "default_pencil_sigma_r")]
        sigma_r: f32,
        /// Shading weight.
        #[serde(default = "default_shade_factor")]
        shade_factor: f32,
    },
    /// `Stylization_Async`.
    Stylization {
        /// Spatial sigma.
        #[serde(default = "default_sigma_s")]
        sigma_s: f32,
        /// Range sigma.
        #[serde(default = "default_stylization_sigma_r")]
        sigma_r: f32,
    },
    /// `PhotoInpaint_Async`.
    Inpaint {
        /// Pixels to fill.
        mask: PathBuf,
        /// Neighbourhood radius.
        #[serde(default = "default_inpaint_radius")]
        inpaint_radius: f32,
        /// 0 Navier-Stokes, 1 Telea.
        #[serde(default = "telea")]
        algorithm: i32,
    },
}

fn unit() -> f32 {
    1.0
}
fn normal_clone() -> i32 {
    1
}
fn default_alpha() -> f32 {
    0.2
}
fn default_beta() -> f32 {
    0.4
}
fn default_low_threshold() -> f32 {
    30.0
}
fn default_high_threshold() -> f32 {
    45.0
}
fn default_kernel_size() -> i32 {
    3
}
fn default_detail_sigma_s() -> f32 {
    10.0
}
fn default_detail_sigma_r() -> f32 {
    0.15
}
fn recursive_filter() -> i32 {
    1
}
fn default_sigma_s() -> f32 {
    60.0
}
fn default_edge_sigma_r() -> f32 {
    0.4
}
fn default_pencil_sigma_r() -> f32 {
    0.07
}
fn default_shade_factor() -> f32 {
    0.02
}
fn default_stylization_sigma_r() -> f32 {
    0.45
}
fn default_inpaint_radius() -> f32 {
    3.0
}
fn telea() -> i32 {
    1
}

/// Library defaults for the NL-means knobs.
pub const NL_MEANS_H: f32 = 3.0;
/// Default colour filter strength.
pub const NL_MEANS_H_COLOR: f32 = 3.0;
/// Default template patch size.
pub const NL_MEANS_TEMPLATE_WINDOW_SIZE: i32 = 7;
/// Default search window size.
pub const NL_MEANS_SEARCH_WINDOW_SIZE: i32 = 21;

/// Library defaults for the Mertens fusion weights, used when a job sets
/// only some of them.
pub const MERGE_MERTENS_CONTRAST_WEIGHT: f32 = 1.0;
/// Default saturation weight.
pub const MERGE_MERTENS_SATURATION_WEIGHT: f32 = 1.0;
/// Default well-exposedness weight.
pub const MERGE_MERTENS_EXPOSURE_WEIGHT: f32 = 0.0;

/// Library defaults for median threshold bitmap alignment.
pub const ALIGN_MTB_MAX_BITS: i32 = 6;
/// Default noise band around the median.
pub const ALIGN_MTB_EXCLUDE_RANGE: i32 = 4;
/// Crop aligned images to their common area by default.
pub const ALIGN_MTB_CUT: bool = true;

impl Job {
    /// Parses a job file.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Operation name as written in the job file.
    pub fn name(&self) -> &'static str {
        match self {
            Job::ColorChange { .. } => "color_change",
            Job::SeamlessClone { .. } => "seamless_clone",
            Job::IlluminationChange { .. } => "illumination_change",
            Job::TextureFlattening { .. } => "texture_flattening",
            Job::FastNlMeansDenoising { .. } => "fast_nl_means_denoising",
            Job::FastNlMeansDenoisingColored { .. } => "fast_nl_means_denoising_colored",
            Job::FastNlMeansDenoisingColoredMulti { .. } => "fast_nl_means_denoising_colored_multi",
            Job::MergeMertens { .. } => "merge_mertens",
            Job::AlignMtb { .. } => "align_mtb",
            Job::DetailEnhance { .. } => "detail_enhance",
            Job::EdgePreservingFilter { .. } => "edge_preserving_filter",
            Job::PencilSketch { .. } => "pencil_sketch",
            Job::Stylization { .. } => "stylization",
            Job::Inpaint { .. } => "inpaint",
        }
    }

    /// Minimum number of `--input` images.
    pub fn min_inputs(&self) -> usize {
        match self {
            Job::FastNlMeansDenoisingColoredMulti { temporal_window_size, .. } => {
                usize::try_from(*temporal_window_size).unwrap_or(1).max(1)
            }
            Job::MergeMertens { .. } | Job::AlignMtb { .. } => 2,
            _ => 1,
        }
    }

    /// Extra image files named in the job itself.
    pub fn extra_inputs(&self) -> Vec<&Path> {
        match self {
            Job::SeamlessClone { dst, mask, .. } => vec![dst, mask],
            Job::ColorChange { mask, .. }
            | Job::IlluminationChange { mask, .. }
            | Job::TextureFlattening { mask, .. }
            | Job::Inpaint { mask, .. } => vec![mask],
            _ => Vec::new(),
        }
        .into_iter()
        .map(PathBuf::as_path)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_change_defaults_to_unit_multipliers() {
        let job = Job::parse("operation = \"color_change\"\nmask = \"m.png\"\nred_mul = 2.0\n").unwrap();
        assert_eq!(
            job,
            Job::ColorChange { mask: "m.png".into(), red_mul: 2.0, green_mul: 1.0, blue_mul: 1.0 }
        );
        assert_eq!(job.extra_inputs(), vec![Path::new("m.png")]);
    }

    #[test]
    fn seamless_clone_reads_point_and_flags() {
        let text = r#"
            operation = "seamless_clone"
            dst = "dst.png"
            mask = "mask.png"
            p = [8, 9]
            flags = 2
        "#;
        let job = Job::parse(text).unwrap();
        assert_eq!(
            job,
            Job::SeamlessClone { dst: "dst.png".into(), mask: "mask.png".into(), p: Some([8, 9]), flags: 2 }
        );
        assert_eq!(job.extra_inputs().len(), 2);
        assert_eq!(job.name(), "seamless_clone");
    }

    #[test]
    fn denoising_knobs_are_optional() {
        let job = Job::parse("operation = \"fast_nl_means_denoising\"").unwrap();
        assert_eq!(
            job,
            Job::FastNlMeansDenoising { h: None, template_window_size: None, search_window_size: None }
        );

        let job = Job::parse("operation = \"fast_nl_means_denoising\"\nh = 10.0").unwrap();
        assert!(matches!(job, Job::FastNlMeansDenoising { h: Some(h), .. } if h == 10.0));
    }

    #[test]
    fn multi_frame_window_sets_input_count() {
        let text = "operation = \"fast_nl_means_denoising_colored_multi\"\nimg_to_denoise_index = 2\ntemporal_window_size = 5";
        let job = Job::parse(text).unwrap();
        assert_eq!(job.min_inputs(), 5);
    }

    #[test]
    fn npr_defaults() {
        let job = Job::parse("operation = \"pencil_sketch\"").unwrap();
        assert_eq!(job, Job::PencilSketch { sigma_s: 60.0, sigma_r: 0.07, shade_factor: 0.02 });
        let job = Job::parse("operation = \"edge_preserving_filter\"\nfilter = 2").unwrap();
        assert_eq!(job, Job::EdgePreservingFilter { filter: 2, sigma_s: 60.0, sigma_r: 0.4 });
    }

    #[test]
    fn algorithm_jobs_need_a_sequence() {
        let job = Job::parse("operation = \"align_mtb\"\ncut = false").unwrap();
        assert_eq!(job, Job::AlignMtb { max_bits: None, exclude_range: None, cut: Some(false) });
        assert_eq!(job.min_inputs(), 2);
    }

    #[test]
    fn fallback_constants_track_the_library() {
        use photo_core::denoise;
        use photo_core::{AlignMtb, MergeMertens};

        assert_eq!(NL_MEANS_H, denoise::DEFAULT_H);
        assert_eq!(NL_MEANS_H_COLOR, denoise::DEFAULT_H_COLOR);
        assert_eq!(NL_MEANS_TEMPLATE_WINDOW_SIZE, denoise::DEFAULT_TEMPLATE_WINDOW_SIZE);
        assert_eq!(NL_MEANS_SEARCH_WINDOW_SIZE, denoise::DEFAULT_SEARCH_WINDOW_SIZE);
        assert_eq!(MERGE_MERTENS_CONTRAST_WEIGHT, MergeMertens::DEFAULT_CONTRAST_WEIGHT);
        assert_eq!(MERGE_MERTENS_SATURATION_WEIGHT, MergeMertens::DEFAULT_SATURATION_WEIGHT);
        assert_eq!(MERGE_MERTENS_EXPOSURE_WEIGHT, MergeMertens::DEFAULT_EXPOSURE_WEIGHT);
        assert_eq!(ALIGN_MTB_MAX_BITS, AlignMtb::DEFAULT_MAX_BITS);
        assert_eq!(ALIGN_MTB_EXCLUDE_RANGE, AlignMtb::DEFAULT_EXCLUDE_RANGE);
        assert_eq!(ALIGN_MTB_CUT, AlignMtb::DEFAULT_CUT);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        assert!(Job::parse("operation = \"sharpen\"").is_err());
        assert!(Job::parse("mask = \"m.png\"").is_err());
    }

    #[test]
    fn inpaint_requires_mask() {
        assert!(Job::parse("operation = \"inpaint\"").is_err());
        let job = Job::parse("operation = \"inpaint\"\nmask = \"hole.png\"\nalgorithm = 0").unwrap();
        assert_eq!(job, Job::Inpaint { mask: "hole.png".into(), inpaint_radius: 3.0, algorithm: 0 });
    }
}
