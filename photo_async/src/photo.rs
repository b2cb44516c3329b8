//! Computational photography entry points.
//!
//! Every function runs to completion on the calling thread. On success it
//! invokes the callback exactly once with freshly boxed output handles, which
//! the caller owns, and returns null. On failure it returns a [`CvStatus`]
//! and never invokes the callback.
//!
//! # Safety
//!
//! The contract shared by every entry point:
//! - input handles are live handles created by this library, not released
//!   or mutated by another thread during the call;
//! - the callback accepts one pointer per output, of the handle type the
//!   entry point documents (`*mut Mat`, `*mut VecMat`, `*mut MergeMertens`
//!   or `*mut AlignMTB`), and does not unwind.
//!
//! Parameter validation is left to `photo_core`; its errors are reported
//! as `LibraryError` statuses.

use photo_core::{CloneMode, EdgeFilter, InpaintMethod, NlMeansParams};

use crate::error::ShimError;
use crate::handle::{AlignMTB, Handle, Mat, MergeMertens, Point, VecMat};
use crate::status::{CvCallback_1, CvCallback_2, CvStatus, deliver_1, deliver_2, envelope};

/// Scales the colours of the masked region of `src` by the given
/// per-channel multipliers. Delivers a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ColorChange_Async(
    src: Mat,
    mask: Mat,
    red_mul: f32,
    green_mul: f32,
    blue_mul: f32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("ColorChange_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (src, mask) = unsafe { (src.native()?, mask.native()?) };
        let dst = photo_core::color_change(src, mask, red_mul, green_mul, blue_mul)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Blends the masked region of `src` into `dst` centred at `p`.
/// `flags`: 1 normal, 2 mixed, 3 monochrome transfer. Delivers a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn SeamlessClone_Async(
    src: Mat,
    dst: Mat,
    mask: Mat,
    p: Point,
    flags: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("SeamlessClone_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (src, dst, mask) = unsafe { (src.native()?, dst.native()?, mask.native()?) };
        let blend = photo_core::seamless_clone(src, dst, mask, p.into(), CloneMode::from_flag(flags)?)?;
        deliver_1(callback, Mat::into_raw(blend));
        Ok(())
    })
}

/// Changes the apparent illumination of the masked region. Delivers a
/// `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn IlluminationChange_Async(
    src: Mat,
    mask: Mat,
    alpha: f32,
    beta: f32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("IlluminationChange_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (src, mask) = unsafe { (src.native()?, mask.native()?) };
        let dst = photo_core::illumination_change(src, mask, alpha, beta)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Washes out texture inside the mask, keeping only Canny edges. Delivers
/// a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn TextureFlattening_Async(
    src: Mat,
    mask: Mat,
    low_threshold: f32,
    high_threshold: f32,
    kernel_size: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("TextureFlattening_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (src, mask) = unsafe { (src.native()?, mask.native()?) };
        let dst = photo_core::texture_flattening(src, mask, low_threshold, high_threshold, kernel_size)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// NL-means denoising with the library defaults. Delivers a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FastNlMeansDenoising_Async(src: Mat, callback: CvCallback_1) -> *mut CvStatus {
    envelope!("FastNlMeansDenoising_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let dst = photo_core::fast_nl_means_denoising(src, &NlMeansParams::default())?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FastNlMeansDenoisingWithParams_Async(
    src: Mat,
    h: f32,
    template_window_size: i32,
    search_window_size: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("FastNlMeansDenoisingWithParams_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let params = NlMeansParams { h, template_window_size, search_window_size, ..NlMeansParams::default() };
        let dst = photo_core::fast_nl_means_denoising(src, &params)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Colour NL-means denoising with the library defaults. Delivers a
/// `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FastNlMeansDenoisingColored_Async(src: Mat, callback: CvCallback_1) -> *mut CvStatus {
    envelope!("FastNlMeansDenoisingColored_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let dst = photo_core::fast_nl_means_denoising_colored(src, &NlMeansParams::default())?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FastNlMeansDenoisingColoredWithParams_Async(
    src: Mat,
    h: f32,
    h_color: f32,
    template_window_size: i32,
    search_window_size: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("FastNlMeansDenoisingColoredWithParams_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let params = NlMeansParams { h, h_color, template_window_size, search_window_size };
        let dst = photo_core::fast_nl_means_denoising_colored(src, &params)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Denoises frame `img_to_denoise_index` of `src` using
/// `temporal_window_size` neighbouring frames. Delivers a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn FastNlMeansDenoisingColoredMulti_Async(
    src: VecMat,
    img_to_denoise_index: i32,
    temporal_window_size: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("FastNlMeansDenoisingColoredMulti_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let frames = unsafe { src.native()? };
        let dst = photo_core::fast_nl_means_denoising_colored_multi(
            frames,
            img_to_denoise_index,
            temporal_window_size,
            &NlMeansParams::default(),
        )?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn FastNlMeansDenoisingColoredMultiWithParams_Async(
    src: VecMat,
    img_to_denoise_index: i32,
    temporal_window_size: i32,
    h: f32,
    h_color: f32,
    template_window_size: i32,
    search_window_size: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("FastNlMeansDenoisingColoredMultiWithParams_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let frames = unsafe { src.native()? };
        let params = NlMeansParams { h, h_color, template_window_size, search_window_size };
        let dst = photo_core::fast_nl_means_denoising_colored_multi(
            frames,
            img_to_denoise_index,
            temporal_window_size,
            &params,
        )?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Creates an exposure fusion algorithm with the default weights.
/// Delivers a `*mut MergeMertens`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn MergeMertens_Create_Async(callback: CvCallback_1) -> *mut CvStatus {
    envelope!("MergeMertens_Create_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        deliver_1(callback, MergeMertens::into_raw(photo_core::MergeMertens::new()));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn MergeMertens_CreateWithParams_Async(
    contrast_weight: f32,
    saturation_weight: f32,
    exposure_weight: f32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("MergeMertens_CreateWithParams_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        let merge = photo_core::MergeMertens::with_weights(contrast_weight, saturation_weight, exposure_weight);
        deliver_1(callback, MergeMertens::into_raw(merge));
        Ok(())
    })
}

/// Fuses the exposures in `src`. Delivers a `*mut Mat` of float samples.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn MergeMertens_Process_Async(b: MergeMertens, src: VecMat, callback: CvCallback_1) -> *mut CvStatus {
    envelope!("MergeMertens_Process_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (merge, images) = unsafe { (b.native()?, src.native()?) };
        let dst = merge.process(images)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Creates an alignment algorithm with the default parameters. Delivers a
/// `*mut AlignMTB`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AlignMTB_Create_Async(callback: CvCallback_1) -> *mut CvStatus {
    envelope!("AlignMTB_Create_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        deliver_1(callback, AlignMTB::into_raw(photo_core::AlignMtb::new()));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AlignMTB_CreateWithParams_Async(
    max_bits: i32,
    exclude_range: i32,
    cut: bool,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("AlignMTB_CreateWithParams_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        let align = photo_core::AlignMtb::with_params(max_bits, exclude_range, cut);
        deliver_1(callback, AlignMTB::into_raw(align));
        Ok(())
    })
}

/// Aligns the images in `src` to the middle one. Delivers a `*mut VecMat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AlignMTB_Process_Async(b: AlignMTB, src: VecMat, callback: CvCallback_1) -> *mut CvStatus {
    envelope!("AlignMTB_Process_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (align, images) = unsafe { (b.native()?, src.native()?) };
        let aligned = align.process(images)?;
        deliver_1(callback, VecMat::into_raw(aligned));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn DetailEnhance_Async(src: Mat, sigma_s: f32, sigma_r: f32, callback: CvCallback_1) -> *mut CvStatus {
    envelope!("DetailEnhance_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let dst = photo_core::detail_enhance(src, sigma_s, sigma_r)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Edge-preserving smoothing. `filter`: 1 recursive, 2 normalized
/// convolution. Delivers a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn EdgePreservingFilter_Async(
    src: Mat,
    filter: i32,
    sigma_s: f32,
    sigma_r: f32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("EdgePreservingFilter_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let dst = photo_core::edge_preserving_filter(src, EdgeFilter::from_flag(filter)?, sigma_s, sigma_r)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Pencil sketch rendering. Delivers two `*mut Mat`: the single-channel
/// sketch, then the colour rendering.
///
/// `dst1` and `dst2` are accepted for signature compatibility and are
/// neither read nor written; they may be empty or null handles. The outputs
/// are always freshly allocated.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PencilSketch_Async(
    src: Mat,
    _dst1: Mat,
    _dst2: Mat,
    sigma_s: f32,
    sigma_r: f32,
    shade_factor: f32,
    callback: CvCallback_2,
) -> *mut CvStatus {
    envelope!("PencilSketch_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let (sketch, colored) = photo_core::pencil_sketch(src, sigma_s, sigma_r, shade_factor)?;
        deliver_2(callback, Mat::into_raw(sketch), Mat::into_raw(colored));
        Ok(())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Stylization_Async(src: Mat, sigma_s: f32, sigma_r: f32, callback: CvCallback_1) -> *mut CvStatus {
    envelope!("Stylization_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handle per the module contract.
        let src = unsafe { src.native()? };
        let dst = photo_core::stylization(src, sigma_s, sigma_r)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}

/// Fills the non-zero pixels of `mask`. `algorithm_type`: 0 Navier-Stokes,
/// 1 Telea. Delivers a `*mut Mat`.
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PhotoInpaint_Async(
    src: Mat,
    mask: Mat,
    inpaint_radius: f32,
    algorithm_type: i32,
    callback: CvCallback_1,
) -> *mut CvStatus {
    envelope!("PhotoInpaint_Async", {
        let callback = callback.ok_or(ShimError::NullCallback)?;
        // SAFETY: live input handles per the module contract.
        let (src, mask) = unsafe { (src.native()?, mask.native()?) };
        let dst = photo_core::inpaint(src, mask, inpaint_radius, InpaintMethod::from_flag(algorithm_type)?)?;
        deliver_1(callback, Mat::into_raw(dst));
        Ok(())
    })
}
