//! Non-local means denoising for single images and short sequences.
//!
//! Patch distances are computed per search offset with an `imageproc`
//! integral image of squared differences, so the cost does not depend on the
//! template size. Samples are 8-bit values held in `f32`.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::integral_squared_image;

use crate::color;
use crate::error::{PhotoError, Result, ensure};
use crate::mat::Mat;
use crate::plane::{reflect101, saturate_u8};

/// Default filter strength for luminance.
pub const DEFAULT_H: f32 = 3.0;
/// Default filter strength for colour components.
pub const DEFAULT_H_COLOR: f32 = 3.0;
/// Default template patch size.
pub const DEFAULT_TEMPLATE_WINDOW_SIZE: i32 = 7;
/// Default search window size.
pub const DEFAULT_SEARCH_WINDOW_SIZE: i32 = 21;

/// Tuning knobs shared by the NL-means variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Filter strength. Larger values remove more noise and more detail.
    pub h: f32,
    /// Filter strength for colour components (coloured variants only).
    pub h_color: f32,
    /// Side of the square patch compared between pixels.
    pub template_window_size: i32,
    /// Side of the square area searched for similar patches.
    pub search_window_size: i32,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            h: DEFAULT_H,
            h_color: DEFAULT_H_COLOR,
            template_window_size: DEFAULT_TEMPLATE_WINDOW_SIZE,
            search_window_size: DEFAULT_SEARCH_WINDOW_SIZE,
        }
    }
}

impl NlMeansParams {
    fn radii(&self, func: &'static str) -> Result<(usize, usize)> {
        if self.template_window_size <= 0 || self.search_window_size <= 0 {
            return Err(PhotoError::bad_argument(
                func,
                format!(
                    "window sizes must be positive, got template {} search {}",
                    self.template_window_size, self.search_window_size
                ),
            ));
        }
        Ok((
            (self.template_window_size / 2) as usize,
            (self.search_window_size / 2) as usize,
        ))
    }
}

/// Interleaved frame with reflect-101 padding of `pad` pixels on each side.
struct Padded {
    width: usize,
    cn: usize,
    pad: usize,
    data: Vec<f32>,
}

impl Padded {
    fn new(samples: &[f32], w: usize, h: usize, cn: usize, pad: usize) -> Self {
        let pw = w + 2 * pad;
        let ph = h + 2 * pad;
        let mut data = vec![0.0; pw * ph * cn];
        for y in 0..ph {
            let sy = reflect101(y as isize - pad as isize, h);
            for x in 0..pw {
                let sx = reflect101(x as isize - pad as isize, w);
                let s = (sy * w + sx) * cn;
                let d = (y * pw + x) * cn;
                data[d..d + cn].copy_from_slice(&samples[s..s + cn]);
            }
        }
        Self { width: pw, cn, pad, data }
    }

    /// Samples at unpadded coordinates (`x`, `y`), which may be negative
    /// down to `-pad`.
    #[inline]
    fn px(&self, x: isize, y: isize) -> &[f32] {
        let px = (x + self.pad as isize) as usize;
        let py = (y + self.pad as isize) as usize;
        let i = (py * self.width + px) * self.cn;
        &self.data[i..i + self.cn]
    }
}

/// Denoises `frames[target]` using patches from every frame in `frames`.
#[allow(clippy::too_many_arguments)]
fn nl_means(
    frames: &[Vec<f32>],
    target: usize,
    w: usize,
    h: usize,
    cn: usize,
    strength: f32,
    template_radius: usize,
    search_radius: usize,
) -> Vec<f32> {
    let pad = template_radius + search_radius;
    let padded: Vec<Padded> = frames.iter().map(|f| Padded::new(f, w, h, cn, pad)).collect();
    let reference = &padded[target];

    let tr = template_radius as isize;
    let sr = search_radius as isize;
    let side = 2 * template_radius + 1;
    let norm = (side * side * cn) as f64;
    let h2 = (strength as f64) * (strength as f64);

    // Difference images cover target pixels expanded by the template radius.
    let ew = (w + 2 * template_radius) as u32;
    let eh = (h + 2 * template_radius) as u32;

    let mut weight_sum = vec![0.0f64; w * h];
    let mut value_sum = vec![0.0f64; w * h * cn];

    for frame in &padded {
        for dy in -sr..=sr {
            for dx in -sr..=sr {
                let integrals: Vec<Image<Luma<u64>>> = (0..cn)
                    .map(|c| {
                        let diff = GrayImage::from_fn(ew, eh, |ex, ey| {
                            let (x, y) = (ex as isize - tr, ey as isize - tr);
                            let a = reference.px(x, y)[c];
                            let b = frame.px(x + dx, y + dy)[c];
                            Luma([(a - b).abs() as u8])
                        });
                        integral_squared_image::<_, u64>(&diff)
                    })
                    .collect();

                for y in 0..h {
                    for x in 0..w {
                        let (x0, y0) = (x as u32, y as u32);
                        let (x1, y1) = (x0 + side as u32, y0 + side as u32);
                        let ssd: u64 = integrals
                            .iter()
                            .map(|sum| {
                                sum.get_pixel(x1, y1)[0] + sum.get_pixel(x0, y0)[0]
                                    - sum.get_pixel(x1, y0)[0]
                                    - sum.get_pixel(x0, y1)[0]
                            })
                            .sum();
                        let dist = ssd as f64 / norm;
                        let weight = if h2 > 0.0 {
                            (-dist / h2).exp()
                        } else if dist == 0.0 {
                            1.0
                        } else {
                            0.0
                        };
                        if weight == 0.0 {
                            continue;
                        }
                        let i = y * w + x;
                        weight_sum[i] += weight;
                        let sample = frame.px(x as isize + dx, y as isize + dy);
                        for c in 0..cn {
                            value_sum[i * cn + c] += weight * sample[c] as f64;
                        }
                    }
                }
            }
        }
    }

    value_sum
        .iter()
        .enumerate()
        .map(|(i, &v)| (v / weight_sum[i / cn]) as f32)
        .collect()
}

fn to_samples(mat: &Mat, func: &'static str) -> Result<Vec<f32>> {
    Ok(mat.expect_u8(func)?.iter().map(|&v| v as f32).collect())
}

/// Denoises a grayscale (or any 8-bit, 1 to 4 channel) image.
pub fn fast_nl_means_denoising(src: &Mat, params: &NlMeansParams) -> Result<Mat> {
    const FUNC: &str = "fastNlMeansDenoising";
    ensure(!src.is_empty(), FUNC, "!src.empty()")?;
    let (tr, sr) = params.radii(FUNC)?;
    let samples = to_samples(src, FUNC)?;
    let (w, h, cn) = (src.cols(), src.rows(), src.channels());
    tracing::debug!(width = w, height = h, channels = cn, h = params.h, "nl-means denoising");
    let out = nl_means(&[samples], 0, w, h, cn, params.h, tr, sr);
    Mat::from_u8(h, w, cn, out.into_iter().map(saturate_u8).collect())
}

/// Converts 8-bit BGR samples to rounded 8-bit Lab, split into L and ab.
fn split_lab(samples: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let n = samples.len() / 3;
    let mut l = Vec::with_capacity(n);
    let mut ab = Vec::with_capacity(n * 2);
    for px in samples.chunks_exact(3) {
        let lab = color::bgr8_to_lab8([px[0], px[1], px[2]]);
        l.push(saturate_u8(lab[0]) as f32);
        ab.push(saturate_u8(lab[1]) as f32);
        ab.push(saturate_u8(lab[2]) as f32);
    }
    (l, ab)
}

fn merge_lab(l: &[f32], ab: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(l.len() * 3);
    for (i, &lv) in l.iter().enumerate() {
        let lab = [
            saturate_u8(lv) as f32,
            saturate_u8(ab[2 * i]) as f32,
            saturate_u8(ab[2 * i + 1]) as f32,
        ];
        let bgr = color::lab8_to_bgr8(lab);
        out.extend(bgr.iter().map(|&v| saturate_u8(v)));
    }
    out
}

fn check_color(src: &Mat, func: &'static str) -> Result<()> {
    ensure(!src.is_empty(), func, "!src.empty()")?;
    src.expect_u8(func)?;
    if src.channels() != 3 {
        return Err(PhotoError::unsupported(
            func,
            format!("type of input image should be 8UC3, got {}", src.mat_type()),
        ));
    }
    Ok(())
}

/// Denoises an 8-bit BGR image in Lab space: lightness with `h`, colour
/// with `h_color`.
pub fn fast_nl_means_denoising_colored(src: &Mat, params: &NlMeansParams) -> Result<Mat> {
    const FUNC: &str = "fastNlMeansDenoisingColored";
    check_color(src, FUNC)?;
    let (tr, sr) = params.radii(FUNC)?;
    let (w, h) = (src.cols(), src.rows());
    let (l, ab) = split_lab(&to_samples(src, FUNC)?);
    let l = nl_means(&[l], 0, w, h, 1, params.h, tr, sr);
    let ab = nl_means(&[ab], 0, w, h, 2, params.h_color, tr, sr);
    Mat::from_u8(h, w, 3, merge_lab(&l, &ab))
}

/// Denoises `frames[img_to_denoise_index]` using its temporal neighbours.
///
/// `temporal_window_size` must be odd and the window must fit inside the
/// sequence.
pub fn fast_nl_means_denoising_colored_multi(
    frames: &[Mat],
    img_to_denoise_index: i32,
    temporal_window_size: i32,
    params: &NlMeansParams,
) -> Result<Mat> {
    const FUNC: &str = "fastNlMeansDenoisingColoredMulti";
    ensure(!frames.is_empty(), FUNC, "!srcImgs.empty()")?;
    ensure(
        temporal_window_size > 0 && temporal_window_size % 2 == 1,
        FUNC,
        "temporalWindowSize % 2 == 1",
    )?;
    let half = i64::from(temporal_window_size / 2);
    let index = i64::from(img_to_denoise_index);
    let n = frames.len() as i64;
    ensure(
        index - half >= 0 && index + half < n,
        FUNC,
        "imgToDenoiseIndex - temporalWindowSize / 2 >= 0 && \
         imgToDenoiseIndex + temporalWindowSize / 2 < (int)srcImgs.size()",
    )?;
    let first = &frames[0];
    for frame in frames {
        check_color(frame, FUNC)?;
        if !frame.same_size(first) {
            return Err(PhotoError::size_mismatch(
                FUNC,
                "input images must have the same size",
            ));
        }
    }
    let (tr, sr) = params.radii(FUNC)?;
    let (w, h) = (first.cols(), first.rows());

    let start = (index - half) as usize;
    let end = (index + half) as usize;
    let mut ls = Vec::with_capacity(end - start + 1);
    let mut abs = Vec::with_capacity(end - start + 1);
    for frame in &frames[start..=end] {
        let (l, ab) = split_lab(&to_samples(frame, FUNC)?);
        ls.push(l);
        abs.push(ab);
    }
    let target = half as usize;
    let l = nl_means(&ls, target, w, h, 1, params.h, tr, sr);
    let ab = nl_means(&abs, target, w, h, 2, params.h_color, tr, sr);
    Mat::from_u8(h, w, 3, merge_lab(&l, &ab))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy(rows: usize, cols: usize, cn: usize) -> Mat {
        let mut state = 12345u32;
        let mut data = Vec::with_capacity(rows * cols * cn);
        for _ in 0..rows * cols * cn {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let jitter = ((state >> 16) % 21) as i32 - 10;
            data.push((120 + jitter) as u8);
        }
        Mat::from_u8(rows, cols, cn, data).unwrap()
    }

    fn variance(m: &Mat) -> f64 {
        let d = m.data_u8().unwrap();
        let mean = d.iter().map(|&v| v as f64).sum::<f64>() / d.len() as f64;
        d.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / d.len() as f64
    }

    #[test]
    fn constant_image_is_unchanged() {
        let src = Mat::filled(5, 5, &[77]).unwrap();
        let out = fast_nl_means_denoising(&src, &NlMeansParams::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn denoising_reduces_variance() {
        let src = noisy(12, 12, 1);
        let params = NlMeansParams { h: 30.0, template_window_size: 3, search_window_size: 7, ..Default::default() };
        let out = fast_nl_means_denoising(&src, &params).unwrap();
        assert!(variance(&out) < variance(&src));
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let src = Mat::filled(4, 4, &[1]).unwrap();
        let params = NlMeansParams { template_window_size: 0, ..Default::default() };
        assert!(matches!(
            fast_nl_means_denoising(&src, &params),
            Err(PhotoError::BadArgument { .. })
        ));
    }

    #[test]
    fn colored_requires_three_channels() {
        let src = Mat::filled(4, 4, &[1]).unwrap();
        assert!(fast_nl_means_denoising_colored(&src, &NlMeansParams::default()).is_err());
    }

    #[test]
    fn colored_keeps_gray_close() {
        let src = Mat::filled(4, 4, &[128, 128, 128]).unwrap();
        let out = fast_nl_means_denoising_colored(&src, &NlMeansParams::default()).unwrap();
        for &v in out.data_u8().unwrap() {
            assert!((v as i32 - 128).abs() <= 1, "{v}");
        }
    }

    #[test]
    fn multi_checks_temporal_window() {
        let frames = vec![noisy(6, 6, 3), noisy(6, 6, 3), noisy(6, 6, 3)];
        let params = NlMeansParams { template_window_size: 3, search_window_size: 5, ..Default::default() };
        assert!(fast_nl_means_denoising_colored_multi(&frames, 1, 2, &params).is_err());
        assert!(fast_nl_means_denoising_colored_multi(&frames, 0, 3, &params).is_err());
        let out = fast_nl_means_denoising_colored_multi(&frames, 1, 3, &params).unwrap();
        assert_eq!((out.rows(), out.cols(), out.channels()), (6, 6, 3));
    }

    #[test]
    fn multi_rejects_mismatched_frames() {
        let frames = vec![noisy(6, 6, 3), noisy(5, 6, 3), noisy(6, 6, 3)];
        let err = fast_nl_means_denoising_colored_multi(&frames, 1, 3, &NlMeansParams::default()).unwrap_err();
        assert!(matches!(err, PhotoError::SizeMismatch { .. }));
    }
}
