//! Single-channel float planes and the filtering primitives built on them.
//!
//! Routines split a [`Mat`] into planes, work in `f32`, and merge the result
//! back with saturating rounding. Planes are `imageproc` luma images, so the
//! filters here pad borders by replicating the edge sample.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::filter::separable_filter;

use crate::mat::Mat;

/// One float channel of a matrix.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plane(Image<Luma<f32>>);

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self(ImageBuffer::from_pixel(width as u32, height as u32, Luma([value])))
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        Self(ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            Luma([f(x as usize, y as usize)])
        }))
    }

    pub fn from_image(image: Image<Luma<f32>>) -> Self {
        Self(image)
    }

    pub fn from_luma8(gray: &GrayImage) -> Self {
        Self(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([f32::from(gray.get_pixel(x, y)[0])])
        }))
    }

    /// 8-bit copy with saturating round-half-even.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.0.width(), self.0.height(), |x, y| {
            Luma([saturate_u8(self.0.get_pixel(x, y)[0])])
        })
    }

    pub fn image(&self) -> &Image<Luma<f32>> {
        &self.0
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    /// Row-major samples.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &*self.0
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut *self.0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.0.get_pixel(x as u32, y as u32)[0]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.0.put_pixel(x as u32, y as u32, Luma([v]));
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Plane {
        let mut out = self.clone();
        out.data_mut().iter_mut().for_each(|v| *v = f(*v));
        out
    }

    pub fn zip_map(&self, other: &Plane, f: impl Fn(f32, f32) -> f32) -> Plane {
        debug_assert_eq!(self.data().len(), other.data().len());
        let mut out = self.clone();
        for (v, &b) in out.data_mut().iter_mut().zip(other.data()) {
            *v = f(*v, b);
        }
        out
    }
}

/// Maps an out-of-range index back into `0..n` by mirroring without
/// repeating the edge sample.
#[inline]
pub(crate) fn reflect101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        } else {
            i = 2 * last - i;
        }
    }
    i as usize
}

#[inline]
pub(crate) fn saturate_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Splits a matrix into one plane per channel. 8-bit samples keep their
/// 0..255 range.
pub(crate) fn split(mat: &Mat) -> Vec<Plane> {
    let cn = mat.channels();
    (0..cn)
        .map(|c| Plane::from_fn(mat.cols(), mat.rows(), |x, y| mat.at(y, x, c)))
        .collect()
}

fn interleave(planes: &[Plane]) -> (usize, usize, Vec<f32>) {
    let (w, h) = (planes[0].width(), planes[0].height());
    let cn = planes.len();
    let mut out = vec![0.0; w * h * cn];
    for (c, plane) in planes.iter().enumerate() {
        for (i, &v) in plane.data().iter().enumerate() {
            out[i * cn + c] = v;
        }
    }
    (w, h, out)
}

/// Merges planes into an 8-bit matrix with saturating round-half-even.
pub(crate) fn merge_u8(planes: &[Plane]) -> Mat {
    let (w, h, data) = interleave(planes);
    let bytes = data.into_iter().map(saturate_u8).collect();
    Mat::from_u8(h, w, planes.len(), bytes).unwrap_or_default()
}

/// Merges planes into a float matrix.
pub(crate) fn merge_f32(planes: &[Plane]) -> Mat {
    let (w, h, data) = interleave(planes);
    Mat::from_f32(h, w, planes.len(), data).unwrap_or_default()
}

/// Separable correlation: `kx` along rows, then `ky` along columns.
fn filter_sep(src: &Plane, kx: &[f32], ky: &[f32]) -> Plane {
    Plane(separable_filter(src.image(), kx, ky))
}

fn binomial(len: usize) -> Vec<f32> {
    let mut k = vec![1.0f32];
    for _ in 1..len {
        let mut next = vec![0.0; k.len() + 1];
        for (i, &v) in k.iter().enumerate() {
            next[i] += v;
            next[i + 1] += v;
        }
        k = next;
    }
    k
}

/// Smoothing and first-derivative kernels of a Sobel operator with aperture
/// `ksize` (odd, at least 3). `imageproc` only ships the 3x3 operator.
fn sobel_kernels(ksize: usize) -> (Vec<f32>, Vec<f32>) {
    let smooth = binomial(ksize);
    let base = binomial(ksize - 2);
    let mut deriv = vec![0.0f32; ksize];
    for (i, &v) in base.iter().enumerate() {
        deriv[i] -= v;
        deriv[i + 2] += v;
    }
    (smooth, deriv)
}

/// First-order Sobel derivative along x (`along_x`) or y.
pub(crate) fn sobel(src: &Plane, along_x: bool, ksize: usize) -> Plane {
    let (smooth, deriv) = sobel_kernels(ksize);
    if along_x {
        filter_sep(src, &deriv, &smooth)
    } else {
        filter_sep(src, &smooth, &deriv)
    }
}

const SECOND_DIFF: [f32; 3] = [1.0, -2.0, 1.0];

/// 4-neighbour Laplacian.
pub(crate) fn laplacian(src: &Plane) -> Plane {
    let dxx = filter_sep(src, &SECOND_DIFF, &[1.0]);
    let dyy = filter_sep(src, &[1.0], &SECOND_DIFF);
    dxx.zip_map(&dyy, |a, b| a + b)
}

const PYR_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Gaussian blur followed by dropping odd rows and columns.
pub(crate) fn pyr_down(src: &Plane) -> Plane {
    let blurred = filter_sep(src, &PYR_KERNEL, &PYR_KERNEL);
    let w = src.width().div_ceil(2);
    let h = src.height().div_ceil(2);
    Plane::from_fn(w, h, |x, y| blurred.get(2 * x, 2 * y))
}

/// Zero-insertion upsampling to `width` x `height` followed by Gaussian
/// interpolation.
pub(crate) fn pyr_up(src: &Plane, width: usize, height: usize) -> Plane {
    let sparse = Plane::from_fn(width, height, |x, y| {
        if x % 2 == 0 && y % 2 == 0 && x / 2 < src.width() && y / 2 < src.height() {
            src.get(x / 2, y / 2)
        } else {
            0.0
        }
    });
    let k = PYR_KERNEL.map(|v| v * 2.0);
    filter_sep(&sparse, &k, &k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect101_mirrors_without_edge() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(3, 1), 0);
    }

    #[test]
    fn sobel_kernels_match_known_apertures() {
        let (s3, d3) = sobel_kernels(3);
        assert_eq!(s3, vec![1.0, 2.0, 1.0]);
        assert_eq!(d3, vec![-1.0, 0.0, 1.0]);
        let (_, d5) = sobel_kernels(5);
        assert_eq!(d5, vec![-1.0, -2.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn sobel_of_a_ramp_is_constant() {
        let ramp = Plane::from_fn(8, 6, |x, _| 3.0 * x as f32);
        let gx = sobel(&ramp, true, 3);
        // 3 per pixel, times 2 for the central difference, times 4 for the smoothing.
        for y in 0..6 {
            for x in 1..7 {
                assert_eq!(gx.get(x, y), 24.0);
            }
        }
        assert!(sobel(&ramp, false, 3).data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn laplacian_vanishes_on_linear_ramps() {
        let ramp = Plane::from_fn(7, 7, |x, y| x as f32 + 2.0 * y as f32);
        let lap = laplacian(&ramp);
        for y in 1..6 {
            for x in 1..6 {
                assert_eq!(lap.get(x, y), 0.0);
            }
        }
        let spike = Plane::from_fn(5, 5, |x, y| if (x, y) == (2, 2) { 1.0 } else { 0.0 });
        assert_eq!(laplacian(&spike).get(2, 2), -4.0);
    }

    #[test]
    fn pyramid_round_trip_preserves_constant() {
        let p = Plane::filled(9, 7, 0.5);
        let down = pyr_down(&p);
        assert_eq!((down.width(), down.height()), (5, 4));
        assert!(down.data().iter().all(|v| (v - 0.5).abs() < 1e-6));
        let up = pyr_up(&down, 9, 7);
        for y in 2..5 {
            for x in 2..7 {
                assert!((up.get(x, y) - 0.5).abs() < 1e-4, "({x},{y}) = {}", up.get(x, y));
            }
        }
    }

    #[test]
    fn luma8_conversion_saturates() {
        let p = Plane::from_fn(3, 1, |x, _| [-4.0, 127.5, 300.0][x]);
        let gray = p.to_luma8();
        assert_eq!(gray.as_raw(), &vec![0, 128, 255]);
        assert_eq!(Plane::from_luma8(&gray).data(), &[0.0, 128.0, 255.0]);
    }

    #[test]
    fn saturate_rounds_half_to_even() {
        assert_eq!(saturate_u8(2.5), 2);
        assert_eq!(saturate_u8(3.5), 4);
        assert_eq!(saturate_u8(-3.0), 0);
        assert_eq!(saturate_u8(300.0), 255);
    }
}
