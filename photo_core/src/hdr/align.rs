use crate::color;
use crate::error::{PhotoError, Result, ensure};
use crate::mat::{Mat, Point};
use crate::plane::{Plane, split};

/// Median threshold bitmap alignment of an exposure sequence.
///
/// Every image is translated onto the middle image of the sequence. Shifts
/// are searched on a pyramid of median-thresholded bitmaps, which makes
/// the estimate insensitive to exposure differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignMtb {
    max_bits: i32,
    exclude_range: i32,
    cut: bool,
}

impl Default for AlignMtb {
    fn default() -> Self {
        Self::new()
    }
}

/// Threshold bitmap and exclusion bitmap of one pyramid level.
struct Bitmaps {
    width: usize,
    height: usize,
    threshold: Vec<bool>,
    exclusion: Vec<bool>,
}

impl Bitmaps {
    fn shifted(&self, shift: Point) -> Bitmaps {
        let (w, h) = (self.width, self.height);
        let mut threshold = vec![false; w * h];
        let mut exclusion = vec![false; w * h];
        for y in 0..h {
            let sy = y as i64 - shift.y as i64;
            if sy < 0 || sy >= h as i64 {
                continue;
            }
            for x in 0..w {
                let sx = x as i64 - shift.x as i64;
                if sx < 0 || sx >= w as i64 {
                    continue;
                }
                let s = sy as usize * w + sx as usize;
                threshold[y * w + x] = self.threshold[s];
                exclusion[y * w + x] = self.exclusion[s];
            }
        }
        Bitmaps { width: w, height: h, threshold, exclusion }
    }

    fn mismatch(&self, other: &Bitmaps) -> usize {
        (0..self.threshold.len())
            .filter(|&i| {
                (self.threshold[i] != other.threshold[i]) && self.exclusion[i] && other.exclusion[i]
            })
            .count()
    }
}

impl AlignMtb {
    /// Default pyramid depth bound.
    pub const DEFAULT_MAX_BITS: i32 = 6;
    /// Default half-width of the ignored band around the median.
    pub const DEFAULT_EXCLUDE_RANGE: i32 = 4;
    /// Crop to the common area by default.
    pub const DEFAULT_CUT: bool = true;

    /// Alignment with the default settings.
    pub fn new() -> Self {
        Self::with_params(Self::DEFAULT_MAX_BITS, Self::DEFAULT_EXCLUDE_RANGE, Self::DEFAULT_CUT)
    }

    /// `max_bits` bounds the pyramid depth (and so the largest shift,
    /// `2^max_bits`), `exclude_range` ignores pixels this close to the
    /// median, and `cut` crops results to their common area.
    pub fn with_params(max_bits: i32, exclude_range: i32, cut: bool) -> Self {
        Self { max_bits, exclude_range, cut }
    }

    /// Pyramid depth bound.
    pub fn max_bits(&self) -> i32 {
        self.max_bits
    }

    /// Half-width of the ignored band around the median.
    pub fn exclude_range(&self) -> i32 {
        self.exclude_range
    }

    /// Whether results are cropped to their common area.
    pub fn cut(&self) -> bool {
        self.cut
    }

    /// Aligns `src` (equal size and type, 8-bit, 1 or 3 channels).
    pub fn process(&self, src: &[Mat]) -> Result<Vec<Mat>> {
        const FUNC: &str = "AlignMTB::process";
        ensure(!src.is_empty(), FUNC, "!src.empty()")?;
        let first = &src[0];
        for img in src {
            ensure(!img.is_empty(), FUNC, "!src[i].empty()")?;
            if img.mat_type() != first.mat_type() {
                return Err(PhotoError::unsupported(FUNC, "images must have the same type"));
            }
            if !img.same_size(first) {
                return Err(PhotoError::size_mismatch(FUNC, "images must have the same size"));
            }
        }

        let pivot = src.len() / 2;
        let gray_pivot = to_gray(&src[pivot], FUNC)?;
        let mut shifts = Vec::with_capacity(src.len());
        let mut dst = Vec::with_capacity(src.len());
        for (i, img) in src.iter().enumerate() {
            if i == pivot {
                shifts.push(Point::default());
                dst.push(img.clone());
                continue;
            }
            let shift = self.shift_between(&gray_pivot, &to_gray(img, FUNC)?);
            tracing::debug!(index = i, dx = shift.x, dy = shift.y, "exposure shift");
            shifts.push(shift);
            dst.push(shift_mat(img, shift)?);
        }

        if self.cut {
            let max = shifts.iter().fold(Point::default(), |m, s| Point::new(m.x.max(s.x), m.y.max(s.y)));
            let min = shifts.iter().fold(Point::default(), |m, s| Point::new(m.x.min(s.x), m.y.min(s.y)));
            let width = first.cols() as i32 - (max.x - min.x);
            let height = first.rows() as i32 - (max.y - min.y);
            ensure(width > 0 && height > 0, FUNC, "shifts leave no common area")?;
            dst = dst
                .iter()
                .map(|m| crop(m, max.x as usize, max.y as usize, width as usize, height as usize))
                .collect::<Result<_>>()?;
        }
        Ok(dst)
    }

    /// Translation that moves `img1` onto `img0` (both 8-bit).
    pub fn calculate_shift(&self, img0: &Mat, img1: &Mat) -> Result<Point> {
        const FUNC: &str = "AlignMTB::calculateShift";
        if !img0.same_size(img1) || img0.mat_type() != img1.mat_type() {
            return Err(PhotoError::size_mismatch(FUNC, "images must have the same size and type"));
        }
        Ok(self.shift_between(&to_gray(img0, FUNC)?, &to_gray(img1, FUNC)?))
    }

    fn shift_between(&self, gray0: &Plane, gray1: &Plane) -> Point {
        let longest = gray0.width().max(gray0.height()).max(1) as f64;
        let max_level = (longest.log2() as i32 - 1).min(self.max_bits - 1).max(0) as usize;
        let pyr0 = gray_pyramid(gray0, max_level);
        let pyr1 = gray_pyramid(gray1, max_level);
        let levels = pyr0.len();

        let mut shift = Point::default();
        for level in (0..levels).rev() {
            shift = Point::new(shift.x * 2, shift.y * 2);
            let bits0 = self.bitmaps(&pyr0[level]);
            let bits1 = self.bitmaps(&pyr1[level]);

            let mut min_err = bits0.threshold.len() + 1;
            let mut best = shift;
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let test = Point::new(shift.x + dx, shift.y + dy);
                    let err = bits0.mismatch(&bits1.shifted(test));
                    if err < min_err {
                        best = test;
                        min_err = err;
                    }
                }
            }
            shift = best;
        }
        shift
    }

    fn bitmaps(&self, gray: &Plane) -> Bitmaps {
        let median = median(gray);
        let range = self.exclude_range as f32;
        Bitmaps {
            width: gray.width(),
            height: gray.height(),
            threshold: gray.data().iter().map(|&v| v > median).collect(),
            exclusion: gray.data().iter().map(|&v| (v - median).abs() > range).collect(),
        }
    }
}

fn to_gray(img: &Mat, func: &'static str) -> Result<Plane> {
    img.expect_u8(func)?;
    Ok(Plane::from_luma8(&color::gray_plane(&split(img)).to_luma8()))
}

/// Smallest value whose cumulative count reaches half of the pixels.
fn median(gray: &Plane) -> f32 {
    let mut hist = [0usize; 256];
    for &v in gray.data() {
        hist[v as usize] += 1;
    }
    let half = gray.data().len().div_ceil(2);
    let mut sum = 0;
    for (value, &count) in hist.iter().enumerate() {
        sum += count;
        if sum >= half {
            return value as f32;
        }
    }
    255.0
}

/// Halves a plane by averaging 2x2 blocks.
fn downsample(src: &Plane) -> Plane {
    Plane::from_fn(src.width() / 2, src.height() / 2, |x, y| {
        let s = src.get(2 * x, 2 * y) + src.get(2 * x + 1, 2 * y) + src.get(2 * x, 2 * y + 1) + src.get(2 * x + 1, 2 * y + 1);
        (s / 4.0).round_ties_even()
    })
}

fn gray_pyramid(base: &Plane, max_level: usize) -> Vec<Plane> {
    let mut pyr = vec![base.clone()];
    for _ in 0..max_level {
        let last = &pyr[pyr.len() - 1];
        if last.width() < 2 || last.height() < 2 {
            break;
        }
        let next = downsample(last);
        pyr.push(next);
    }
    pyr
}

/// Translates `src` by `shift`, filling uncovered pixels with zeros.
pub fn shift_mat(src: &Mat, shift: Point) -> Result<Mat> {
    let data = src.expect_u8("AlignMTB::shiftMat")?;
    let (w, h, cn) = (src.cols(), src.rows(), src.channels());
    let mut out = vec![0u8; data.len()];
    for y in 0..h {
        let sy = y as i64 - shift.y as i64;
        if sy < 0 || sy >= h as i64 {
            continue;
        }
        for x in 0..w {
            let sx = x as i64 - shift.x as i64;
            if sx < 0 || sx >= w as i64 {
                continue;
            }
            let s = (sy as usize * w + sx as usize) * cn;
            let d = (y * w + x) * cn;
            out[d..d + cn].copy_from_slice(&data[s..s + cn]);
        }
    }
    Mat::from_u8(h, w, cn, out)
}

fn crop(src: &Mat, x0: usize, y0: usize, width: usize, height: usize) -> Result<Mat> {
    let data = src.expect_u8("AlignMTB::process")?;
    let cn = src.channels();
    let mut out = Vec::with_capacity(width * height * cn);
    for y in y0..y0 + height {
        let start = (y * src.cols() + x0) * cn;
        out.extend_from_slice(&data[start..start + width * cn]);
    }
    Mat::from_u8(height, width, cn, out)
}
