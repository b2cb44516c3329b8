use crate::color;
use crate::error::{PhotoError, Result, ensure};
use crate::mat::{Depth, Mat};
use crate::plane::{Plane, laplacian, merge_f32, pyr_down, pyr_up, split};

const WELL_EXPOSED_SIGMA: f32 = 0.2;
const WEIGHT_FLOOR: f32 = 1e-12;

/// Exposure fusion after Mertens, Kautz and Van Reeth.
///
/// Blends a bracketed exposure sequence directly into a low dynamic range
/// image, weighting each pixel by local contrast, colour saturation and
/// well-exposedness. The result is a float image roughly in `[0, 1]`.
///
/// A `MergeMertens` carries only its weights, so one instance can process
/// any number of sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeMertens {
    contrast_weight: f32,
    saturation_weight: f32,
    exposure_weight: f32,
}

impl Default for MergeMertens {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeMertens {
    /// Default exponent of the contrast measure.
    pub const DEFAULT_CONTRAST_WEIGHT: f32 = 1.0;
    /// Default exponent of the saturation measure.
    pub const DEFAULT_SATURATION_WEIGHT: f32 = 1.0;
    /// Default exponent of the well-exposedness measure.
    pub const DEFAULT_EXPOSURE_WEIGHT: f32 = 0.0;

    /// Fusion with the default weights.
    pub fn new() -> Self {
        Self::with_weights(
            Self::DEFAULT_CONTRAST_WEIGHT,
            Self::DEFAULT_SATURATION_WEIGHT,
            Self::DEFAULT_EXPOSURE_WEIGHT,
        )
    }

    /// Fusion with explicit exponents for the three quality measures.
    pub fn with_weights(contrast_weight: f32, saturation_weight: f32, exposure_weight: f32) -> Self {
        Self { contrast_weight, saturation_weight, exposure_weight }
    }

    /// Exponent of the contrast measure.
    pub fn contrast_weight(&self) -> f32 {
        self.contrast_weight
    }

    /// Exponent of the saturation measure.
    pub fn saturation_weight(&self) -> f32 {
        self.saturation_weight
    }

    /// Exponent of the well-exposedness measure.
    pub fn exposure_weight(&self) -> f32 {
        self.exposure_weight
    }

    /// Fuses `src` (equal size and type, 8-bit or float, 1 or 3 channels).
    pub fn process(&self, src: &[Mat]) -> Result<Mat> {
        const FUNC: &str = "MergeMertens::process";
        ensure(!src.is_empty(), FUNC, "!images.empty()")?;
        let first = &src[0];
        ensure(!first.is_empty(), FUNC, "!images[0].empty()")?;
        let cn = first.channels();
        if cn != 1 && cn != 3 {
            return Err(PhotoError::unsupported(FUNC, format!("images must have 1 or 3 channels, got {cn}")));
        }
        for img in src {
            if img.mat_type() != first.mat_type() {
                return Err(PhotoError::unsupported(FUNC, "images must have the same type"));
            }
            if !img.same_size(first) {
                return Err(PhotoError::size_mismatch(FUNC, "images must have the same size"));
            }
        }

        let (w, h) = (first.cols(), first.rows());
        let images: Vec<Vec<Plane>> = src.iter().map(normalized_planes).collect();

        let mut weights: Vec<Plane> = images.iter().map(|planes| self.weight_map(planes)).collect();
        let mut total = Plane::new(w, h);
        for weight in &weights {
            for (t, v) in total.data_mut().iter_mut().zip(weight.data()) {
                *t += v;
            }
        }
        for weight in &mut weights {
            for (v, t) in weight.data_mut().iter_mut().zip(total.data()) {
                *v /= t;
            }
        }

        let max_level = (w.min(h) as f32).log2().floor() as usize;
        let sizes = level_sizes(w, h, max_level);
        let mut result: Vec<Vec<Plane>> = sizes
            .iter()
            .map(|&(lw, lh)| vec![Plane::new(lw, lh); cn])
            .collect();

        for (planes, weight) in images.iter().zip(&weights) {
            let weight_pyr = gaussian_pyramid(weight, max_level);
            for (c, plane) in planes.iter().enumerate() {
                let lap = laplacian_pyramid(plane, max_level);
                for level in 0..=max_level {
                    let terms = weight_pyr[level].data().iter().zip(lap[level].data());
                    for (acc, (wl, l)) in result[level][c].data_mut().iter_mut().zip(terms) {
                        *acc += wl * l;
                    }
                }
            }
        }

        for level in (0..max_level).rev() {
            let (lw, lh) = sizes[level];
            for c in 0..cn {
                let up = pyr_up(&result[level + 1][c], lw, lh);
                for (v, u) in result[level][c].data_mut().iter_mut().zip(up.data()) {
                    *v += u;
                }
            }
        }
        tracing::debug!(images = src.len(), levels = max_level + 1, "exposure fusion finished");
        Ok(merge_f32(&result[0]))
    }

    fn weight_map(&self, planes: &[Plane]) -> Plane {
        let (w, h) = (planes[0].width(), planes[0].height());
        let gray = color::gray_plane(planes);
        let contrast = laplacian(&gray).map(f32::abs);

        let mut weight = Plane::new(w, h);
        for i in 0..w * h {
            let saturation = if planes.len() == 3 {
                let (b, g, r) = (planes[0].data()[i], planes[1].data()[i], planes[2].data()[i]);
                let mean = (b + g + r) / 3.0;
                (((b - mean).powi(2) + (g - mean).powi(2) + (r - mean).powi(2)) / 3.0).sqrt()
            } else {
                1.0
            };
            let well_exposed: f32 = planes
                .iter()
                .map(|p| {
                    let d = p.data()[i] - 0.5;
                    (-(d * d) / (2.0 * WELL_EXPOSED_SIGMA * WELL_EXPOSED_SIGMA)).exp()
                })
                .product();
            weight.data_mut()[i] = contrast.data()[i].powf(self.contrast_weight)
                * saturation.powf(self.saturation_weight)
                * well_exposed.powf(self.exposure_weight)
                + WEIGHT_FLOOR;
        }
        weight
    }
}

/// Planes scaled to `[0, 1]`.
fn normalized_planes(img: &Mat) -> Vec<Plane> {
    let planes = split(img);
    match img.depth() {
        Depth::U8 => planes.iter().map(|p| p.map(|v| v / 255.0)).collect(),
        Depth::F32 => planes,
    }
}

fn level_sizes(w: usize, h: usize, max_level: usize) -> Vec<(usize, usize)> {
    let mut sizes = vec![(w, h)];
    for _ in 0..max_level {
        let (lw, lh) = sizes[sizes.len() - 1];
        sizes.push((lw.div_ceil(2), lh.div_ceil(2)));
    }
    sizes
}

fn gaussian_pyramid(base: &Plane, max_level: usize) -> Vec<Plane> {
    let mut pyr = vec![base.clone()];
    for _ in 0..max_level {
        let next = pyr_down(&pyr[pyr.len() - 1]);
        pyr.push(next);
    }
    pyr
}

fn laplacian_pyramid(base: &Plane, max_level: usize) -> Vec<Plane> {
    let gauss = gaussian_pyramid(base, max_level);
    let mut lap = Vec::with_capacity(max_level + 1);
    for level in 0..max_level {
        let cur = &gauss[level];
        let up = pyr_up(&gauss[level + 1], cur.width(), cur.height());
        lap.push(cur.zip_map(&up, |a, b| a - b));
    }
    lap.push(gauss[max_level].clone());
    lap
}
