//! Non-photorealistic rendering built on the domain transform
//! edge-preserving filter (Gastal and Oliveira): smoothing, detail
//! enhancement, pencil sketch and stylization.

use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::color;
use crate::error::{PhotoError, Result, ensure};
use crate::mat::{Mat, MatType};
use crate::plane::{Plane, merge_u8, split};

const ITERATIONS: i32 = 3;
const DETAIL_FACTOR: f32 = 3.0;

/// Domain transform variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    /// Recursive filtering (flag `1`).
    Recursive,
    /// Normalized convolution (flag `2`).
    NormalizedConvolution,
}

impl EdgeFilter {
    /// Decodes the integer flag.
    pub fn from_flag(flag: i32) -> Result<Self> {
        match flag {
            1 => Ok(EdgeFilter::Recursive),
            2 => Ok(EdgeFilter::NormalizedConvolution),
            other => Err(PhotoError::bad_argument(
                "edgePreservingFilter",
                format!("unknown filter flag {other}"),
            )),
        }
    }
}

/// Per-line domain transform derivatives `1 + sigma_s / sigma_r * |dI|`.
struct Transform {
    horizontal: Vec<Vec<f32>>,
    vertical: Vec<Vec<f32>>,
}

impl Transform {
    fn new(guide: &[Plane], sigma_s: f32, sigma_r: f32) -> Self {
        let (w, h) = (guide[0].width(), guide[0].height());
        let ratio = sigma_s / sigma_r;
        let horizontal = (0..h)
            .map(|y| {
                (0..w.saturating_sub(1))
                    .map(|x| {
                        let d: f32 = guide.iter().map(|p| (p.get(x + 1, y) - p.get(x, y)).abs()).sum();
                        1.0 + ratio * d
                    })
                    .collect()
            })
            .collect();
        let vertical = (0..w)
            .map(|x| {
                (0..h.saturating_sub(1))
                    .map(|y| {
                        let d: f32 = guide.iter().map(|p| (p.get(x, y + 1) - p.get(x, y)).abs()).sum();
                        1.0 + ratio * d
                    })
                    .collect()
            })
            .collect();
        Self { horizontal, vertical }
    }
}

fn recursive_line(line: &mut [f32], ct: &[f32], a: f32) {
    let n = line.len();
    for i in 1..n {
        let v = a.powf(ct[i - 1]);
        line[i] += v * (line[i - 1] - line[i]);
    }
    for i in (0..n.saturating_sub(1)).rev() {
        let v = a.powf(ct[i]);
        line[i] += v * (line[i + 1] - line[i]);
    }
}

fn normalized_line(line: &mut [f32], ct: &[f32], radius: f32) {
    let n = line.len();
    let mut coords = vec![0.0f32; n];
    for i in 1..n {
        coords[i] = coords[i - 1] + ct[i - 1];
    }
    let mut prefix = vec![0.0f64; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + line[i] as f64;
    }
    let (mut lo, mut hi) = (0usize, 0usize);
    let mut out = vec![0.0f32; n];
    for i in 0..n {
        while coords[lo] < coords[i] - radius {
            lo += 1;
        }
        hi = hi.max(i);
        while hi + 1 < n && coords[hi + 1] <= coords[i] + radius {
            hi += 1;
        }
        out[i] = ((prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64) as f32;
    }
    line.copy_from_slice(&out);
}

/// Runs `f` over every row (`horizontal`) or column of every plane.
fn for_each_line(planes: &mut [Plane], horizontal: bool, mut f: impl FnMut(usize, &mut [f32])) {
    for plane in planes.iter_mut() {
        let (w, h) = (plane.width(), plane.height());
        if horizontal {
            for (y, row) in plane.data_mut().chunks_exact_mut(w).enumerate() {
                f(y, row);
            }
        } else {
            let mut column = vec![0.0f32; h];
            for x in 0..w {
                for y in 0..h {
                    column[y] = plane.get(x, y);
                }
                f(x, &mut column);
                for y in 0..h {
                    plane.set(x, y, column[y]);
                }
            }
        }
    }
}

/// Edge-aware smoothing of `planes` guided by `guide` (values in `[0, 1]`).
fn domain_filter(planes: &[Plane], guide: &[Plane], sigma_s: f32, sigma_r: f32, filter: EdgeFilter) -> Vec<Plane> {
    let transform = Transform::new(guide, sigma_s, sigma_r);
    let mut out = planes.to_vec();
    let norm = (4.0f32.powi(ITERATIONS) - 1.0).sqrt();
    for i in 0..ITERATIONS {
        let sigma_i = sigma_s * 3.0f32.sqrt() * 2.0f32.powi(ITERATIONS - i - 1) / norm;
        match filter {
            EdgeFilter::Recursive => {
                let a = (-(2.0f32.sqrt()) / sigma_i).exp();
                for_each_line(&mut out, true, |y, line| recursive_line(line, &transform.horizontal[y], a));
                for_each_line(&mut out, false, |x, line| recursive_line(line, &transform.vertical[x], a));
            }
            EdgeFilter::NormalizedConvolution => {
                let radius = sigma_i * 3.0f32.sqrt();
                for_each_line(&mut out, true, |y, line| normalized_line(line, &transform.horizontal[y], radius));
                for_each_line(&mut out, false, |x, line| normalized_line(line, &transform.vertical[x], radius));
            }
        }
    }
    out
}

fn check_input(src: &Mat, func: &'static str, sigma_s: f32, sigma_r: f32) -> Result<Vec<Plane>> {
    ensure(!src.is_empty(), func, "!src.empty()")?;
    if src.mat_type() != MatType::U8C3 {
        return Err(PhotoError::unsupported(func, format!("src must be 8UC3, got {}", src.mat_type())));
    }
    if !(sigma_s > 0.0 && sigma_r > 0.0) {
        return Err(PhotoError::bad_argument(
            func,
            format!("sigma_s and sigma_r must be positive, got {sigma_s} and {sigma_r}"),
        ));
    }
    Ok(split(src).iter().map(|p| p.map(|v| v / 255.0)).collect())
}

fn to_u8(planes: &[Plane]) -> Mat {
    let scaled: Vec<Plane> = planes.iter().map(|p| p.map(|v| v * 255.0)).collect();
    merge_u8(&scaled)
}

/// Smooths an 8-bit BGR image while keeping strong edges.
pub fn edge_preserving_filter(src: &Mat, filter: EdgeFilter, sigma_s: f32, sigma_r: f32) -> Result<Mat> {
    let img = check_input(src, "edgePreservingFilter", sigma_s, sigma_r)?;
    Ok(to_u8(&domain_filter(&img, &img, sigma_s, sigma_r, filter)))
}

/// Boosts fine detail in the lightness channel.
pub fn detail_enhance(src: &Mat, sigma_s: f32, sigma_r: f32) -> Result<Mat> {
    let img = check_input(src, "detailEnhance", sigma_s, sigma_r)?;
    let lab = color::map_pixels(&img, color::bgr_to_lab);
    let lightness = lab[0].map(|v| v / 100.0);
    let base = domain_filter(
        std::slice::from_ref(&lightness),
        std::slice::from_ref(&lightness),
        sigma_s,
        sigma_r,
        EdgeFilter::NormalizedConvolution,
    )
    .remove(0);
    let enhanced = lightness.zip_map(&base, |l, b| (b + DETAIL_FACTOR * (l - b)) * 100.0);
    let lab = [enhanced, lab[1].clone(), lab[2].clone()];
    Ok(to_u8(&color::map_pixels(&lab, color::lab_to_bgr)))
}

/// Pencil-like rendering. Returns the gray sketch (`8UC1`) and a colour
/// version (`8UC3`) that keeps the source chroma.
pub fn pencil_sketch(src: &Mat, sigma_s: f32, sigma_r: f32, shade_factor: f32) -> Result<(Mat, Mat)> {
    let img = check_input(src, "pencilSketch", sigma_s, sigma_r)?;
    let ycc = color::map_pixels(&img, color::bgr_to_ycrcb);
    let smooth = domain_filter(
        std::slice::from_ref(&ycc[0]),
        &img,
        sigma_s,
        sigma_r,
        EdgeFilter::NormalizedConvolution,
    )
    .remove(0);

    let (w, h) = (smooth.width(), smooth.height());
    let sketch = Plane::from_fn(w, h, |x, y| {
        let v = smooth.get(x, y);
        let dx = if x + 1 < w { (smooth.get(x + 1, y) - v).abs() } else { 0.0 };
        let dy = if y + 1 < h { (smooth.get(x, y + 1) - v).abs() } else { 0.0 };
        let pencil = (1.0 - (dx + dy) / sigma_r).clamp(0.0, 1.0);
        (pencil * (1.0 - shade_factor) + shade_factor * v).clamp(0.0, 1.0)
    });

    let colored = color::map_pixels(&[sketch.clone(), ycc[1].clone(), ycc[2].clone()], color::ycrcb_to_bgr);
    Ok((to_u8(std::slice::from_ref(&sketch)), to_u8(&colored)))
}

/// Watercolour-like stylization: strong smoothing darkened along edges.
pub fn stylization(src: &Mat, sigma_s: f32, sigma_r: f32) -> Result<Mat> {
    let img = check_input(src, "stylization", sigma_s, sigma_r)?;
    let smooth = domain_filter(&img, &img, sigma_s, sigma_r, EdgeFilter::NormalizedConvolution);
    let gray = color::gray_plane(&smooth).map(|v| v * 255.0).to_luma8();
    let gx = horizontal_sobel(&gray);
    let gy = vertical_sobel(&gray);
    let (w, h) = (smooth[0].width(), smooth[0].height());
    let magnitude = Plane::from_fn(w, h, |x, y| {
        let (x, y) = (x as u32, y as u32);
        f32::from(gx.get_pixel(x, y)[0]).hypot(f32::from(gy.get_pixel(x, y)[0]))
    });
    let peak = magnitude.data().iter().copied().fold(0.0f32, f32::max);
    let shade = if peak > 0.0 { magnitude.map(|m| 1.0 - m / peak) } else { Plane::filled(w, h, 1.0) };
    let out: Vec<Plane> = smooth.iter().map(|p| p.zip_map(&shade, |v, s| v * s)).collect();
    Ok(to_u8(&out))
}
