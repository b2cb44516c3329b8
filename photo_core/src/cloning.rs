//! Gradient-domain editing: seamless cloning and the local edits built on
//! the same Poisson solver (colour change, illumination change, texture
//! flattening).

use crate::color;
use crate::edges::canny;
use crate::error::{PhotoError, Result, ensure};
use crate::mat::{Mat, Point};
use crate::plane::{Plane, merge_u8, split};
use crate::poisson::{forward_gradients, interior, solve};

/// How [`seamless_clone`] builds the guidance field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    /// Source gradients everywhere inside the mask.
    Normal,
    /// The stronger of source and destination gradient at every edge.
    Mixed,
    /// Like `Normal`, but with the source reduced to luminance.
    MonochromeTransfer,
}

impl CloneMode {
    /// Decodes the integer flag (`1`, `2`, `3`).
    pub fn from_flag(flag: i32) -> Result<Self> {
        match flag {
            1 => Ok(CloneMode::Normal),
            2 => Ok(CloneMode::Mixed),
            3 => Ok(CloneMode::MonochromeTransfer),
            other => Err(PhotoError::bad_argument(
                "seamlessClone",
                format!("unknown clone flag {other}"),
            )),
        }
    }
}

fn check_image(img: &Mat, func: &'static str, name: &str) -> Result<()> {
    ensure(!img.is_empty(), func, &format!("!{name}.empty()"))?;
    img.expect_u8(func)?;
    if img.channels() != 1 && img.channels() != 3 {
        return Err(PhotoError::unsupported(
            func,
            format!("{name} must have 1 or 3 channels, got {}", img.mat_type()),
        ));
    }
    Ok(())
}

/// Mask pixels that are set (any channel non-zero).
fn mask_bits(mask: &Mat, src: &Mat, func: &'static str) -> Result<Vec<bool>> {
    let data = mask.expect_u8(func)?;
    if !mask.same_size(src) {
        return Err(PhotoError::size_mismatch(
            func,
            format!(
                "mask is {}x{}, src is {}x{}",
                mask.cols(),
                mask.rows(),
                src.cols(),
                src.rows()
            ),
        ));
    }
    let cn = mask.channels();
    Ok(data.chunks_exact(cn).map(|px| px.iter().any(|&v| v != 0)).collect())
}

/// Re-solves `src` inside `mask` with a guidance field derived from its own
/// gradients by `edit(channel, gx, gy)`.
fn local_edit(
    src: &Mat,
    mask: &Mat,
    func: &'static str,
    mut edit: impl FnMut(usize, &mut Plane, &mut Plane),
) -> Result<Mat> {
    check_image(src, func, "src")?;
    let bits = mask_bits(mask, src, func)?;
    let region = interior(&bits, src.cols(), src.rows());

    let planes: Vec<Plane> = split(src)
        .iter()
        .enumerate()
        .map(|(c, plane)| {
            let (mut gx, mut gy) = forward_gradients(plane);
            edit(c, &mut gx, &mut gy);
            solve(plane, &gx, &gy, &region)
        })
        .collect();
    Ok(merge_u8(&planes))
}

/// Recolours the masked region by scaling each channel's gradients.
///
/// `src` must be 8-bit BGR; multipliers apply to red, green and blue.
pub fn color_change(src: &Mat, mask: &Mat, red_mul: f32, green_mul: f32, blue_mul: f32) -> Result<Mat> {
    const FUNC: &str = "colorChange";
    if src.channels() != 3 {
        return Err(PhotoError::unsupported(FUNC, format!("src must be 8UC3, got {}", src.mat_type())));
    }
    let muls = [blue_mul, green_mul, red_mul];
    local_edit(src, mask, FUNC, |c, gx, gy| {
        let m = muls[c];
        gx.data_mut().iter_mut().for_each(|v| *v *= m);
        gy.data_mut().iter_mut().for_each(|v| *v *= m);
    })
}

/// Compresses or expands the gradient magnitude inside the mask, which
/// softens highlights and shadows.
pub fn illumination_change(src: &Mat, mask: &Mat, alpha: f32, beta: f32) -> Result<Mat> {
    const FUNC: &str = "illuminationChange";
    let gain = alpha.powf(beta);
    local_edit(src, mask, FUNC, |_, gx, gy| {
        for (x, y) in gx.data_mut().iter_mut().zip(gy.data_mut()) {
            let mag = x.hypot(*y);
            if mag > 0.0 {
                let scale = gain * mag.powf(-beta);
                *x *= scale;
                *y *= scale;
            }
        }
    })
}

/// Flattens texture inside the mask, keeping only gradients that lie on
/// Canny edges of the source.
pub fn texture_flattening(
    src: &Mat,
    mask: &Mat,
    low_threshold: f32,
    high_threshold: f32,
    kernel_size: i32,
) -> Result<Mat> {
    const FUNC: &str = "textureFlattening";
    if !matches!(kernel_size, 3 | 5 | 7) {
        return Err(PhotoError::bad_argument(
            FUNC,
            format!("kernel_size must be 3, 5 or 7, got {kernel_size}"),
        ));
    }
    check_image(src, FUNC, "src")?;
    let gray = color::gray_plane(&split(src));
    let edges = canny(&gray, low_threshold, high_threshold, kernel_size as usize);
    local_edit(src, mask, FUNC, |_, gx, gy| {
        let flat = edges.iter().map(|&edge| !edge);
        for ((x, y), flat) in gx.data_mut().iter_mut().zip(gy.data_mut()).zip(flat) {
            if flat {
                *x = 0.0;
                *y = 0.0;
            }
        }
    })
}

/// Bounding box of the set mask pixels as `(min_x, min_y, max_x, max_y)`.
fn bounding_box(bits: &[bool], width: usize) -> Option<(usize, usize, usize, usize)> {
    let mut bbox: Option<(usize, usize, usize, usize)> = None;
    for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
        let (x, y) = (i % width, i / width);
        bbox = Some(match bbox {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bbox
}

/// Pastes the masked part of `src` into `dst`, centred at `p`, solving for
/// a seamless transition at the mask boundary.
pub fn seamless_clone(src: &Mat, dst: &Mat, mask: &Mat, p: Point, mode: CloneMode) -> Result<Mat> {
    const FUNC: &str = "seamlessClone";
    check_image(src, FUNC, "src")?;
    check_image(dst, FUNC, "dst")?;
    if src.channels() != dst.channels() {
        return Err(PhotoError::unsupported(
            FUNC,
            format!("src is {}, dst is {}", src.mat_type(), dst.mat_type()),
        ));
    }
    let bits = mask_bits(mask, src, FUNC)?;
    let (min_x, min_y, max_x, max_y) =
        bounding_box(&bits, src.cols()).ok_or_else(|| PhotoError::assertion(FUNC, "mask is empty"))?;

    let len_x = (max_x - min_x + 1) as i64;
    let len_y = (max_y - min_y + 1) as i64;
    let dst_x = i64::from(p.x) - len_x / 2;
    let dst_y = i64::from(p.y) - len_y / 2;
    ensure(
        dst_x >= 0 && dst_y >= 0 && dst_x + len_x <= dst.cols() as i64 && dst_y + len_y <= dst.rows() as i64,
        FUNC,
        "cloned region must lie inside dst",
    )?;
    let (dst_x, dst_y) = (dst_x as usize, dst_y as usize);

    let (w, h) = (dst.cols(), dst.rows());
    let dst_planes = split(dst);
    let mut src_planes = split(src);
    if mode == CloneMode::MonochromeTransfer && src_planes.len() == 3 {
        let gray = color::gray_plane(&src_planes);
        src_planes = vec![gray.clone(), gray.clone(), gray];
    }

    let mut placed = vec![false; w * h];
    let mut canvases: Vec<Plane> = dst_planes.clone();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (tx, ty) = (x - min_x + dst_x, y - min_y + dst_y);
            placed[ty * w + tx] = bits[y * src.cols() + x];
            for (canvas, plane) in canvases.iter_mut().zip(&src_planes) {
                canvas.set(tx, ty, plane.get(x, y));
            }
        }
    }
    let region = interior(&placed, w, h);

    let planes: Vec<Plane> = dst_planes
        .iter()
        .zip(&canvases)
        .map(|(dest, canvas)| {
            let (mut gx, mut gy) = forward_gradients(canvas);
            if mode == CloneMode::Mixed {
                let (dgx, dgy) = forward_gradients(dest);
                gx = gx.zip_map(&dgx, |s, d| if s.abs() > d.abs() { s } else { d });
                gy = gy.zip_map(&dgy, |s, d| if s.abs() > d.abs() { s } else { d });
            }
            solve(dest, &gx, &gy, &region)
        })
        .collect();
    Ok(merge_u8(&planes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(rows: usize, cols: usize) -> Mat {
        let mut data = Vec::with_capacity(rows * cols * 3);
        for y in 0..rows {
            for x in 0..cols {
                data.extend_from_slice(&[(x * x * 4) as u8, (y * y * 3) as u8, ((x + y) * (x + y)) as u8]);
            }
        }
        Mat::from_u8(rows, cols, 3, data).unwrap()
    }

    #[test]
    fn unit_color_change_is_identity() {
        let src = textured(6, 6);
        let mask = Mat::filled(6, 6, &[255]).unwrap();
        let out = color_change(&src, &mask, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn color_change_only_touches_masked_interior() {
        let src = textured(8, 8);
        let mut mask = vec![0u8; 64];
        for y in 2..6 {
            for x in 2..6 {
                mask[y * 8 + x] = 1;
            }
        }
        let mask = Mat::from_u8(8, 8, 1, mask).unwrap();
        let out = color_change(&src, &mask, 2.0, 1.0, 0.5).unwrap();
        assert_eq!(out.pixel_u8(0, 0), src.pixel_u8(0, 0));
        assert_eq!(out.pixel_u8(2, 2), src.pixel_u8(2, 2));
        assert_ne!(out.pixel_u8(3, 3), src.pixel_u8(3, 3));
    }

    #[test]
    fn clone_keeps_destination_outside_region() {
        let src = Mat::filled(8, 8, &[200, 200, 200]).unwrap();
        let dst = Mat::filled(16, 16, &[50, 50, 50]).unwrap();
        let mask = Mat::filled(8, 8, &[1]).unwrap();
        let out = seamless_clone(&src, &dst, &mask, Point::new(8, 8), CloneMode::Normal).unwrap();
        assert_eq!((out.rows(), out.cols()), (16, 16));
        assert_eq!(out.pixel_u8(0, 0), Some(&[50u8, 50, 50][..]));
        assert_eq!(out.pixel_u8(4, 4), Some(&[50u8, 50, 50][..]));
    }

    #[test]
    fn clone_transfers_source_gradients() {
        let mut data = Vec::with_capacity(64 * 3);
        for y in 0..8 {
            for x in 0..8 {
                let v = if (x + y) % 2 == 0 { 200 } else { 0 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let src = Mat::from_u8(8, 8, 3, data).unwrap();
        let dst = Mat::filled(16, 16, &[100, 100, 100]).unwrap();
        let mask = Mat::filled(8, 8, &[255]).unwrap();
        let out = seamless_clone(&src, &dst, &mask, Point::new(8, 8), CloneMode::Normal).unwrap();
        let a = out.at(8, 7, 0);
        let b = out.at(8, 8, 0);
        assert!((a - b).abs() > 100.0, "{a} {b}");
    }

    #[test]
    fn mask_size_mismatch_is_reported() {
        let src = Mat::filled(8, 8, &[1, 2, 3]).unwrap();
        let dst = Mat::filled(16, 16, &[1, 2, 3]).unwrap();
        let mask = Mat::filled(4, 4, &[1]).unwrap();
        let err = seamless_clone(&src, &dst, &mask, Point::new(8, 8), CloneMode::Normal).unwrap_err();
        assert!(matches!(err, PhotoError::SizeMismatch { .. }));
    }

    #[test]
    fn region_outside_destination_fails() {
        let src = Mat::filled(8, 8, &[1, 2, 3]).unwrap();
        let dst = Mat::filled(16, 16, &[1, 2, 3]).unwrap();
        let mask = Mat::filled(8, 8, &[1]).unwrap();
        let err = seamless_clone(&src, &dst, &mask, Point::new(1, 1), CloneMode::Normal).unwrap_err();
        assert_eq!(err.code(), -215);
    }

    #[test]
    fn unknown_clone_flag_is_rejected() {
        assert!(CloneMode::from_flag(0).is_err());
        assert_eq!(CloneMode::from_flag(2).unwrap(), CloneMode::Mixed);
    }

    #[test]
    fn texture_flattening_rejects_even_aperture() {
        let src = textured(8, 8);
        let mask = Mat::filled(8, 8, &[1]).unwrap();
        assert!(texture_flattening(&src, &mask, 30.0, 45.0, 4).is_err());
        assert!(texture_flattening(&src, &mask, 30.0, 45.0, 3).is_ok());
    }

    #[test]
    fn illumination_change_keeps_flat_image() {
        let src = Mat::filled(6, 6, &[90, 120, 30]).unwrap();
        let mask = Mat::filled(6, 6, &[1]).unwrap();
        assert_eq!(illumination_change(&src, &mask, 0.2, 0.4).unwrap(), src);
    }
}
