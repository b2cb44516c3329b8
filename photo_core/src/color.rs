//! Colour space conversions on BGR pixels.

use crate::plane::Plane;

const GRAY_B: f32 = 0.114;
const GRAY_G: f32 = 0.587;
const GRAY_R: f32 = 0.299;

/// Luma of a BGR triple.
#[inline]
pub(crate) fn gray(bgr: [f32; 3]) -> f32 {
    GRAY_B * bgr[0] + GRAY_G * bgr[1] + GRAY_R * bgr[2]
}

/// Gray plane from 1, 3 or 4 channel planes (alpha is ignored).
pub(crate) fn gray_plane(planes: &[Plane]) -> Plane {
    if planes.len() < 3 {
        return planes[0].clone();
    }
    let (b, g, r) = (&planes[0], &planes[1], &planes[2]);
    Plane::from_fn(b.width(), b.height(), |x, y| gray([b.get(x, y), g.get(x, y), r.get(x, y)]))
}

fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 { v / 12.92 } else { ((v + 0.055) / 1.055).powf(2.4) }
}

fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 { 12.92 * v } else { 1.055 * v.powf(1.0 / 2.4) - 0.055 }
}

const LAB_EPS: f32 = 0.008856;
const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPS { t.cbrt() } else { 7.787 * t + 16.0 / 116.0 }
}

fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > LAB_EPS { cube } else { (f - 16.0 / 116.0) / 7.787 }
}

/// BGR in `[0, 1]` to CIE L*a*b* (D65). L in `[0, 100]`.
pub(crate) fn bgr_to_lab(bgr: [f32; 3]) -> [f32; 3] {
    let b = srgb_to_linear(bgr[0].clamp(0.0, 1.0));
    let g = srgb_to_linear(bgr[1].clamp(0.0, 1.0));
    let r = srgb_to_linear(bgr[2].clamp(0.0, 1.0));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

    let fy = lab_f(y);
    let l = if y > LAB_EPS { 116.0 * fy - 16.0 } else { 903.3 * y };
    [l, 500.0 * (lab_f(x) - fy), 200.0 * (fy - lab_f(z))]
}

/// CIE L*a*b* (D65) back to BGR in `[0, 1]`.
pub(crate) fn lab_to_bgr(lab: [f32; 3]) -> [f32; 3] {
    let [l, a, bb] = lab;
    let fy = (l + 16.0) / 116.0;
    let y = if l > 8.0 { fy * fy * fy } else { l / 903.3 };
    let fy = if l > 8.0 { fy } else { lab_f(y) };
    let x = lab_f_inv(fy + a / 500.0) * WHITE_X;
    let z = lab_f_inv(fy - bb / 200.0) * WHITE_Z;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875991 * y + 0.041556 * z;
    let b = 0.055648 * x - 0.204043 * y + 1.057311 * z;
    [
        linear_to_srgb(b.clamp(0.0, 1.0)),
        linear_to_srgb(g.clamp(0.0, 1.0)),
        linear_to_srgb(r.clamp(0.0, 1.0)),
    ]
}

/// 8-bit BGR to 8-bit Lab (`L * 255 / 100`, `a + 128`, `b + 128`), as floats.
pub(crate) fn bgr8_to_lab8(bgr: [f32; 3]) -> [f32; 3] {
    let [l, a, b] = bgr_to_lab([bgr[0] / 255.0, bgr[1] / 255.0, bgr[2] / 255.0]);
    [l * 255.0 / 100.0, a + 128.0, b + 128.0]
}

/// Inverse of [`bgr8_to_lab8`].
pub(crate) fn lab8_to_bgr8(lab: [f32; 3]) -> [f32; 3] {
    let [b, g, r] = lab_to_bgr([lab[0] * 100.0 / 255.0, lab[1] - 128.0, lab[2] - 128.0]);
    [b * 255.0, g * 255.0, r * 255.0]
}

const YCC_DELTA: f32 = 0.5;

/// BGR in `[0, 1]` to Y, Cr, Cb.
pub(crate) fn bgr_to_ycrcb(bgr: [f32; 3]) -> [f32; 3] {
    let y = gray(bgr);
    [y, (bgr[2] - y) * 0.713 + YCC_DELTA, (bgr[0] - y) * 0.564 + YCC_DELTA]
}

/// Y, Cr, Cb back to BGR in `[0, 1]`.
pub(crate) fn ycrcb_to_bgr(ycc: [f32; 3]) -> [f32; 3] {
    let [y, cr, cb] = ycc;
    let (cr, cb) = (cr - YCC_DELTA, cb - YCC_DELTA);
    [y + 1.773 * cb, y - 0.714 * cr - 0.344 * cb, y + 1.403 * cr]
}

/// Applies a per-pixel transform to three planes.
pub(crate) fn map_pixels(planes: &[Plane], f: impl Fn([f32; 3]) -> [f32; 3]) -> Vec<Plane> {
    let (w, h) = (planes[0].width(), planes[0].height());
    let (b, g, r) = (planes[0].data(), planes[1].data(), planes[2].data());
    let mut out = vec![Plane::new(w, h); 3];
    for i in 0..w * h {
        let px = f([b[i], g[i], r[i]]);
        for (plane, v) in out.iter_mut().zip(px) {
            plane.data_mut()[i] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_and_black_map_to_lab_extremes() {
        let white = bgr_to_lab([1.0, 1.0, 1.0]);
        assert!((white[0] - 100.0).abs() < 0.1);
        assert!(white[1].abs() < 0.1 && white[2].abs() < 0.1);
        let black = bgr_to_lab([0.0, 0.0, 0.0]);
        assert!(black[0].abs() < 1e-3);
    }

    #[test]
    fn lab_round_trip_is_close() {
        for bgr in [[0.2, 0.5, 0.9], [0.7, 0.1, 0.3], [0.5, 0.5, 0.5]] {
            let back = lab_to_bgr(bgr_to_lab(bgr));
            for c in 0..3 {
                assert!((back[c] - bgr[c]).abs() < 2e-3, "{bgr:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn ycrcb_round_trip_is_close() {
        let bgr = [0.1, 0.6, 0.8];
        let back = ycrcb_to_bgr(bgr_to_ycrcb(bgr));
        for c in 0..3 {
            assert!((back[c] - bgr[c]).abs() < 5e-3);
        }
    }

    #[test]
    fn gray_weights_sum_to_one() {
        assert!((gray([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }
}
