//! Guided Poisson reconstruction used by the cloning family.
//!
//! Unknowns are the pixels of a region `Ω`; every other pixel keeps the
//! destination value and acts as a Dirichlet boundary. The guidance field is
//! given as forward differences `gx(x, y) ~ f(x + 1, y) - f(x, y)` and
//! `gy(x, y) ~ f(x, y + 1) - f(x, y)`. The discrete system
//! `4 f_p - sum f_q = boundary_p - div g_p` is symmetric positive definite
//! and is solved with conjugate gradients.

use crate::plane::Plane;

const TOLERANCE: f64 = 1e-7;
const NOT_IN_REGION: usize = usize::MAX;

/// Forward-difference gradients; the last column / row is zero.
pub(crate) fn forward_gradients(src: &Plane) -> (Plane, Plane) {
    let (w, h) = (src.width(), src.height());
    let gx = Plane::from_fn(w, h, |x, y| if x + 1 < w { src.get(x + 1, y) - src.get(x, y) } else { 0.0 });
    let gy = Plane::from_fn(w, h, |x, y| if y + 1 < h { src.get(x, y + 1) - src.get(x, y) } else { 0.0 });
    (gx, gy)
}

/// Pixels of `mask` whose four neighbours are also in `mask`, excluding the
/// image border.
pub(crate) fn interior(mask: &[bool], width: usize, height: usize) -> Vec<usize> {
    let mut region = Vec::new();
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let i = y * width + x;
            if mask[i] && mask[i - 1] && mask[i + 1] && mask[i - width] && mask[i + width] {
                region.push(i);
            }
        }
    }
    region
}

/// Solves for the pixels in `region` and returns `dest` with those pixels
/// replaced.
pub(crate) fn solve(dest: &Plane, gx: &Plane, gy: &Plane, region: &[usize]) -> Plane {
    let mut out = dest.clone();
    let n = region.len();
    if n == 0 {
        return out;
    }
    let w = dest.width();
    let (gx, gy, base) = (gx.data(), gy.data(), dest.data());

    let mut index = vec![NOT_IN_REGION; base.len()];
    for (k, &p) in region.iter().enumerate() {
        index[p] = k;
    }

    let mut b = vec![0.0f64; n];
    for (k, &p) in region.iter().enumerate() {
        let div = gx[p] - gx[p - 1] + gy[p] - gy[p - w];
        let mut acc = -(div as f64);
        for q in [p - 1, p + 1, p - w, p + w] {
            if index[q] == NOT_IN_REGION {
                acc += base[q] as f64;
            }
        }
        b[k] = acc;
    }

    let apply = |v: &[f64], out: &mut [f64]| {
        for (k, &p) in region.iter().enumerate() {
            let mut acc = 4.0 * v[k];
            for q in [p - 1, p + 1, p - w, p + w] {
                let j = index[q];
                if j != NOT_IN_REGION {
                    acc -= v[j];
                }
            }
            out[k] = acc;
        }
    };

    let mut x: Vec<f64> = region.iter().map(|&p| base[p] as f64).collect();
    let mut ax = vec![0.0f64; n];
    apply(&x, &mut ax);
    let mut r: Vec<f64> = b.iter().zip(&ax).map(|(bi, ai)| bi - ai).collect();
    let mut d = r.clone();
    let mut ad = vec![0.0f64; n];
    let mut rs: f64 = r.iter().map(|v| v * v).sum();

    let b_norm = b.iter().map(|v| v * v).sum::<f64>().sqrt().max(1.0);
    let max_iter = 2 * n + 16;
    let mut iter = 0;
    while rs.sqrt() > TOLERANCE * b_norm && iter < max_iter {
        apply(&d, &mut ad);
        let dad: f64 = d.iter().zip(&ad).map(|(a, b)| a * b).sum();
        if dad <= 0.0 {
            break;
        }
        let alpha = rs / dad;
        for k in 0..n {
            x[k] += alpha * d[k];
            r[k] -= alpha * ad[k];
        }
        let rs_next: f64 = r.iter().map(|v| v * v).sum();
        let beta = rs_next / rs;
        for k in 0..n {
            d[k] = r[k] + beta * d[k];
        }
        rs = rs_next;
        iter += 1;
    }
    tracing::trace!(unknowns = n, iterations = iter, residual = rs.sqrt(), "poisson solve finished");

    let solved = out.data_mut();
    for (k, &p) in region.iter().enumerate() {
        solved[p] = x[k] as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_gradients_reproduce_source() {
        let src = Plane::from_fn(8, 8, |x, y| (x * 10 + y * 3) as f32);
        let (gx, gy) = forward_gradients(&src);
        let mask = vec![true; 64];
        let region = interior(&mask, 8, 8);
        assert_eq!(region.len(), 36);
        let out = solve(&src, &gx, &gy, &region);
        for (a, b) in out.data().iter().zip(src.data()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn zero_guidance_gives_harmonic_fill() {
        let dest = Plane::filled(7, 7, 50.0);
        let zero = Plane::new(7, 7);
        let region = interior(&vec![true; 49], 7, 7);
        let out = solve(&dest, &zero, &zero, &region);
        assert!(out.data().iter().all(|v| (v - 50.0).abs() < 1e-3));
    }

    #[test]
    fn empty_region_returns_destination() {
        let dest = Plane::filled(3, 3, 9.0);
        let zero = Plane::new(3, 3);
        assert_eq!(solve(&dest, &zero, &zero, &[]), dest);
    }
}
