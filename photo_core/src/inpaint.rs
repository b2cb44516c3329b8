//! Image inpainting: fills masked pixels from their surroundings.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{PhotoError, Result, ensure};
use crate::mat::Mat;
use crate::plane::{Plane, merge_u8, split};

const MAX_RADIUS: i32 = 100;
const RELAX_OMEGA: f32 = 1.8;
const RELAX_TOLERANCE: f32 = 1e-3;
const RELAX_MAX_SWEEPS: usize = 10_000;

/// Inpainting algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InpaintMethod {
    /// Smooth (harmonic) continuation of the surrounding intensities
    /// (flag `0`).
    NavierStokes,
    /// Fast marching from the boundary inwards with distance- and
    /// level-set-weighted averaging (flag `1`).
    Telea,
}

impl InpaintMethod {
    /// Decodes the integer flag.
    pub fn from_flag(flag: i32) -> Result<Self> {
        match flag {
            0 => Ok(InpaintMethod::NavierStokes),
            1 => Ok(InpaintMethod::Telea),
            other => Err(PhotoError::bad_argument(
                "inpaint",
                format!("unknown inpainting method {other}"),
            )),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Known,
    Band,
    Inside,
}

#[derive(PartialEq)]
struct Front {
    t: f32,
    index: usize,
}

impl Eq for Front {}

impl Ord for Front {
    // Reversed so the max-heap pops the smallest arrival time first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.t.total_cmp(&self.t).then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fills the non-zero pixels of `mask` in `src`.
///
/// `src` is 8-bit with 1 or 3 channels, `mask` is `8UC1` of the same size.
/// `inpaint_radius` is rounded and clamped to `1..=100`.
pub fn inpaint(src: &Mat, mask: &Mat, inpaint_radius: f32, method: InpaintMethod) -> Result<Mat> {
    const FUNC: &str = "inpaint";
    ensure(!src.is_empty(), FUNC, "!src.empty()")?;
    src.expect_u8(FUNC)?;
    if src.channels() != 1 && src.channels() != 3 {
        return Err(PhotoError::unsupported(FUNC, format!("src must have 1 or 3 channels, got {}", src.mat_type())));
    }
    let mask_data = mask.expect_u8(FUNC)?;
    if mask.channels() != 1 {
        return Err(PhotoError::unsupported(FUNC, format!("mask must be 8UC1, got {}", mask.mat_type())));
    }
    if !mask.same_size(src) {
        return Err(PhotoError::size_mismatch(
            FUNC,
            format!("mask is {}x{}, src is {}x{}", mask.cols(), mask.rows(), src.cols(), src.rows()),
        ));
    }

    let radius = (inpaint_radius.round_ties_even() as i32).clamp(1, MAX_RADIUS);
    let holes: Vec<bool> = mask_data.iter().map(|&v| v != 0).collect();
    let mut planes = split(src);
    telea(&mut planes, &holes, radius);
    if method == InpaintMethod::NavierStokes {
        relax(&mut planes, &holes);
    }
    Ok(merge_u8(&planes))
}

fn neighbours(i: usize, w: usize, h: usize) -> impl Iterator<Item = usize> {
    let (x, y) = (i % w, i / w);
    [
        (x > 0).then(|| i - 1),
        (x + 1 < w).then(|| i + 1),
        (y > 0).then(|| i - w),
        (y + 1 < h).then(|| i + w),
    ]
    .into_iter()
    .flatten()
}

fn telea(planes: &mut [Plane], holes: &[bool], radius: i32) {
    let (w, h) = (planes[0].width(), planes[0].height());
    let mut state: Vec<State> = holes.iter().map(|&hole| if hole { State::Inside } else { State::Known }).collect();
    let mut t = vec![f32::INFINITY; w * h];
    let mut heap = BinaryHeap::new();

    for i in 0..w * h {
        if state[i] == State::Known {
            t[i] = 0.0;
            if neighbours(i, w, h).any(|j| holes[j]) {
                state[i] = State::Band;
                heap.push(Front { t: 0.0, index: i });
            }
        }
    }

    while let Some(Front { index, .. }) = heap.pop() {
        if state[index] == State::Known {
            continue;
        }
        state[index] = State::Known;
        for j in neighbours(index, w, h) {
            if state[j] != State::Inside {
                continue;
            }
            t[j] = arrival_time(j, w, h, &t, &state);
            fill_pixel(planes, j, radius, &t, &state);
            state[j] = State::Band;
            heap.push(Front { t: t[j], index: j });
        }
    }
}

fn arrival_time(i: usize, w: usize, h: usize, t: &[f32], state: &[State]) -> f32 {
    let (x, y) = (i % w, i / w);
    let pick = |j: Option<usize>| j.filter(|&j| state[j] != State::Inside).map_or(f32::INFINITY, |j| t[j]);
    let tx = pick((x > 0).then(|| i - 1)).min(pick((x + 1 < w).then(|| i + 1)));
    let ty = pick((y > 0).then(|| i - w)).min(pick((y + 1 < h).then(|| i + w)));
    if tx.is_finite() && ty.is_finite() {
        let d = tx - ty;
        let disc = 2.0 - d * d;
        if disc >= 0.0 {
            let s = (tx + ty + disc.sqrt()) / 2.0;
            if s >= tx && s >= ty {
                return s;
            }
        }
    }
    tx.min(ty) + 1.0
}

fn gradient_at(i: usize, w: usize, h: usize, t: &[f32], state: &[State]) -> (f32, f32) {
    let (x, y) = (i % w, i / w);
    let known = |j: usize| state[j] != State::Inside && t[j].is_finite();
    let diff = |prev: Option<usize>, next: Option<usize>| -> f32 {
        match (prev.filter(|&j| known(j)), next.filter(|&j| known(j))) {
            (Some(p), Some(n)) => (t[n] - t[p]) * 0.5,
            (Some(p), None) => t[i] - t[p],
            (None, Some(n)) => t[n] - t[i],
            (None, None) => 0.0,
        }
    };
    (
        diff((x > 0).then(|| i - 1), (x + 1 < w).then(|| i + 1)),
        diff((y > 0).then(|| i - w), (y + 1 < h).then(|| i + w)),
    )
}

fn fill_pixel(planes: &mut [Plane], i: usize, radius: i32, t: &[f32], state: &[State]) {
    let (w, h) = (planes[0].width(), planes[0].height());
    let (x, y) = ((i % w) as i32, (i / w) as i32);
    let (gx, gy) = gradient_at(i, w, h, t, state);
    let grad_len = (gx * gx + gy * gy).sqrt();

    let mut sums = vec![0.0f32; planes.len()];
    let mut total = 0.0f32;
    for ny in (y - radius).max(0)..=(y + radius).min(h as i32 - 1) {
        for nx in (x - radius).max(0)..=(x + radius).min(w as i32 - 1) {
            let (rx, ry) = ((x - nx) as f32, (y - ny) as f32);
            let dist2 = rx * rx + ry * ry;
            if dist2 == 0.0 || dist2 > (radius * radius) as f32 {
                continue;
            }
            let j = ny as usize * w + nx as usize;
            if state[j] == State::Inside {
                continue;
            }
            let len = dist2.sqrt();
            let dir = if grad_len > 0.0 { ((rx * gx + ry * gy) / (len * grad_len)).abs().max(1e-6) } else { 1.0 };
            let lev = 1.0 / (1.0 + (t[j] - t[i]).abs());
            let weight = dir * lev / dist2;
            total += weight;
            for (sum, plane) in sums.iter_mut().zip(planes.iter()) {
                *sum += weight * plane.data()[j];
            }
        }
    }
    if total > 0.0 {
        for (plane, sum) in planes.iter_mut().zip(sums) {
            plane.data_mut()[i] = sum / total;
        }
    }
}

/// Successive over-relaxation of the Laplace equation over the holes.
fn relax(planes: &mut [Plane], holes: &[bool]) {
    let (w, h) = (planes[0].width(), planes[0].height());
    let hole_indices: Vec<usize> = (0..w * h).filter(|&i| holes[i]).collect();
    for plane in planes.iter_mut() {
        let data = plane.data_mut();
        let mut sweeps = 0;
        loop {
            let mut max_delta = 0.0f32;
            for &i in &hole_indices {
                let (sum, count) = neighbours(i, w, h).fold((0.0f32, 0u32), |(s, c), j| (s + data[j], c + 1));
                let target = sum / count as f32;
                let delta = RELAX_OMEGA * (target - data[i]);
                data[i] += delta;
                max_delta = max_delta.max(delta.abs());
            }
            sweeps += 1;
            if max_delta < RELAX_TOLERANCE || sweeps >= RELAX_MAX_SWEEPS {
                break;
            }
        }
        tracing::trace!(sweeps, unknowns = hole_indices.len(), "inpaint relaxation finished");
    }
}
