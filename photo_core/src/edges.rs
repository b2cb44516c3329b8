use std::collections::VecDeque;

use imageproc::filter::gaussian_blur_f32;

use crate::plane::{Plane, sobel};

/// Pre-smoothing applied before the gradients, the same as `imageproc`'s
/// own detector uses.
const CANNY_SIGMA: f32 = 1.4;

const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Canny edge map of an 8-bit valued plane.
///
/// `ksize` is the Sobel aperture (3, 5 or 7); callers validate it. The 3x3
/// case is `imageproc::edges::canny`; wider apertures run the same pipeline
/// with larger Sobel kernels.
pub(crate) fn canny(gray: &Plane, low: f32, high: f32, ksize: usize) -> Vec<bool> {
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    if ksize == 3 {
        let edges = imageproc::edges::canny(&gray.to_luma8(), low, high);
        return edges.as_raw().iter().map(|&v| v > 0).collect();
    }
    wide_canny(gray, low, high, ksize)
}

fn wide_canny(gray: &Plane, low: f32, high: f32, ksize: usize) -> Vec<bool> {
    let (w, h) = (gray.width(), gray.height());
    let smooth = Plane::from_image(gaussian_blur_f32(gray.image(), CANNY_SIGMA));

    let dx = sobel(&smooth, true, ksize);
    let dy = sobel(&smooth, false, ksize);
    let mag = dx.zip_map(&dy, f32::hypot);

    let at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            mag.get(x as usize, y as usize)
        }
    };

    let mut strong = vec![false; w * h];
    let mut weak = vec![false; w * h];
    for y in 0..h {
        for x in 0..w {
            let m = mag.get(x, y);
            if m <= low {
                continue;
            }
            let (gx, gy) = (dx.get(x, y), dy.get(x, y));
            let (ax, ay) = (gx.abs(), gy.abs());
            let (xi, yi) = (x as isize, y as isize);
            let (n1, n2) = if ay <= ax * TAN_22_5 {
                (at(xi - 1, yi), at(xi + 1, yi))
            } else if ay >= ax * TAN_67_5 {
                (at(xi, yi - 1), at(xi, yi + 1))
            } else if (gx > 0.0) == (gy > 0.0) {
                (at(xi - 1, yi - 1), at(xi + 1, yi + 1))
            } else {
                (at(xi + 1, yi - 1), at(xi - 1, yi + 1))
            };
            if m > n1 && m >= n2 {
                let i = y * w + x;
                weak[i] = true;
                strong[i] = m > high;
            }
        }
    }

    let mut edges = vec![false; w * h];
    let mut queue: VecDeque<usize> = strong
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| s.then_some(i))
        .collect();
    for &i in &queue {
        edges[i] = true;
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if weak[j] && !edges[j] {
                    edges[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }
    edges
}
