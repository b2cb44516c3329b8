use crate::error::{PhotoError, Result};

/// Element depth of a [`Mat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    /// Unsigned 8-bit samples.
    U8,
    /// 32-bit float samples.
    F32,
}

impl Depth {
    /// Numeric depth code used in packed type codes.
    pub fn code(self) -> i32 {
        match self {
            Depth::U8 => 0,
            Depth::F32 => 5,
        }
    }

    /// Size of a single sample in bytes.
    pub fn sample_size(self) -> usize {
        match self {
            Depth::U8 => 1,
            Depth::F32 => 4,
        }
    }
}

/// Depth plus channel count, packed as `depth + ((channels - 1) << 3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatType {
    depth: Depth,
    channels: usize,
}

impl MatType {
    /// Single-channel 8-bit.
    pub const U8C1: MatType = MatType { depth: Depth::U8, channels: 1 };
    /// Three-channel 8-bit (BGR).
    pub const U8C3: MatType = MatType { depth: Depth::U8, channels: 3 };
    /// Single-channel float.
    pub const F32C1: MatType = MatType { depth: Depth::F32, channels: 1 };
    /// Three-channel float (BGR).
    pub const F32C3: MatType = MatType { depth: Depth::F32, channels: 3 };

    const MAX_CHANNELS: usize = 4;

    /// Builds a type from its parts. Between 1 and 4 channels are supported.
    pub fn new(depth: Depth, channels: usize) -> Result<Self> {
        if channels == 0 || channels > Self::MAX_CHANNELS {
            return Err(PhotoError::unsupported(
                "MatType::new",
                format!("{channels} channels"),
            ));
        }
        Ok(Self { depth, channels })
    }

    /// Decodes a packed type code.
    pub fn from_code(code: i32) -> Result<Self> {
        if code < 0 {
            return Err(PhotoError::unsupported("MatType::from_code", format!("type {code}")));
        }
        let depth = match code & 7 {
            0 => Depth::U8,
            5 => Depth::F32,
            other => {
                return Err(PhotoError::unsupported(
                    "MatType::from_code",
                    format!("depth {other}"),
                ));
            }
        };
        Self::new(depth, ((code >> 3) + 1) as usize)
    }

    /// Packed type code.
    pub fn code(self) -> i32 {
        self.depth.code() + (((self.channels - 1) as i32) << 3)
    }

    /// Sample depth.
    pub fn depth(self) -> Depth {
        self.depth
    }

    /// Channels per pixel.
    pub fn channels(self) -> usize {
        self.channels
    }

    /// Size of one pixel in bytes.
    pub fn pixel_size(self) -> usize {
        self.depth.sample_size() * self.channels
    }
}

impl std::fmt::Display for MatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = match self.depth {
            Depth::U8 => "8U",
            Depth::F32 => "32F",
        };
        write!(f, "{depth}C{}", self.channels)
    }
}

/// Integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Point {
    /// Point at (`x`, `y`).
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Buffer {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

/// Dense, row-major image matrix with interleaved channels.
///
/// Cloning a `Mat` deep-copies its pixel buffer, so clones never alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Mat {
    rows: usize,
    cols: usize,
    mat_type: MatType,
    buf: Buffer,
}

impl Default for Mat {
    fn default() -> Self {
        Self::new()
    }
}

impl Mat {
    /// Empty matrix with no pixels.
    pub fn new() -> Self {
        Self {
            rows: 0,
            cols: 0,
            mat_type: MatType::U8C1,
            buf: Buffer::U8(Vec::new()),
        }
    }

    /// 8-bit matrix where every pixel equals `pixel`.
    pub fn filled(rows: usize, cols: usize, pixel: &[u8]) -> Result<Self> {
        let mat_type = MatType::new(Depth::U8, pixel.len())?;
        let data = pixel.repeat(element_count("Mat::filled", rows, cols, 1)?);
        Ok(Self { rows, cols, mat_type, buf: Buffer::U8(data) })
    }

    /// Wraps an interleaved 8-bit buffer.
    pub fn from_u8(rows: usize, cols: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let mat_type = MatType::new(Depth::U8, channels)?;
        check_len("Mat::from_u8", rows, cols, channels, data.len())?;
        Ok(Self { rows, cols, mat_type, buf: Buffer::U8(data) })
    }

    /// Wraps an interleaved float buffer.
    pub fn from_f32(rows: usize, cols: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        let mat_type = MatType::new(Depth::F32, channels)?;
        check_len("Mat::from_f32", rows, cols, channels, data.len())?;
        Ok(Self { rows, cols, mat_type, buf: Buffer::F32(data) })
    }

    /// Copies raw native-endian bytes into a new matrix of `mat_type`.
    pub fn from_bytes(rows: usize, cols: usize, mat_type: MatType, bytes: &[u8]) -> Result<Self> {
        let expected = element_count("Mat::from_bytes", rows, cols, mat_type.pixel_size())?;
        if bytes.len() != expected {
            return Err(PhotoError::size_mismatch(
                "Mat::from_bytes",
                format!("expected {expected} bytes, got {}", bytes.len()),
            ));
        }
        let buf = match mat_type.depth() {
            Depth::U8 => Buffer::U8(bytes.to_vec()),
            Depth::F32 => Buffer::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        };
        Ok(Self { rows, cols, mat_type, buf })
    }

    /// Number of rows (height).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (width).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Channels per pixel.
    pub fn channels(&self) -> usize {
        self.mat_type.channels()
    }

    /// Sample depth.
    pub fn depth(&self) -> Depth {
        self.mat_type.depth()
    }

    /// Packed element type.
    pub fn mat_type(&self) -> MatType {
        self.mat_type
    }

    /// Number of pixels.
    pub fn total(&self) -> usize {
        self.rows * self.cols
    }

    /// `true` when the matrix has no pixels.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// `true` when both matrices have the same rows and columns.
    pub fn same_size(&self, other: &Mat) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    /// Interleaved 8-bit samples, if the matrix is 8-bit.
    pub fn data_u8(&self) -> Option<&[u8]> {
        match &self.buf {
            Buffer::U8(v) => Some(v),
            Buffer::F32(_) => None,
        }
    }

    /// Interleaved float samples, if the matrix is float.
    pub fn data_f32(&self) -> Option<&[f32]> {
        match &self.buf {
            Buffer::F32(v) => Some(v),
            Buffer::U8(_) => None,
        }
    }

    /// The pixel buffer as raw native-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.buf {
            Buffer::U8(v) => v,
            // SAFETY:
            // - `f32` has no padding and every bit pattern is a valid `u8` sequence.
            // - The length covers exactly the `v.len()` floats owned by `v`.
            // - The returned slice borrows `self`, so the buffer outlives it.
            Buffer::F32(v) => unsafe {
                std::slice::from_raw_parts(v.as_ptr().cast::<u8>(), v.len() * 4)
            },
        }
    }

    /// Sample at (`row`, `col`, `ch`) widened to `f32`.
    pub fn at(&self, row: usize, col: usize, ch: usize) -> f32 {
        let idx = (row * self.cols + col) * self.channels() + ch;
        match &self.buf {
            Buffer::U8(v) => v[idx] as f32,
            Buffer::F32(v) => v[idx],
        }
    }

    /// Pixel at (`row`, `col`) of an 8-bit matrix.
    pub fn pixel_u8(&self, row: usize, col: usize) -> Option<&[u8]> {
        let cn = self.channels();
        let start = (row * self.cols + col) * cn;
        self.data_u8().map(|v| &v[start..start + cn])
    }

    pub(crate) fn expect_u8(&self, func: &'static str) -> Result<&[u8]> {
        self.data_u8()
            .ok_or_else(|| PhotoError::unsupported(func, format!("expected 8-bit input, got {}", self.mat_type)))
    }
}

/// `rows * cols * per_pixel`, rejecting sizes that do not fit in `usize`.
fn element_count(func: &'static str, rows: usize, cols: usize, per_pixel: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(per_pixel))
        .ok_or_else(|| PhotoError::size_mismatch(func, format!("{rows}x{cols} matrix of {per_pixel} per pixel is too large")))
}

fn check_len(func: &'static str, rows: usize, cols: usize, channels: usize, len: usize) -> Result<()> {
    let expected = element_count(func, rows, cols, channels)?;
    if len != expected {
        return Err(PhotoError::size_mismatch(
            func,
            format!("expected {expected} samples, got {len}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_follow_packed_layout() {
        assert_eq!(MatType::U8C1.code(), 0);
        assert_eq!(MatType::U8C3.code(), 16);
        assert_eq!(MatType::F32C3.code(), 21);
        assert_eq!(MatType::from_code(16).unwrap(), MatType::U8C3);
        assert!(MatType::from_code(2).is_err());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let err = Mat::from_bytes(2, 2, MatType::U8C3, &[0; 11]).unwrap_err();
        assert_eq!(err.code(), -209);
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let err = Mat::from_bytes(1 << 30, 1 << 30, MatType::from_code(29).unwrap(), &[]).unwrap_err();
        assert_eq!(err.code(), -209);
        assert!(Mat::from_u8(usize::MAX, 2, 1, Vec::new()).is_err());
        assert!(Mat::filled(usize::MAX, 2, &[0]).is_err());
    }

    #[test]
    fn float_bytes_are_native_endian() {
        let m = Mat::from_f32(1, 2, 1, vec![1.5, -2.0]).unwrap();
        let copy = Mat::from_bytes(1, 2, MatType::F32C1, m.as_bytes()).unwrap();
        assert_eq!(copy, m);
    }

    #[test]
    fn clone_is_independent() {
        let a = Mat::filled(2, 2, &[7, 8, 9]).unwrap();
        let b = a.clone();
        drop(a);
        assert_eq!(b.pixel_u8(1, 1), Some(&[7u8, 8, 9][..]));
    }
}
