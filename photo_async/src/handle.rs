//! Opaque boundary handles and their constructors, accessors and releases.
//!
//! Every handle is a one-field `#[repr(C)]` struct passed by value. The field
//! points to a boxed native object owned by the handle. Handles delivered to
//! a callback are themselves boxed, and the caller frees both levels with the
//! matching `*_Close` function.

use std::ffi::c_int;

use crate::error::ShimError;
use crate::status::{CvStatus, envelope};

/// Image matrix handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Mat {
    /// Owned native matrix.
    pub ptr: *mut photo_core::Mat,
}

/// Sequence of image matrices.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VecMat {
    /// Owned native sequence.
    pub ptr: *mut Vec<photo_core::Mat>,
}

/// Configured exposure fusion algorithm.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MergeMertens {
    /// Owned native algorithm.
    pub ptr: *mut photo_core::MergeMertens,
}

/// Configured median threshold bitmap alignment algorithm.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AlignMTB {
    /// Owned native algorithm.
    pub ptr: *mut photo_core::AlignMtb,
}

/// Integer pixel position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    /// Column.
    pub x: c_int,
    /// Row.
    pub y: c_int,
}

impl From<Point> for photo_core::Point {
    fn from(p: Point) -> Self {
        photo_core::Point::new(p.x, p.y)
    }
}

/// Shared behaviour of the one-field handles.
pub(crate) trait Handle: Copy + Sized {
    type Native;
    const NAME: &'static str;

    fn from_native_ptr(ptr: *mut Self::Native) -> Self;
    fn native_ptr(self) -> *mut Self::Native;

    /// Boxes `native` and a handle around it. Ownership of both passes to the caller.
    fn into_raw(native: Self::Native) -> *mut Self {
        let handle = Self::from_native_ptr(Box::into_raw(Box::new(native)));
        Box::into_raw(Box::new(handle))
    }

    /// Borrows the native object for the duration of a call.
    ///
    /// # Safety
    /// The handle must be null or point to a live native object that is not
    /// mutated or released while the borrow is held.
    unsafe fn native<'a>(self) -> Result<&'a Self::Native, ShimError> {
        // SAFETY: upheld by the caller.
        unsafe { self.native_ptr().as_ref() }.ok_or(ShimError::NullHandle(Self::NAME))
    }

    /// Mutable variant of [`Handle::native`].
    ///
    /// # Safety
    /// As for [`Handle::native`], and no other borrow of the object may exist.
    unsafe fn native_mut<'a>(self) -> Result<&'a mut Self::Native, ShimError> {
        // SAFETY: upheld by the caller.
        unsafe { self.native_ptr().as_mut() }.ok_or(ShimError::NullHandle(Self::NAME))
    }

    /// Frees a handle produced by [`Handle::into_raw`] and its native object.
    ///
    /// # Safety
    /// `handle` must be null or come from [`Handle::into_raw`] and not have
    /// been released before.
    unsafe fn release(handle: *mut Self) {
        if handle.is_null() {
            return;
        }
        // SAFETY: upheld by the caller.
        let boxed = unsafe { Box::from_raw(handle) };
        let native = boxed.native_ptr();
        if !native.is_null() {
            // SAFETY: the native pointer was produced by `Box::into_raw` in `into_raw`.
            drop(unsafe { Box::from_raw(native) });
        }
        tracing::trace!(handle = Self::NAME, "released");
    }
}

macro_rules! impl_handle {
    ($handle:ident, $native:ty, $name:literal) => {
        impl Handle for $handle {
            type Native = $native;
            const NAME: &'static str = $name;

            fn from_native_ptr(ptr: *mut $native) -> Self {
                Self { ptr }
            }

            fn native_ptr(self) -> *mut $native {
                self.ptr
            }
        }
    };
}

impl_handle!(Mat, photo_core::Mat, "Mat");
impl_handle!(VecMat, Vec<photo_core::Mat>, "VecMat");
impl_handle!(MergeMertens, photo_core::MergeMertens, "MergeMertens");
impl_handle!(AlignMTB, photo_core::AlignMtb, "AlignMTB");

/// Writes `value` through an out-parameter.
///
/// # Safety
/// `out` must be null or valid for writes.
unsafe fn write_out<T>(out: *mut T, name: &'static str, value: T) -> Result<(), ShimError> {
    if out.is_null() {
        return Err(ShimError::NullOutput(name));
    }
    // SAFETY: non-null and writable per the caller.
    unsafe { out.write(value) };
    Ok(())
}

fn to_c_int(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

/// Creates an empty matrix.
///
/// # Safety
/// `rval` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_New(rval: *mut *mut Mat) -> *mut CvStatus {
    envelope!("Mat_New", {
        if rval.is_null() {
            return Err(ShimError::NullOutput("rval"));
        }
        // SAFETY: checked non-null, writable per the contract.
        unsafe { write_out(rval, "rval", Mat::into_raw(photo_core::Mat::new())) }
    })
}

/// Creates a matrix by copying `len` bytes from `buf`.
///
/// `mat_type` uses the packed `depth + ((channels - 1) << 3)` encoding and
/// `len` must equal `rows * cols * pixel size`. Float samples are native
/// endian.
///
/// # Safety
/// `buf` must be readable for `len` bytes (or null when `len` is 0) and
/// `rval` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_NewFromBytes(
    rows: c_int,
    cols: c_int,
    mat_type: c_int,
    buf: *const u8,
    len: usize,
    rval: *mut *mut Mat,
) -> *mut CvStatus {
    envelope!("Mat_NewFromBytes", {
        if rval.is_null() {
            return Err(ShimError::NullOutput("rval"));
        }
        let (Ok(rows), Ok(cols)) = (usize::try_from(rows), usize::try_from(cols)) else {
            return Err(ShimError::InvalidBuffer(format!("negative size {rows}x{cols}")));
        };
        let bytes: &[u8] = if len == 0 {
            &[]
        } else if buf.is_null() {
            return Err(ShimError::InvalidBuffer(format!("null buffer of {len} bytes")));
        } else {
            // SAFETY:
            // - `buf` is non-null and the contract requires `len` readable bytes.
            // - `u8` has alignment 1.
            // - The bytes are copied before returning, so the borrow ends with the call.
            unsafe { std::slice::from_raw_parts(buf, len) }
        };
        let mat_type = photo_core::MatType::from_code(mat_type)?;
        let mat = photo_core::Mat::from_bytes(rows, cols, mat_type, bytes)?;
        // SAFETY: checked non-null above.
        unsafe { write_out(rval, "rval", Mat::into_raw(mat)) }
    })
}

/// Number of rows.
///
/// # Safety
/// `m` must be a live handle and `rval` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_Rows(m: Mat, rval: *mut c_int) -> *mut CvStatus {
    envelope!("Mat_Rows", {
        // SAFETY: live handle per the contract.
        let mat = unsafe { m.native()? };
        unsafe { write_out(rval, "rval", to_c_int(mat.rows())) }
    })
}

/// Number of columns.
///
/// # Safety
/// `m` must be a live handle and `rval` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_Cols(m: Mat, rval: *mut c_int) -> *mut CvStatus {
    envelope!("Mat_Cols", {
        // SAFETY: live handle per the contract.
        let mat = unsafe { m.native()? };
        unsafe { write_out(rval, "rval", to_c_int(mat.cols())) }
    })
}

/// Channels per pixel.
///
/// # Safety
/// `m` must be a live handle and `rval` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_Channels(m: Mat, rval: *mut c_int) -> *mut CvStatus {
    envelope!("Mat_Channels", {
        // SAFETY: live handle per the contract.
        let mat = unsafe { m.native()? };
        unsafe { write_out(rval, "rval", to_c_int(mat.channels())) }
    })
}

/// Packed element type code.
///
/// # Safety
/// `m` must be a live handle and `rval` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_Type(m: Mat, rval: *mut c_int) -> *mut CvStatus {
    envelope!("Mat_Type", {
        // SAFETY: live handle per the contract.
        let mat = unsafe { m.native()? };
        unsafe { write_out(rval, "rval", mat.mat_type().code()) }
    })
}

/// Borrows the pixel bytes of `m`. The pointer stays valid until `m` is
/// released.
///
/// # Safety
/// `m` must be a live handle, `data` and `len` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_Data(m: Mat, data: *mut *const u8, len: *mut usize) -> *mut CvStatus {
    envelope!("Mat_Data", {
        if data.is_null() {
            return Err(ShimError::NullOutput("data"));
        }
        // SAFETY: live handle per the contract.
        let bytes = unsafe { m.native()? }.as_bytes();
        unsafe { write_out(len, "len", bytes.len())? };
        unsafe { write_out(data, "data", bytes.as_ptr()) }
    })
}

/// Releases a matrix handle. Null is a no-op.
///
/// # Safety
/// `m` must be null or a handle delivered by this library, released once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Mat_Close(m: *mut Mat) {
    // SAFETY: forwarded contract.
    unsafe { Mat::release(m) }
}

/// Creates an empty sequence.
///
/// # Safety
/// `rval` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn VecMat_New(rval: *mut *mut VecMat) -> *mut CvStatus {
    envelope!("VecMat_New", {
        if rval.is_null() {
            return Err(ShimError::NullOutput("rval"));
        }
        unsafe { write_out(rval, "rval", VecMat::into_raw(Vec::new())) }
    })
}

/// Appends a copy of `m` to `v`.
///
/// # Safety
/// Both handles must be live and `v` must not be in use by another call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn VecMat_Append(v: VecMat, m: Mat) -> *mut CvStatus {
    envelope!("VecMat_Append", {
        // SAFETY: live handles per the contract; `v` is exclusively ours for the call.
        let mat = unsafe { m.native()? }.clone();
        unsafe { v.native_mut()? }.push(mat);
        Ok(())
    })
}

/// Number of matrices in `v`.
///
/// # Safety
/// `v` must be a live handle and `rval` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn VecMat_Size(v: VecMat, rval: *mut c_int) -> *mut CvStatus {
    envelope!("VecMat_Size", {
        // SAFETY: live handle per the contract.
        let len = unsafe { v.native()? }.len();
        unsafe { write_out(rval, "rval", to_c_int(len)) }
    })
}

/// Copies the matrix at `idx` into a new handle.
///
/// # Safety
/// `v` must be a live handle and `rval` valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn VecMat_At(v: VecMat, idx: c_int, rval: *mut *mut Mat) -> *mut CvStatus {
    envelope!("VecMat_At", {
        if rval.is_null() {
            return Err(ShimError::NullOutput("rval"));
        }
        // SAFETY: live handle per the contract.
        let seq = unsafe { v.native()? };
        let mat = usize::try_from(idx)
            .ok()
            .and_then(|i| seq.get(i))
            .ok_or(ShimError::IndexOutOfRange { index: idx, len: seq.len() })?;
        unsafe { write_out(rval, "rval", Mat::into_raw(mat.clone())) }
    })
}

/// Releases a sequence handle and every matrix in it. Null is a no-op.
///
/// # Safety
/// `v` must be null or a handle delivered by this library, released once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn VecMat_Close(v: *mut VecMat) {
    // SAFETY: forwarded contract.
    unsafe { VecMat::release(v) }
}

/// Releases an exposure fusion handle. Null is a no-op.
///
/// # Safety
/// `b` must be null or a handle delivered by this library, released once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn MergeMertens_Close(b: *mut MergeMertens) {
    // SAFETY: forwarded contract.
    unsafe { MergeMertens::release(b) }
}

/// Releases an alignment handle. Null is a no-op.
///
/// # Safety
/// `b` must be null or a handle delivered by this library, released once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AlignMTB_Close(b: *mut AlignMTB) {
    // SAFETY: forwarded contract.
    unsafe { AlignMTB::release(b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn new_from_bytes_and_accessors() {
        let bytes = [1u8, 2, 3, 4, 5, 6];
        let mut m: *mut Mat = ptr::null_mut();
        let status = unsafe { Mat_NewFromBytes(1, 2, 16, bytes.as_ptr(), bytes.len(), &mut m) };
        assert!(status.is_null());

        let handle = unsafe { *m };
        let (mut rows, mut cols, mut cn, mut ty) = (0, 0, 0, 0);
        unsafe {
            assert!(Mat_Rows(handle, &mut rows).is_null());
            assert!(Mat_Cols(handle, &mut cols).is_null());
            assert!(Mat_Channels(handle, &mut cn).is_null());
            assert!(Mat_Type(handle, &mut ty).is_null());
        }
        assert_eq!((rows, cols, cn, ty), (1, 2, 3, 16));

        let (mut data, mut len) = (ptr::null(), 0usize);
        assert!(unsafe { Mat_Data(handle, &mut data, &mut len) }.is_null());
        assert_eq!(unsafe { std::slice::from_raw_parts(data, len) }, &bytes);
        unsafe { Mat_Close(m) };
    }

    #[test]
    fn wrong_length_is_a_library_error() {
        let mut m: *mut Mat = ptr::null_mut();
        let status = unsafe { Mat_NewFromBytes(2, 2, 0, [0u8; 3].as_ptr(), 3, &mut m) };
        assert!(!status.is_null());
        assert_eq!(unsafe { (*status).kind }, crate::status::StatusKind::LibraryError);
        assert!(m.is_null());
        unsafe { crate::status::CvStatus_Close(status) };
    }

    #[test]
    fn size_overflow_is_a_library_error() {
        let mut m: *mut Mat = ptr::null_mut();
        let status = unsafe { Mat_NewFromBytes(1 << 30, 1 << 30, 29, ptr::null(), 0, &mut m) };
        assert!(!status.is_null());
        assert_eq!(unsafe { (*status).kind }, crate::status::StatusKind::LibraryError);
        assert_eq!(unsafe { (*status).code }, -209);
        assert!(m.is_null());
        unsafe { crate::status::CvStatus_Close(status) };

        let status = unsafe { Mat_NewFromBytes(c_int::MAX, c_int::MAX, 16, ptr::null(), 0, &mut m) };
        assert_eq!(unsafe { (*status).code }, -209);
        assert!(m.is_null());
        unsafe { crate::status::CvStatus_Close(status) };
    }

    #[test]
    fn negative_size_is_rejected() {
        let mut m: *mut Mat = ptr::null_mut();
        let status = unsafe { Mat_NewFromBytes(-1, 2, 0, ptr::null(), 0, &mut m) };
        assert_eq!(unsafe { (*status).kind }, crate::status::StatusKind::InternalError);
        unsafe { crate::status::CvStatus_Close(status) };
    }

    #[test]
    fn sequence_stores_copies() {
        let mut v: *mut VecMat = ptr::null_mut();
        let mut m: *mut Mat = ptr::null_mut();
        unsafe {
            assert!(VecMat_New(&mut v).is_null());
            assert!(Mat_NewFromBytes(1, 1, 0, [9u8].as_ptr(), 1, &mut m).is_null());
            assert!(VecMat_Append(*v, *m).is_null());
            Mat_Close(m);
        }

        let mut size = 0;
        let mut first: *mut Mat = ptr::null_mut();
        unsafe {
            assert!(VecMat_Size(*v, &mut size).is_null());
            assert!(VecMat_At(*v, 0, &mut first).is_null());
        }
        assert_eq!(size, 1);
        assert_eq!(unsafe { (*(*first).ptr).pixel_u8(0, 0) }, Some(&[9u8][..]));

        let status = unsafe { VecMat_At(*v, 1, &mut first) };
        assert!(unsafe { (*status).message() }.contains("out of range"));
        unsafe {
            crate::status::CvStatus_Close(status);
            Mat_Close(first);
            VecMat_Close(v);
        }
    }

    #[test]
    fn null_handle_is_reported() {
        let mut rows = 0;
        let status = unsafe { Mat_Rows(Mat { ptr: ptr::null_mut() }, &mut rows) };
        assert_eq!(unsafe { (*status).message() }, "Mat handle is null");
        unsafe { crate::status::CvStatus_Close(status) };
    }

    #[test]
    fn closing_null_handles_is_a_no_op() {
        unsafe {
            Mat_Close(ptr::null_mut());
            VecMat_Close(ptr::null_mut());
            MergeMertens_Close(ptr::null_mut());
            AlignMTB_Close(ptr::null_mut());
        }
    }
}
