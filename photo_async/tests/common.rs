//! Helpers for driving the entry points the way a C caller would.

#![allow(dead_code)]

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;

use photo_async::handle::{Mat_Close, Mat_NewFromBytes, VecMat_Append, VecMat_Close, VecMat_New};
use photo_async::{CvStatus, CvStatus_Close, Mat, StatusKind, VecMat};

thread_local! {
    static SINGLE: RefCell<Vec<*mut c_void>> = const { RefCell::new(Vec::new()) };
    static PAIRS: RefCell<Vec<(*mut c_void, *mut c_void)>> = const { RefCell::new(Vec::new()) };
}

/// One-handle callback that records what it receives.
pub unsafe extern "C" fn capture(handle: *mut c_void) {
    SINGLE.with(|s| s.borrow_mut().push(handle));
}

/// Two-handle callback that records what it receives.
pub unsafe extern "C" fn capture_pair(first: *mut c_void, second: *mut c_void) {
    PAIRS.with(|p| p.borrow_mut().push((first, second)));
}

/// Drains the handles delivered to [`capture`] on this thread.
pub fn take_single() -> Vec<*mut c_void> {
    SINGLE.with(|s| std::mem::take(&mut *s.borrow_mut()))
}

/// Drains the handle pairs delivered to [`capture_pair`] on this thread.
pub fn take_pairs() -> Vec<(*mut c_void, *mut c_void)> {
    PAIRS.with(|p| std::mem::take(&mut *p.borrow_mut()))
}

/// Asserts exactly one handle was delivered and returns it.
pub fn take_one<H>() -> *mut H {
    let delivered = take_single();
    assert_eq!(delivered.len(), 1, "callback must fire exactly once");
    delivered[0].cast()
}

/// Matrix handle owned by the test, released on drop.
pub struct OwnedMat(pub *mut Mat);

impl OwnedMat {
    pub fn from_native(native: &photo_core::Mat) -> Self {
        let bytes = native.as_bytes();
        let mut out = ptr::null_mut();
        let status = unsafe {
            Mat_NewFromBytes(
                native.rows() as i32,
                native.cols() as i32,
                native.mat_type().code(),
                bytes.as_ptr(),
                bytes.len(),
                &mut out,
            )
        };
        assert_ok(status);
        Self(out)
    }

    pub fn filled(rows: usize, cols: usize, pixel: &[u8]) -> Self {
        Self::from_native(&photo_core::Mat::filled(rows, cols, pixel).unwrap())
    }

    /// Takes ownership of a handle delivered through a callback.
    pub fn adopt(handle: *mut Mat) -> Self {
        assert!(!handle.is_null());
        Self(handle)
    }

    pub fn handle(&self) -> Mat {
        unsafe { *self.0 }
    }

    pub fn native(&self) -> &photo_core::Mat {
        unsafe { &*(*self.0).ptr }
    }
}

impl Drop for OwnedMat {
    fn drop(&mut self) {
        unsafe { Mat_Close(self.0) };
    }
}

/// Sequence handle owned by the test, released on drop.
pub struct OwnedVec(pub *mut VecMat);

impl OwnedVec {
    pub fn from_natives(mats: &[photo_core::Mat]) -> Self {
        let mut out = ptr::null_mut();
        assert_ok(unsafe { VecMat_New(&mut out) });
        let seq = Self(out);
        for m in mats {
            let item = OwnedMat::from_native(m);
            assert_ok(unsafe { VecMat_Append(seq.handle(), item.handle()) });
        }
        seq
    }

    pub fn adopt(handle: *mut VecMat) -> Self {
        assert!(!handle.is_null());
        Self(handle)
    }

    pub fn handle(&self) -> VecMat {
        unsafe { *self.0 }
    }

    pub fn native(&self) -> &Vec<photo_core::Mat> {
        unsafe { &*(*self.0).ptr }
    }
}

impl Drop for OwnedVec {
    fn drop(&mut self) {
        unsafe { VecMat_Close(self.0) };
    }
}

pub fn assert_ok(status: *mut CvStatus) {
    if !status.is_null() {
        let msg = unsafe { (*status).message() };
        unsafe { CvStatus_Close(status) };
        panic!("expected success, got: {msg}");
    }
}

/// Reads and releases a failure status.
pub fn expect_failure(status: *mut CvStatus) -> (StatusKind, i32, String) {
    assert!(!status.is_null(), "expected a failure status");
    let report = unsafe { ((*status).kind, (*status).code, (*status).message()) };
    unsafe { CvStatus_Close(status) };
    report
}

/// 8-bit BGR image with smooth structure plus a deterministic ripple.
pub fn photo(rows: usize, cols: usize) -> photo_core::Mat {
    let mut data = Vec::with_capacity(rows * cols * 3);
    for y in 0..rows {
        for x in 0..cols {
            let ripple = ((x * 7 + y * 13) % 11) as i32 - 5;
            let b = (40 + x * 150 / cols.max(1)) as i32 + ripple;
            let g = (60 + y * 120 / rows.max(1)) as i32 - ripple;
            let r = (if (x / 8 + y / 8) % 2 == 0 { 200 } else { 90 }) + ripple;
            data.extend_from_slice(&[b.clamp(0, 255) as u8, g.clamp(0, 255) as u8, r.clamp(0, 255) as u8]);
        }
    }
    photo_core::Mat::from_u8(rows, cols, 3, data).unwrap()
}

/// Brightness-shifted copy of [`photo`].
pub fn exposure(rows: usize, cols: usize, offset: i32) -> photo_core::Mat {
    let base = photo(rows, cols);
    let data = base
        .data_u8()
        .unwrap()
        .iter()
        .map(|&v| (v as i32 + offset).clamp(0, 255) as u8)
        .collect();
    photo_core::Mat::from_u8(rows, cols, 3, data).unwrap()
}

pub fn solid_mask(rows: usize, cols: usize) -> photo_core::Mat {
    photo_core::Mat::filled(rows, cols, &[255]).unwrap()
}

/// Mask set on the rectangle `[x0, x1) x [y0, y1)`.
pub fn rect_mask(rows: usize, cols: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> photo_core::Mat {
    let mut data = vec![0u8; rows * cols];
    for y in y0..y1 {
        for x in x0..x1 {
            data[y * cols + x] = 255;
        }
    }
    photo_core::Mat::from_u8(rows, cols, 1, data).unwrap()
}
