//! Non-photorealistic rendering and inpainting entry points.

mod common;

use std::ptr;

use common::*;
use photo_async::handle::Mat_New;
use photo_async::photo::{
    DetailEnhance_Async, EdgePreservingFilter_Async, PencilSketch_Async, PhotoInpaint_Async, Stylization_Async,
};
use photo_async::{Mat, StatusKind};

#[test]
fn pencil_sketch_delivers_two_images() {
    let src = OwnedMat::from_native(&photo(32, 32));
    let mut empty = ptr::null_mut();
    assert_ok(unsafe { Mat_New(&mut empty) });
    let placeholder = OwnedMat::adopt(empty);

    let status = unsafe {
        PencilSketch_Async(src.handle(), placeholder.handle(), placeholder.handle(), 60.0, 0.07, 0.05, Some(capture_pair))
    };
    assert_ok(status);
    let pairs = take_pairs();
    assert_eq!(pairs.len(), 1);
    let sketch = OwnedMat::adopt(pairs[0].0.cast());
    let colored = OwnedMat::adopt(pairs[0].1.cast());

    assert_eq!(sketch.native().channels(), 1);
    assert_eq!(colored.native().channels(), 3);
    for m in [&sketch, &colored] {
        assert_eq!((m.native().rows(), m.native().cols()), (32, 32));
    }
    // Placeholders are left untouched.
    assert!(placeholder.native().is_empty());
}

#[test]
fn pencil_sketch_accepts_null_placeholders() {
    let src = OwnedMat::from_native(&photo(16, 16));
    let null = Mat { ptr: ptr::null_mut() };
    assert_ok(unsafe { PencilSketch_Async(src.handle(), null, null, 60.0, 0.07, 0.02, Some(capture_pair)) });
    let pairs = take_pairs();
    assert_eq!(pairs.len(), 1);
    drop(OwnedMat::adopt(pairs[0].0.cast()));
    drop(OwnedMat::adopt(pairs[0].1.cast()));
}

#[test]
fn pencil_sketch_failure_skips_callback() {
    let gray = OwnedMat::filled(8, 8, &[100]);
    let null = Mat { ptr: ptr::null_mut() };
    let status = unsafe { PencilSketch_Async(gray.handle(), null, null, 60.0, 0.07, 0.02, Some(capture_pair)) };
    let (kind, _, _) = expect_failure(status);
    assert_eq!(kind, StatusKind::LibraryError);
    assert!(take_pairs().is_empty());
}

#[test]
fn filters_keep_size_and_type() {
    let src = OwnedMat::from_native(&photo(20, 20));

    assert_ok(unsafe { DetailEnhance_Async(src.handle(), 10.0, 0.15, Some(capture)) });
    let detail = OwnedMat::adopt(take_one());
    assert_ok(unsafe { EdgePreservingFilter_Async(src.handle(), 1, 60.0, 0.4, Some(capture)) });
    let recursive = OwnedMat::adopt(take_one());
    assert_ok(unsafe { EdgePreservingFilter_Async(src.handle(), 2, 60.0, 0.4, Some(capture)) });
    let normalized = OwnedMat::adopt(take_one());
    assert_ok(unsafe { Stylization_Async(src.handle(), 60.0, 0.45, Some(capture)) });
    let styled = OwnedMat::adopt(take_one());

    for out in [&detail, &recursive, &normalized, &styled] {
        assert_eq!(out.native().mat_type(), src.native().mat_type());
        assert_eq!((out.native().rows(), out.native().cols()), (20, 20));
    }
}

#[test]
fn unknown_filter_flag_is_a_library_error() {
    let src = OwnedMat::from_native(&photo(8, 8));
    let status = unsafe { EdgePreservingFilter_Async(src.handle(), 3, 60.0, 0.4, Some(capture)) };
    let (kind, code, _) = expect_failure(status);
    assert_eq!((kind, code), (StatusKind::LibraryError, -5));
    assert!(take_single().is_empty());
}

#[test]
fn inpaint_fills_constant_surroundings() {
    let src = OwnedMat::filled(12, 12, &[90, 120, 150]);
    let mask = OwnedMat::from_native(&rect_mask(12, 12, 4, 4, 8, 8));

    for algorithm in [0, 1] {
        assert_ok(unsafe { PhotoInpaint_Async(src.handle(), mask.handle(), 3.0, algorithm, Some(capture)) });
        let out = OwnedMat::adopt(take_one());
        assert_eq!(out.native(), src.native());
    }
}

#[test]
fn inpaint_rejects_unknown_algorithm() {
    let src = OwnedMat::filled(6, 6, &[90]);
    let mask = OwnedMat::from_native(&rect_mask(6, 6, 2, 2, 4, 4));
    let status = unsafe { PhotoInpaint_Async(src.handle(), mask.handle(), 3.0, 5, Some(capture)) };
    let (kind, _, _) = expect_failure(status);
    assert_eq!(kind, StatusKind::LibraryError);
    assert!(take_single().is_empty());
}
