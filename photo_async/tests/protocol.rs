//! Status and callback protocol shared by every entry point.

mod common;

use std::ptr;

use common::*;
use photo_async::handle::{Mat_Close, Mat_Rows};
use photo_async::photo::{
    ColorChange_Async, FastNlMeansDenoising_Async, MergeMertens_Create_Async, PencilSketch_Async, Stylization_Async,
};
use photo_async::{CvStatus_Close, Mat, StatusKind};

#[test]
fn success_returns_null_and_fires_once() {
    let src = OwnedMat::from_native(&photo(10, 10));
    let status = unsafe { Stylization_Async(src.handle(), 60.0, 0.45, Some(capture)) };
    assert!(status.is_null());
    drop(OwnedMat::adopt(take_one()));
}

#[test]
fn null_callback_is_internal_error() {
    let src = OwnedMat::from_native(&photo(8, 8));
    let (kind, code, message) = expect_failure(unsafe { FastNlMeansDenoising_Async(src.handle(), None) });
    assert_eq!((kind, code), (StatusKind::InternalError, -1));
    assert_eq!(message, "callback is null");

    let (kind, _, _) = expect_failure(unsafe { MergeMertens_Create_Async(None) });
    assert_eq!(kind, StatusKind::InternalError);

    let null = Mat { ptr: ptr::null_mut() };
    let (kind, _, _) = expect_failure(unsafe { PencilSketch_Async(src.handle(), null, null, 60.0, 0.07, 0.02, None) });
    assert_eq!(kind, StatusKind::InternalError);
}

#[test]
fn null_input_handle_fails_before_the_library() {
    let mask = OwnedMat::from_native(&solid_mask(4, 4));
    let null = Mat { ptr: ptr::null_mut() };
    let status = unsafe { ColorChange_Async(null, mask.handle(), 1.0, 1.0, 1.0, Some(capture)) };
    let (kind, code, message) = expect_failure(status);
    assert_eq!((kind, code), (StatusKind::InternalError, -1));
    assert_eq!(message, "Mat handle is null");
    assert!(take_single().is_empty());
}

#[test]
fn status_records_entry_point_and_location() {
    let src = OwnedMat::filled(4, 4, &[1, 2, 3]);
    let mask = OwnedMat::from_native(&solid_mask(2, 2));
    let status = unsafe { ColorChange_Async(src.handle(), mask.handle(), 1.0, 1.0, 1.0, Some(capture)) };
    assert!(!status.is_null());

    let s = unsafe { &*status };
    assert_eq!(s.kind, StatusKind::LibraryError);
    assert_eq!(s.func_name(), "ColorChange_Async");
    assert!(s.file_name().ends_with("photo.rs"), "{}", s.file_name());
    assert!(s.line > 0);
    assert!(s.message().contains("colorChange"));
    assert_eq!(s.class(), "Sizes of input arguments do not match");
    unsafe { CvStatus_Close(status) };
    assert!(take_single().is_empty());
}

#[test]
fn releasing_output_leaves_inputs_intact() {
    let native = photo(12, 12);
    let src = OwnedMat::from_native(&native);
    let mask = OwnedMat::from_native(&rect_mask(12, 12, 3, 3, 9, 9));

    assert_ok(unsafe { ColorChange_Async(src.handle(), mask.handle(), 1.5, 0.5, 1.0, Some(capture)) });
    let out: *mut Mat = take_one();
    assert_ne!(unsafe { (*out).ptr }, src.handle().ptr);
    unsafe { Mat_Close(out) };

    let mut rows = 0;
    assert_ok(unsafe { Mat_Rows(src.handle(), &mut rows) });
    assert_eq!(rows, 12);
    assert_eq!(src.native(), &native);
}

#[test]
fn outputs_of_repeated_calls_are_distinct_allocations() {
    let src = OwnedMat::from_native(&photo(8, 8));
    assert_ok(unsafe { FastNlMeansDenoising_Async(src.handle(), Some(capture)) });
    assert_ok(unsafe { FastNlMeansDenoising_Async(src.handle(), Some(capture)) });
    let delivered = take_single();
    assert_eq!(delivered.len(), 2);
    assert_ne!(delivered[0], delivered[1]);
    let (a, b) = (OwnedMat::adopt(delivered[0].cast()), OwnedMat::adopt(delivered[1].cast()));
    assert_eq!(a.native(), b.native());
    drop(a);
    assert_eq!(b.native().rows(), 8);
}
