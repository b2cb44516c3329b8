//! NL-means entry points.

mod common;

use common::*;
use photo_async::StatusKind;
use photo_async::photo::{
    FastNlMeansDenoisingColoredMultiWithParams_Async, FastNlMeansDenoisingColoredMulti_Async,
    FastNlMeansDenoisingColoredWithParams_Async, FastNlMeansDenoisingColored_Async,
    FastNlMeansDenoisingWithParams_Async, FastNlMeansDenoising_Async,
};

fn noisy_gray(rows: usize, cols: usize) -> photo_core::Mat {
    let data = (0..rows * cols)
        .map(|i| {
            let (x, y) = (i % cols, i / cols);
            let base = if x < cols / 2 { 70 } else { 170 };
            (base + ((x * 31 + y * 17) % 9) as i32 - 4) as u8
        })
        .collect();
    photo_core::Mat::from_u8(rows, cols, 1, data).unwrap()
}

#[test]
fn defaults_match_explicit_parameters() {
    let src = OwnedMat::from_native(&noisy_gray(16, 16));

    assert_ok(unsafe { FastNlMeansDenoising_Async(src.handle(), Some(capture)) });
    let defaults = OwnedMat::adopt(take_one());
    assert_ok(unsafe { FastNlMeansDenoisingWithParams_Async(src.handle(), 3.0, 7, 21, Some(capture)) });
    let explicit = OwnedMat::adopt(take_one());

    assert_eq!(defaults.native(), explicit.native());
    assert_eq!(defaults.native().mat_type(), src.native().mat_type());
}

#[test]
fn stronger_filter_smooths_more() {
    let src = OwnedMat::from_native(&noisy_gray(16, 16));
    assert_ok(unsafe { FastNlMeansDenoisingWithParams_Async(src.handle(), 30.0, 3, 7, Some(capture)) });
    let out = OwnedMat::adopt(take_one());

    let spread = |m: &photo_core::Mat| {
        let left: Vec<f32> = (0..16).map(|y| m.at(y, 2, 0)).collect();
        let max = left.iter().copied().fold(f32::MIN, f32::max);
        let min = left.iter().copied().fold(f32::MAX, f32::min);
        max - min
    };
    assert!(spread(out.native()) < spread(src.native()));
}

#[test]
fn colored_defaults_match_explicit_parameters() {
    let src = OwnedMat::from_native(&photo(12, 12));

    assert_ok(unsafe { FastNlMeansDenoisingColored_Async(src.handle(), Some(capture)) });
    let defaults = OwnedMat::adopt(take_one());
    assert_ok(unsafe { FastNlMeansDenoisingColoredWithParams_Async(src.handle(), 3.0, 3.0, 7, 21, Some(capture)) });
    let explicit = OwnedMat::adopt(take_one());

    assert_eq!(defaults.native(), explicit.native());
    assert_eq!(defaults.native().channels(), 3);
}

#[test]
fn colored_rejects_gray_input() {
    let src = OwnedMat::from_native(&noisy_gray(8, 8));
    let status = unsafe { FastNlMeansDenoisingColored_Async(src.handle(), Some(capture)) };
    let (kind, _, _) = expect_failure(status);
    assert_eq!(kind, StatusKind::LibraryError);
    assert!(take_single().is_empty());
}

#[test]
fn multi_frame_defaults_match_explicit_parameters() {
    let frames = OwnedVec::from_natives(&[exposure(10, 10, -6), exposure(10, 10, 0), exposure(10, 10, 6)]);

    assert_ok(unsafe { FastNlMeansDenoisingColoredMulti_Async(frames.handle(), 1, 3, Some(capture)) });
    let defaults = OwnedMat::adopt(take_one());
    assert_ok(unsafe {
        FastNlMeansDenoisingColoredMultiWithParams_Async(frames.handle(), 1, 3, 3.0, 3.0, 7, 21, Some(capture))
    });
    let explicit = OwnedMat::adopt(take_one());

    assert_eq!(defaults.native(), explicit.native());
    assert_eq!((defaults.native().rows(), defaults.native().cols()), (10, 10));
}

#[test]
fn multi_frame_window_is_validated_by_the_library() {
    let frames = OwnedVec::from_natives(&[exposure(6, 6, 0), exposure(6, 6, 4), exposure(6, 6, 8)]);

    for (index, window) in [(1, 2), (0, 3), (3, 1), (2, 3)] {
        let status = unsafe { FastNlMeansDenoisingColoredMulti_Async(frames.handle(), index, window, Some(capture)) };
        let (kind, code, message) = expect_failure(status);
        assert_eq!((kind, code), (StatusKind::LibraryError, -215), "{index} {window}: {message}");
    }
    assert!(take_single().is_empty());
}

#[test]
fn multi_frame_extreme_indices_are_library_errors() {
    let frames = OwnedVec::from_natives(&[exposure(6, 6, 0), exposure(6, 6, 4), exposure(6, 6, 8)]);

    for (index, window) in [(i32::MIN, 3), (i32::MAX, 3), (1, i32::MAX)] {
        let status = unsafe { FastNlMeansDenoisingColoredMulti_Async(frames.handle(), index, window, Some(capture)) };
        let (kind, code, message) = expect_failure(status);
        assert_eq!((kind, code), (StatusKind::LibraryError, -215), "{index} {window}: {message}");
    }
    assert!(take_single().is_empty());
}

#[test]
fn multi_frame_rejects_empty_sequence() {
    let frames = OwnedVec::from_natives(&[]);
    let status = unsafe { FastNlMeansDenoisingColoredMulti_Async(frames.handle(), 0, 1, Some(capture)) };
    let (kind, _, _) = expect_failure(status);
    assert_eq!(kind, StatusKind::LibraryError);
    assert!(take_single().is_empty());
}
