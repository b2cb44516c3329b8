use std::ffi::{CStr, c_char, c_int, c_void};

/// Layout shared by every handle the shim hands out: one owning pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    /// Native object owned by the handle.
    pub ptr: *mut c_void,
}

/// Integer pixel position.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// Column.
    pub x: c_int,
    /// Row.
    pub y: c_int,
}

/// Failure report returned by the shim. Null means success.
#[repr(C)]
#[derive(Debug)]
pub struct CvStatus {
    /// `1` library error, `2` internal error.
    pub kind: c_int,
    /// Library or shim error code.
    pub code: c_int,
    /// Full diagnostic message.
    pub msg: *mut c_char,
    /// Short classification.
    pub err: *mut c_char,
    /// Entry point that failed.
    pub func: *mut c_char,
    /// Source file of the catch site.
    pub file: *mut c_char,
    /// Source line of the catch site.
    pub line: c_int,
}

impl CvStatus {
    /// Copies the diagnostic message out of the status.
    ///
    /// # SAFETY
    /// `msg` must be null or a NUL-terminated string owned by the status.
    pub unsafe fn message(&self) -> String {
        if self.msg.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(self.msg) }.to_string_lossy().into_owned()
    }
}

/// Return type of every fallible entry point.
pub type Status = *mut CvStatus;
/// One-handle result callback.
pub type Callback1 = Option<unsafe extern "C" fn(*mut c_void)>;
/// Two-handle result callback.
pub type Callback2 = Option<unsafe extern "C" fn(*mut c_void, *mut c_void)>;

/// `Mat_NewFromBytes`.
pub type MatNewFromBytesFn = unsafe extern "C" fn(c_int, c_int, c_int, *const u8, usize, *mut *mut Handle) -> Status;
/// `Mat_Rows`, `Mat_Cols`, `Mat_Type`, `VecMat_Size`.
pub type HandleIntFn = unsafe extern "C" fn(Handle, *mut c_int) -> Status;
/// `Mat_Data`.
pub type MatDataFn = unsafe extern "C" fn(Handle, *mut *const u8, *mut usize) -> Status;
/// `*_Close` for handles.
pub type CloseFn = unsafe extern "C" fn(*mut Handle);
/// `CvStatus_Close`.
pub type StatusCloseFn = unsafe extern "C" fn(*mut CvStatus);
/// `VecMat_New`.
pub type VecMatNewFn = unsafe extern "C" fn(*mut *mut Handle) -> Status;
/// `VecMat_Append`.
pub type VecMatAppendFn = unsafe extern "C" fn(Handle, Handle) -> Status;
/// `VecMat_At`.
pub type VecMatAtFn = unsafe extern "C" fn(Handle, c_int, *mut *mut Handle) -> Status;

/// `ColorChange_Async`.
pub type ColorChangeFn = unsafe extern "C" fn(Handle, Handle, f32, f32, f32, Callback1) -> Status;
/// `SeamlessClone_Async`.
pub type SeamlessCloneFn = unsafe extern "C" fn(Handle, Handle, Handle, Point, c_int, Callback1) -> Status;
/// `IlluminationChange_Async`.
pub type IlluminationChangeFn = unsafe extern "C" fn(Handle, Handle, f32, f32, Callback1) -> Status;
/// `TextureFlattening_Async`.
pub type TextureFlatteningFn = unsafe extern "C" fn(Handle, Handle, f32, f32, c_int, Callback1) -> Status;
/// Parameter-free single image operations.
pub type ImageFn = unsafe extern "C" fn(Handle, Callback1) -> Status;
/// `FastNlMeansDenoisingWithParams_Async`.
pub type DenoiseWithParamsFn = unsafe extern "C" fn(Handle, f32, c_int, c_int, Callback1) -> Status;
/// `FastNlMeansDenoisingColoredWithParams_Async`.
pub type DenoiseColoredWithParamsFn = unsafe extern "C" fn(Handle, f32, f32, c_int, c_int, Callback1) -> Status;
/// `FastNlMeansDenoisingColoredMulti_Async`.
pub type DenoiseMultiFn = unsafe extern "C" fn(Handle, c_int, c_int, Callback1) -> Status;
/// `FastNlMeansDenoisingColoredMultiWithParams_Async`.
pub type DenoiseMultiWithParamsFn =
    unsafe extern "C" fn(Handle, c_int, c_int, f32, f32, c_int, c_int, Callback1) -> Status;
/// Parameter-free algorithm constructors.
pub type CreateFn = unsafe extern "C" fn(Callback1) -> Status;
/// `MergeMertens_CreateWithParams_Async`.
pub type MergeMertensCreateWithParamsFn = unsafe extern "C" fn(f32, f32, f32, Callback1) -> Status;
/// `AlignMTB_CreateWithParams_Async`.
pub type AlignMtbCreateWithParamsFn = unsafe extern "C" fn(c_int, c_int, bool, Callback1) -> Status;
/// `*_Process_Async` of the algorithm handles.
pub type ProcessFn = unsafe extern "C" fn(Handle, Handle, Callback1) -> Status;
/// `DetailEnhance_Async`, `Stylization_Async`.
pub type SigmaFn = unsafe extern "C" fn(Handle, f32, f32, Callback1) -> Status;
/// `EdgePreservingFilter_Async`.
pub type EdgePreservingFilterFn = unsafe extern "C" fn(Handle, c_int, f32, f32, Callback1) -> Status;
/// `PencilSketch_Async`.
pub type PencilSketchFn = unsafe extern "C" fn(Handle, Handle, Handle, f32, f32, f32, Callback2) -> Status;
/// `PhotoInpaint_Async`.
pub type InpaintFn = unsafe extern "C" fn(Handle, Handle, f32, c_int, Callback1) -> Status;
