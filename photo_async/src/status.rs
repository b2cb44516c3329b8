use std::any::Any;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;

use crate::error::ShimError;

/// Callback receiving one freshly boxed output handle.
#[allow(non_camel_case_types)]
pub type CvCallback_1 = Option<unsafe extern "C" fn(*mut c_void)>;

/// Callback receiving two freshly boxed output handles.
#[allow(non_camel_case_types)]
pub type CvCallback_2 = Option<unsafe extern "C" fn(*mut c_void, *mut c_void)>;

/// Outcome class of a failed call. Success is a null status pointer.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// No error.
    Ok = 0,
    /// The photo library raised the failure.
    LibraryError = 1,
    /// The failure was detected by the shim itself.
    InternalError = 2,
}

/// Failure report handed to the caller.
///
/// Entry points return null on success. A non-null status is owned by the
/// caller and must be released with [`CvStatus_Close`]. All strings are
/// NUL-terminated and owned by the status.
#[repr(C)]
#[derive(Debug)]
pub struct CvStatus {
    /// Failure class.
    pub kind: StatusKind,
    /// Library error code, `-1` for shim errors, `-99` for caught panics.
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

fn c_string(s: &str) -> *mut c_char {
    CString::new(s.replace('\0', " ")).unwrap_or_default().into_raw()
}

fn read(s: *const c_char) -> String {
    if s.is_null() {
        return String::new();
    }
    // SAFETY:
    // - Non-null fields are only ever set from `CString::into_raw` in `c_string`.
    // - The owning status frees them only in `Drop`.
    unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned()
}

impl CvStatus {
    fn new(err: &ShimError, func: &str, file: &str, line: u32) -> Self {
        let kind = match err {
            ShimError::Library(_) => StatusKind::LibraryError,
            _ => StatusKind::InternalError,
        };
        Self {
            kind,
            code: err.code(),
            msg: c_string(&err.to_string()),
            err: c_string(err.class()),
            func: c_string(func),
            file: c_string(file),
            line: line as c_int,
        }
    }

    /// Full diagnostic message.
    pub fn message(&self) -> String {
        read(self.msg)
    }

    /// Short classification.
    pub fn class(&self) -> String {
        read(self.err)
    }

    /// Name of the entry point that failed.
    pub fn func_name(&self) -> String {
        read(self.func)
    }

    /// Source file of the catch site.
    pub fn file_name(&self) -> String {
        read(self.file)
    }
}

impl Drop for CvStatus {
    fn drop(&mut self) {
        for s in [self.msg, self.err, self.func, self.file] {
            if !s.is_null() {
                // SAFETY: every non-null string came from `CString::into_raw` and is freed once here.
                drop(unsafe { CString::from_raw(s) });
            }
        }
    }
}

/// Releases a status returned by any entry point. Null is a no-op.
///
/// # Safety
/// `status` must be null or a pointer returned by this library that has not
/// been released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn CvStatus_Close(status: *mut CvStatus) {
    if status.is_null() {
        return;
    }
    // SAFETY: the caller guarantees `status` came from `Box::into_raw` in `finish`.
    drop(unsafe { Box::from_raw(status) });
}

fn panic_message(payload: Box<dyn Any + Send>) -> Option<String> {
    match payload.downcast::<String>() {
        Ok(s) => Some(*s),
        Err(payload) => payload.downcast_ref::<&str>().map(|s| (*s).to_owned()),
    }
}

/// Converts the outcome of an envelope body into the boundary status.
pub(crate) fn finish(
    func: &'static str,
    file: &'static str,
    line: u32,
    outcome: std::thread::Result<Result<(), ShimError>>,
) -> *mut CvStatus {
    let err = match outcome {
        Ok(Ok(())) => return ptr::null_mut(),
        Ok(Err(err)) => err,
        Err(payload) => ShimError::Panic(panic_message(payload)),
    };
    let status = CvStatus::new(&err, func, file, line);
    tracing::warn!(entry = func, kind = ?status.kind, code = status.code, error = %err, "call failed");
    Box::into_raw(Box::new(status))
}

/// Invokes a one-handle callback with ownership of `handle`.
pub(crate) fn deliver_1<H>(callback: unsafe extern "C" fn(*mut c_void), handle: *mut H) {
    // SAFETY: the entry point contract requires `callback` to accept the
    // handle type documented for that entry point.
    unsafe { callback(handle.cast()) }
}

/// Invokes a two-handle callback with ownership of both handles.
pub(crate) fn deliver_2<A, B>(callback: unsafe extern "C" fn(*mut c_void, *mut c_void), first: *mut A, second: *mut B) {
    // SAFETY: as for `deliver_1`.
    unsafe { callback(first.cast(), second.cast()) }
}

/// Runs an entry point body, trapping panics and converting the result
/// into a `*mut CvStatus`. The body evaluates to `Result<(), ShimError>`.
macro_rules! envelope {
    ($func:literal, $body:block) => {
        $crate::status::finish(
            $func,
            file!(),
            line!(),
            ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(
                || -> ::std::result::Result<(), $crate::error::ShimError> { $body },
            )),
        )
    };
}

pub(crate) use envelope;
