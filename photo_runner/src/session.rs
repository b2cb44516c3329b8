//! Drives the shim entry points for one job.
//!
//! Results arrive through callbacks. The shim invokes them on the calling
//! thread before the entry point returns, so each call drains a
//! thread-local inbox right after the status has been checked.

use std::cell::RefCell;
use std::ffi::{c_int, c_void};
use std::marker::PhantomData;
use std::ptr;

use crate::convert::Image;
use crate::error::AppError;
use crate::ffi::{CloseFn, Handle, Point, Status};
use crate::job::{
    ALIGN_MTB_CUT, ALIGN_MTB_EXCLUDE_RANGE, ALIGN_MTB_MAX_BITS, Job, MERGE_MERTENS_CONTRAST_WEIGHT,
    MERGE_MERTENS_EXPOSURE_WEIGHT, MERGE_MERTENS_SATURATION_WEIGHT, NL_MEANS_H, NL_MEANS_H_COLOR,
    NL_MEANS_SEARCH_WINDOW_SIZE, NL_MEANS_TEMPLATE_WINDOW_SIZE,
};
use crate::loader::PhotoApi;

thread_local! {
    static INBOX: RefCell<Vec<*mut c_void>> = const { RefCell::new(Vec::new()) };
    static PAIR_INBOX: RefCell<Vec<(*mut c_void, *mut c_void)>> = const { RefCell::new(Vec::new()) };
}

unsafe extern "C" fn receive(handle: *mut c_void) {
    INBOX.with(|inbox| inbox.borrow_mut().push(handle));
}

unsafe extern "C" fn receive_pair(first: *mut c_void, second: *mut c_void) {
    PAIR_INBOX.with(|inbox| inbox.borrow_mut().push((first, second)));
}

/// Handle released through its close function on drop.
struct Owned<'a> {
    ptr: *mut Handle,
    close: CloseFn,
    _api: PhantomData<&'a PhotoApi>,
}

impl<'a> Owned<'a> {
    fn new(ptr: *mut Handle, close: CloseFn) -> Self {
        Self { ptr, close, _api: PhantomData }
    }

    fn handle(&self) -> Handle {
        // SAFETY: `ptr` came from the shim and is non-null until drop.
        unsafe { *self.ptr }
    }
}

impl Drop for Owned<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle is owned here and released exactly once.
        unsafe { (self.close)(self.ptr) };
    }
}

/// Calls into a loaded shim on behalf of a [`Job`].
pub struct Session<'a> {
    api: &'a PhotoApi,
}

impl<'a> Session<'a> {
    /// Wraps resolved entry points.
    pub fn new(api: &'a PhotoApi) -> Self {
        Self { api }
    }

    /// Runs `job` over `inputs` and returns its output images.
    ///
    /// Pencil sketch yields the sketch then the colour rendering. Align
    /// yields one image per input. Everything else yields a single image.
    pub fn run(&self, job: &Job, inputs: &[Image]) -> Result<Vec<Image>, AppError> {
        let needed = job.min_inputs();
        if inputs.len() < needed {
            return Err(AppError::NotEnoughInputs { operation: job.name(), needed, given: inputs.len() });
        }
        let api = self.api;
        let first = &inputs[0];

        let out = match job {
            Job::ColorChange { mask, red_mul, green_mul, blue_mul } => {
                let src = self.upload(first)?;
                let mask = self.upload(&Image::load_mask(mask)?)?;
                self.call("ColorChange_Async", |cb| unsafe {
                    (api.color_change)(src.handle(), mask.handle(), *red_mul, *green_mul, *blue_mul, cb)
                })?
            }
            Job::SeamlessClone { dst, mask, p, flags } => {
                let dst = Image::load_bgr(dst)?;
                let p = match p {
                    Some([x, y]) => Point { x: *x, y: *y },
                    None => Point { x: dst.cols / 2, y: dst.rows / 2 },
                };
                let src = self.upload(first)?;
                let dst = self.upload(&dst)?;
                let mask = self.upload(&Image::load_mask(mask)?)?;
                self.call("SeamlessClone_Async", |cb| unsafe {
                    (api.seamless_clone)(src.handle(), dst.handle(), mask.handle(), p, *flags, cb)
                })?
            }
            Job::IlluminationChange { mask, alpha, beta } => {
                let src = self.upload(first)?;
                let mask = self.upload(&Image::load_mask(mask)?)?;
                self.call("IlluminationChange_Async", |cb| unsafe {
                    (api.illumination_change)(src.handle(), mask.handle(), *alpha, *beta, cb)
                })?
            }
            Job::TextureFlattening { mask, low_threshold, high_threshold, kernel_size } => {
                let src = self.upload(first)?;
                let mask = self.upload(&Image::load_mask(mask)?)?;
                self.call("TextureFlattening_Async", |cb| unsafe {
                    (api.texture_flattening)(src.handle(), mask.handle(), *low_threshold, *high_threshold, *kernel_size, cb)
                })?
            }
            Job::FastNlMeansDenoising { h: None, template_window_size: None, search_window_size: None } => {
                let src = self.upload(first)?;
                self.call("FastNlMeansDenoising_Async", |cb| unsafe { (api.denoise)(src.handle(), cb) })?
            }
            Job::FastNlMeansDenoising { h, template_window_size, search_window_size } => {
                let src = self.upload(first)?;
                self.call("FastNlMeansDenoisingWithParams_Async", |cb| unsafe {
                    (api.denoise_with_params)(
                        src.handle(),
                        h.unwrap_or(NL_MEANS_H),
                        template_window_size.unwrap_or(NL_MEANS_TEMPLATE_WINDOW_SIZE),
                        search_window_size.unwrap_or(NL_MEANS_SEARCH_WINDOW_SIZE),
                        cb,
                    )
                })?
            }
            Job::FastNlMeansDenoisingColored {
                h: None,
                h_color: None,
                template_window_size: None,
                search_window_size: None,
            } => {
                let src = self.upload(first)?;
                self.call("FastNlMeansDenoisingColored_Async", |cb| unsafe { (api.denoise_colored)(src.handle(), cb) })?
            }
            Job::FastNlMeansDenoisingColored { h, h_color, template_window_size, search_window_size } => {
                let src = self.upload(first)?;
                self.call("FastNlMeansDenoisingColoredWithParams_Async", |cb| unsafe {
                    (api.denoise_colored_with_params)(
                        src.handle(),
                        h.unwrap_or(NL_MEANS_H),
                        h_color.unwrap_or(NL_MEANS_H_COLOR),
                        template_window_size.unwrap_or(NL_MEANS_TEMPLATE_WINDOW_SIZE),
                        search_window_size.unwrap_or(NL_MEANS_SEARCH_WINDOW_SIZE),
                        cb,
                    )
                })?
            }
            Job::FastNlMeansDenoisingColoredMulti {
                img_to_denoise_index,
                temporal_window_size,
                h: None,
                h_color: None,
                template_window_size: None,
                search_window_size: None,
            } => {
                let frames = self.sequence(inputs)?;
                self.call("FastNlMeansDenoisingColoredMulti_Async", |cb| unsafe {
                    (api.denoise_multi)(frames.handle(), *img_to_denoise_index, *temporal_window_size, cb)
                })?
            }
            Job::FastNlMeansDenoisingColoredMulti {
                img_to_denoise_index,
                temporal_window_size,
                h,
                h_color,
                template_window_size,
                search_window_size,
            } => {
                let frames = self.sequence(inputs)?;
                self.call("FastNlMeansDenoisingColoredMultiWithParams_Async", |cb| unsafe {
                    (api.denoise_multi_with_params)(
                        frames.handle(),
                        *img_to_denoise_index,
                        *temporal_window_size,
                        h.unwrap_or(NL_MEANS_H),
                        h_color.unwrap_or(NL_MEANS_H_COLOR),
                        template_window_size.unwrap_or(NL_MEANS_TEMPLATE_WINDOW_SIZE),
                        search_window_size.unwrap_or(NL_MEANS_SEARCH_WINDOW_SIZE),
                        cb,
                    )
                })?
            }
            Job::MergeMertens { contrast_weight, saturation_weight, exposure_weight } => {
                let merge = match (contrast_weight, saturation_weight, exposure_weight) {
                    (None, None, None) => self.call_with(
                        "MergeMertens_Create_Async",
                        api.merge_mertens_close,
                        |cb| unsafe { (api.merge_mertens_create)(cb) },
                    )?,
                    (c, s, e) => self.call_with(
                        "MergeMertens_CreateWithParams_Async",
                        api.merge_mertens_close,
                        |cb| unsafe {
                            (api.merge_mertens_create_with_params)(
                                c.unwrap_or(MERGE_MERTENS_CONTRAST_WEIGHT),
                                s.unwrap_or(MERGE_MERTENS_SATURATION_WEIGHT),
                                e.unwrap_or(MERGE_MERTENS_EXPOSURE_WEIGHT),
                                cb,
                            )
                        },
                    )?,
                };
                let exposures = self.sequence(inputs)?;
                self.call("MergeMertens_Process_Async", |cb| unsafe {
                    (api.merge_mertens_process)(merge.handle(), exposures.handle(), cb)
                })?
            }
            Job::AlignMtb { max_bits, exclude_range, cut } => {
                let align = match (max_bits, exclude_range, cut) {
                    (None, None, None) => self.call_with("AlignMTB_Create_Async", api.align_mtb_close, |cb| unsafe {
                        (api.align_mtb_create)(cb)
                    })?,
                    (m, e, c) => self.call_with("AlignMTB_CreateWithParams_Async", api.align_mtb_close, |cb| unsafe {
                        (api.align_mtb_create_with_params)(
                            m.unwrap_or(ALIGN_MTB_MAX_BITS),
                            e.unwrap_or(ALIGN_MTB_EXCLUDE_RANGE),
                            c.unwrap_or(ALIGN_MTB_CUT),
                            cb,
                        )
                    })?,
                };
                let exposures = self.sequence(inputs)?;
                let aligned = self.call_with("AlignMTB_Process_Async", api.vec_mat_close, |cb| unsafe {
                    (api.align_mtb_process)(align.handle(), exposures.handle(), cb)
                })?;
                return self.unpack(&aligned);
            }
            Job::DetailEnhance { sigma_s, sigma_r } => {
                let src = self.upload(first)?;
                self.call("DetailEnhance_Async", |cb| unsafe {
                    (api.detail_enhance)(src.handle(), *sigma_s, *sigma_r, cb)
                })?
            }
            Job::EdgePreservingFilter { filter, sigma_s, sigma_r } => {
                let src = self.upload(first)?;
                self.call("EdgePreservingFilter_Async", |cb| unsafe {
                    (api.edge_preserving_filter)(src.handle(), *filter, *sigma_s, *sigma_r, cb)
                })?
            }
            Job::PencilSketch { sigma_s, sigma_r, shade_factor } => {
                let src = self.upload(first)?;
                let (sketch, colored) = self.call_pair("PencilSketch_Async", |cb| unsafe {
                    let placeholder = Handle { ptr: ptr::null_mut() };
                    (api.pencil_sketch)(src.handle(), placeholder, placeholder, *sigma_s, *sigma_r, *shade_factor, cb)
                })?;
                return Ok(vec![self.download(&sketch)?, self.download(&colored)?]);
            }
            Job::Stylization { sigma_s, sigma_r } => {
                let src = self.upload(first)?;
                self.call("Stylization_Async", |cb| unsafe { (api.stylization)(src.handle(), *sigma_s, *sigma_r, cb) })?
            }
            Job::Inpaint { mask, inpaint_radius, algorithm } => {
                let src = self.upload(first)?;
                let mask = self.upload(&Image::load_mask(mask)?)?;
                self.call("PhotoInpaint_Async", |cb| unsafe {
                    (api.inpaint)(src.handle(), mask.handle(), *inpaint_radius, *algorithm, cb)
                })?
            }
        };

        Ok(vec![self.download(&out)?])
    }

    /// Turns a returned status into a result, releasing the status.
    fn check(&self, entry: &'static str, status: Status) -> Result<(), AppError> {
        if status.is_null() {
            return Ok(());
        }
        // SAFETY: a non-null status is owned by the caller until closed.
        let (kind, code, message) = unsafe { ((*status).kind, (*status).code, (*status).message()) };
        unsafe { (self.api.status_close)(status) };
        tracing::debug!(entry, kind, code, "entry point reported failure");
        Err(AppError::Status { entry, kind, code, message })
    }

    /// Calls an entry point that delivers one matrix.
    fn call<F>(&self, entry: &'static str, f: F) -> Result<Owned<'a>, AppError>
    where
        F: FnOnce(crate::ffi::Callback1) -> Status,
    {
        self.call_with(entry, self.api.mat_close, f)
    }

    /// Calls an entry point that delivers one handle released by `close`.
    fn call_with<F>(&self, entry: &'static str, close: CloseFn, f: F) -> Result<Owned<'a>, AppError>
    where
        F: FnOnce(crate::ffi::Callback1) -> Status,
    {
        INBOX.with(|inbox| inbox.borrow_mut().clear());
        let status = f(Some(receive));
        let delivered: Vec<Owned<'a>> = INBOX
            .with(|inbox| std::mem::take(&mut *inbox.borrow_mut()))
            .into_iter()
            .map(|h| Owned::new(h.cast(), close))
            .collect();
        self.check(entry, status)?;

        let got = delivered.len();
        let mut delivered = delivered.into_iter();
        match (delivered.next(), got) {
            (Some(handle), 1) => Ok(handle),
            _ => Err(AppError::Delivery { entry, expected: 1, got }),
        }
    }

    /// Calls an entry point that delivers two matrices.
    fn call_pair<F>(&self, entry: &'static str, f: F) -> Result<(Owned<'a>, Owned<'a>), AppError>
    where
        F: FnOnce(crate::ffi::Callback2) -> Status,
    {
        PAIR_INBOX.with(|inbox| inbox.borrow_mut().clear());
        let status = f(Some(receive_pair));
        let close = self.api.mat_close;
        let delivered: Vec<(Owned<'a>, Owned<'a>)> = PAIR_INBOX
            .with(|inbox| std::mem::take(&mut *inbox.borrow_mut()))
            .into_iter()
            .map(|(a, b)| (Owned::new(a.cast(), close), Owned::new(b.cast(), close)))
            .collect();
        self.check(entry, status)?;

        let got = delivered.len();
        let mut delivered = delivered.into_iter();
        match (delivered.next(), got) {
            (Some(pair), 1) => Ok(pair),
            _ => Err(AppError::Delivery { entry, expected: 1, got }),
        }
    }

    fn upload(&self, image: &Image) -> Result<Owned<'a>, AppError> {
        let mut out = ptr::null_mut();
        // SAFETY: the buffer outlives the call and the shim copies it.
        let status = unsafe {
            (self.api.mat_new_from_bytes)(
                image.rows,
                image.cols,
                image.mat_type,
                image.data.as_ptr(),
                image.data.len(),
                &mut out,
            )
        };
        self.check("Mat_NewFromBytes", status)?;
        Ok(Owned::new(out, self.api.mat_close))
    }

    fn download(&self, mat: &Owned<'a>) -> Result<Image, AppError> {
        let rows = self.int("Mat_Rows", self.api.mat_rows, mat)?;
        let cols = self.int("Mat_Cols", self.api.mat_cols, mat)?;
        let mat_type = self.int("Mat_Type", self.api.mat_type, mat)?;

        let mut data = ptr::null();
        let mut len = 0usize;
        let status = unsafe { (self.api.mat_data)(mat.handle(), &mut data, &mut len) };
        self.check("Mat_Data", status)?;
        let data = if data.is_null() || len == 0 {
            Vec::new()
        } else {
            // SAFETY: the shim lends `len` bytes that stay valid while `mat` is open.
            unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
        };

        Ok(Image { rows, cols, mat_type, data })
    }

    fn int(
        &self,
        entry: &'static str,
        f: crate::ffi::HandleIntFn,
        handle: &Owned<'a>,
    ) -> Result<i32, AppError> {
        let mut value: c_int = 0;
        let status = unsafe { f(handle.handle(), &mut value) };
        self.check(entry, status)?;
        Ok(value)
    }

    fn sequence(&self, images: &[Image]) -> Result<Owned<'a>, AppError> {
        let mut out = ptr::null_mut();
        let status = unsafe { (self.api.vec_mat_new)(&mut out) };
        self.check("VecMat_New", status)?;
        let seq = Owned::new(out, self.api.vec_mat_close);

        for image in images {
            let item = self.upload(image)?;
            let status = unsafe { (self.api.vec_mat_append)(seq.handle(), item.handle()) };
            self.check("VecMat_Append", status)?;
        }
        Ok(seq)
    }

    fn unpack(&self, seq: &Owned<'a>) -> Result<Vec<Image>, AppError> {
        let len = self.int("VecMat_Size", self.api.vec_mat_size, seq)?;
        (0..len)
            .map(|i| {
                let mut out = ptr::null_mut();
                let status = unsafe { (self.api.vec_mat_at)(seq.handle(), i, &mut out) };
                self.check("VecMat_At", status)?;
                self.download(&Owned::new(out, self.api.mat_close))
            })
            .collect()
    }
}
