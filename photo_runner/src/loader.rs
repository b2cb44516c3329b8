use libloading::Library;
use std::path::Path;

use crate::ffi::*;

/// Resolves a symbol and copies the function pointer out of it. The pointer
/// stays valid while the owning [`Library`] is loaded.
macro_rules! resolve {
    ($lib:expr, $name:literal) => {
        *$lib.get($name)?
    };
}

/// Function pointers resolved from the shim library.
#[derive(Debug, Clone, Copy)]
pub struct PhotoApi {
    /// `Mat_NewFromBytes`
    pub mat_new_from_bytes: MatNewFromBytesFn,
    /// `Mat_Rows`
    pub mat_rows: HandleIntFn,
    /// `Mat_Cols`
    pub mat_cols: HandleIntFn,
    /// `Mat_Type`
    pub mat_type: HandleIntFn,
    /// `Mat_Data`
    pub mat_data: MatDataFn,
    /// `Mat_Close`
    pub mat_close: CloseFn,
    /// `VecMat_New`
    pub vec_mat_new: VecMatNewFn,
    /// `VecMat_Append`
    pub vec_mat_append: VecMatAppendFn,
    /// `VecMat_Size`
    pub vec_mat_size: HandleIntFn,
    /// `VecMat_At`
    pub vec_mat_at: VecMatAtFn,
    /// `VecMat_Close`
    pub vec_mat_close: CloseFn,
    /// `MergeMertens_Close`
    pub merge_mertens_close: CloseFn,
    /// `AlignMTB_Close`
    pub align_mtb_close: CloseFn,
    /// `CvStatus_Close`
    pub status_close: StatusCloseFn,

    /// `ColorChange_Async`
    pub color_change: ColorChangeFn,
    /// `SeamlessClone_Async`
    pub seamless_clone: SeamlessCloneFn,
    /// `IlluminationChange_Async`
    pub illumination_change: IlluminationChangeFn,
    /// `TextureFlattening_Async`
    pub texture_flattening: TextureFlatteningFn,
    /// `FastNlMeansDenoising_Async`
    pub denoise: ImageFn,
    /// `FastNlMeansDenoisingWithParams_Async`
    pub denoise_with_params: DenoiseWithParamsFn,
    /// `FastNlMeansDenoisingColored_Async`
    pub denoise_colored: ImageFn,
    /// `FastNlMeansDenoisingColoredWithParams_Async`
    pub denoise_colored_with_params: DenoiseColoredWithParamsFn,
    /// `FastNlMeansDenoisingColoredMulti_Async`
    pub denoise_multi: DenoiseMultiFn,
    /// `FastNlMeansDenoisingColoredMultiWithParams_Async`
    pub denoise_multi_with_params: DenoiseMultiWithParamsFn,
    /// `MergeMertens_Create_Async`
    pub merge_mertens_create: CreateFn,
    /// `MergeMertens_CreateWithParams_Async`
    pub merge_mertens_create_with_params: MergeMertensCreateWithParamsFn,
    /// `MergeMertens_Process_Async`
    pub merge_mertens_process: ProcessFn,
    /// `AlignMTB_Create_Async`
    pub align_mtb_create: CreateFn,
    /// `AlignMTB_CreateWithParams_Async`
    pub align_mtb_create_with_params: AlignMtbCreateWithParamsFn,
    /// `AlignMTB_Process_Async`
    pub align_mtb_process: ProcessFn,
    /// `DetailEnhance_Async`
    pub detail_enhance: SigmaFn,
    /// `EdgePreservingFilter_Async`
    pub edge_preserving_filter: EdgePreservingFilterFn,
    /// `PencilSketch_Async`
    pub pencil_sketch: PencilSketchFn,
    /// `Stylization_Async`
    pub stylization: SigmaFn,
    /// `PhotoInpaint_Async`
    pub inpaint: InpaintFn,
}

/// Dynamically loaded photo shim.
pub struct PhotoLibrary {
    _lib: Library,
    api: PhotoApi,
}

impl PhotoLibrary {
    /// Loads the shim dynamic library and resolves every entry point.
    ///
    /// # SAFETY
    /// The caller must ensure that the library at `path`:
    /// - exports every symbol of [`PhotoApi`] with exactly the declared ABI and signature,
    /// - follows the handle, status and callback contracts of the shim,
    /// - remains compatible for the lifetime of the returned `PhotoLibrary`.
    pub unsafe fn load(path: &Path) -> Result<Self, libloading::Error> {
        let lib = unsafe { Library::new(path)? };
        let api = unsafe {
            PhotoApi {
                mat_new_from_bytes: resolve!(lib, b"Mat_NewFromBytes"),
                mat_rows: resolve!(lib, b"Mat_Rows"),
                mat_cols: resolve!(lib, b"Mat_Cols"),
                mat_type: resolve!(lib, b"Mat_Type"),
                mat_data: resolve!(lib, b"Mat_Data"),
                mat_close: resolve!(lib, b"Mat_Close"),
                vec_mat_new: resolve!(lib, b"VecMat_New"),
                vec_mat_append: resolve!(lib, b"VecMat_Append"),
                vec_mat_size: resolve!(lib, b"VecMat_Size"),
                vec_mat_at: resolve!(lib, b"VecMat_At"),
                vec_mat_close: resolve!(lib, b"VecMat_Close"),
                merge_mertens_close: resolve!(lib, b"MergeMertens_Close"),
                align_mtb_close: resolve!(lib, b"AlignMTB_Close"),
                status_close: resolve!(lib, b"CvStatus_Close"),
                color_change: resolve!(lib, b"ColorChange_Async"),
                seamless_clone: resolve!(lib, b"SeamlessClone_Async"),
                illumination_change: resolve!(lib, b"IlluminationChange_Async"),
                texture_flattening: resolve!(lib, b"TextureFlattening_Async"),
                denoise: resolve!(lib, b"FastNlMeansDenoising_Async"),
                denoise_with_params: resolve!(lib, b"FastNlMeansDenoisingWithParams_Async"),
                denoise_colored: resolve!(lib, b"FastNlMeansDenoisingColored_Async"),
                denoise_colored_with_params: resolve!(lib, b"FastNlMeansDenoisingColoredWithParams_Async"),
                denoise_multi: resolve!(lib, b"FastNlMeansDenoisingColoredMulti_Async"),
                denoise_multi_with_params: resolve!(lib, b"FastNlMeansDenoisingColoredMultiWithParams_Async"),
                merge_mertens_create: resolve!(lib, b"MergeMertens_Create_Async"),
                merge_mertens_create_with_params: resolve!(lib, b"MergeMertens_CreateWithParams_Async"),
                merge_mertens_process: resolve!(lib, b"MergeMertens_Process_Async"),
                align_mtb_create: resolve!(lib, b"AlignMTB_Create_Async"),
                align_mtb_create_with_params: resolve!(lib, b"AlignMTB_CreateWithParams_Async"),
                align_mtb_process: resolve!(lib, b"AlignMTB_Process_Async"),
                detail_enhance: resolve!(lib, b"DetailEnhance_Async"),
                edge_preserving_filter: resolve!(lib, b"EdgePreservingFilter_Async"),
                pencil_sketch: resolve!(lib, b"PencilSketch_Async"),
                stylization: resolve!(lib, b"Stylization_Async"),
                inpaint: resolve!(lib, b"PhotoInpaint_Async"),
            }
        };

        Ok(Self { _lib: lib, api })
    }

    /// Resolved entry points. Valid while `self` is alive.
    pub fn api(&self) -> &PhotoApi {
        &self.api
    }
}

/// Platform file name of a dynamic library called `name`.
pub fn lib_filename(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{name}.dylib")
    } else {
        format!("lib{name}.so")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_file_names_follow_platform_conventions() {
        let name = lib_filename("photo_async");
        assert!(name.contains("photo_async"));
        if cfg!(target_os = "linux") {
            assert_eq!(name, "libphoto_async.so");
        }
    }

    #[test]
    fn missing_library_is_an_error() {
        let result = unsafe { PhotoLibrary::load(Path::new("/nonexistent/libphoto_async.so")) };
        assert!(result.is_err());
    }
}
