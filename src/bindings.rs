//! Foreign-callable entry points.
//!
//! The safe functions take typed slices. The `extern "C"` layer generates one
//! `imreg_interpolate_<t>` and one `imreg_register_<t>` per element type, turns
//! raw pointers into slices, and reports a [`Status`] code. Output buffers are
//! written only after the whole operation succeeded.

use crate::algorithms::BackendKind;
use crate::config::{load_config_or_default, Config};
use crate::data::{Image, Pixel};
use crate::error::{Error, Result};
use crate::registration::ImageRegistration;
use crate::resample::Resampler;
use crate::transform::{AffineTransform, InterpolationMode, ParameterVector, TransformClass};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Environment variable naming the configuration file read by the C boundary
pub const CONFIG_ENV: &str = "IMREG_CONFIG";

lazy_static::lazy_static! {
    static ref BOUNDARY_CONFIG: Config = load_config_or_default(std::env::var(CONFIG_ENV).ok().as_deref());
}

/// Configuration shared by every boundary call, loaded on first use
pub fn boundary_config() -> &'static Config {
    &BOUNDARY_CONFIG
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    UnsupportedElementType = 1,
    ElementTypeMismatch = 2,
    DimensionMismatch = 3,
    SingularTransform = 4,
    RegistrationFailed = 5,
    ResourceProvisioning = 6,
    BufferSize = 7,
    NullPointer = 8,
    InvalidParameterCount = 9,
    InvalidArgument = 10,
    Io = 11,
    Panic = 99,
}

impl From<&Error> for Status {
    fn from(error: &Error) -> Self {
        match error {
            Error::UnsupportedElementType(_) => Status::UnsupportedElementType,
            Error::ElementTypeMismatch { .. } => Status::ElementTypeMismatch,
            Error::DimensionMismatch { .. } => Status::DimensionMismatch,
            Error::SingularTransform { .. } => Status::SingularTransform,
            Error::RegistrationFailed(_) => Status::RegistrationFailed,
            Error::ResourceProvisioning(_) => Status::ResourceProvisioning,
            Error::BufferSize { .. } => Status::BufferSize,
            Error::NullPointer(_) => Status::NullPointer,
            Error::InvalidParameterCount { .. } => Status::InvalidParameterCount,
            Error::InvalidArgument(_) => Status::InvalidArgument,
            Error::Io(_) => Status::Io,
        }
    }
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Resample `image` in place by `transform` about `origin`
pub fn interpolate<T: Pixel>(
    width: usize,
    height: usize,
    transform: &[f64; 6],
    origin: &[f64; 2],
    image: &mut [T],
    mode: InterpolationMode,
) -> Result<()> {
    let source = Image::from_slice(width, height, image)?;
    let transform = AffineTransform::from_parameters(&ParameterVector(*transform), *origin);
    let resampled = Resampler::from_config(&boundary_config().resample).resample(&source, &transform, mode)?;
    resampled.copy_into(image)
}

/// Register `moving` onto `fixed` and write the six parameters to `transform_out`
pub fn register<T: Pixel>(
    width: usize,
    height: usize,
    fixed: &[T],
    moving: &[T],
    class: TransformClass,
    backend: BackendKind,
    transform_out: &mut [f64; 6],
) -> Result<()> {
    let fixed = Image::from_slice(width, height, fixed)?;
    let moving = Image::from_slice(width, height, moving)?;

    let mut config = boundary_config().registration.clone();
    config.backend = backend;
    let parameters = ImageRegistration::from_config(&config)?.register(&fixed, &moving, class)?;

    *transform_out = parameters.0;
    Ok(())
}

fn guarded<F>(operation: &'static str, f: F) -> i32
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Status::Ok.code(),
        Ok(Err(e)) => {
            let status = Status::from(&e);
            tracing::warn!(operation, ?status, error = %e, "Boundary call failed");
            status.code()
        }
        Err(_) => {
            tracing::error!(operation, "Boundary call panicked");
            Status::Panic.code()
        }
    }
}

unsafe fn read_array<const N: usize>(ptr: *const f64, what: &'static str) -> Result<[f64; N]> {
    if ptr.is_null() {
        return Err(Error::NullPointer(what));
    }
    let mut values = [0.0; N];
    // SAFETY: non-null, and the caller guarantees N readable values.
    values.copy_from_slice(unsafe { std::slice::from_raw_parts(ptr, N) });
    Ok(values)
}

fn pixel_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or_else(|| Error::InvalidArgument(format!("image size {width}x{height} overflows")))
}

unsafe fn pixels<'a, T>(ptr: *const T, width: usize, height: usize, what: &'static str) -> Result<&'a [T]> {
    if ptr.is_null() {
        return Err(Error::NullPointer(what));
    }
    let len = pixel_count(width, height)?;
    // SAFETY: non-null, aligned and `len` elements long per the caller's contract.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

unsafe fn pixels_mut<'a, T>(ptr: *mut T, width: usize, height: usize, what: &'static str) -> Result<&'a mut [T]> {
    if ptr.is_null() {
        return Err(Error::NullPointer(what));
    }
    let len = pixel_count(width, height)?;
    // SAFETY: as above, and the caller holds no other reference during the call.
    Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
}

macro_rules! export_element_type {
    ($($t:ty => $interpolate:ident, $register:ident;)*) => {
        $(
            /// Resample a `width x height` image in place.
            ///
            /// `mode`: 0 nearest neighbor, 1 cubic B-spline. Returns a [`Status`] code.
            ///
            /// # Safety
            /// `transform` must point to 6 and `origin` to 2 readable `f64`;
            /// `image` must point to `width * height` aligned, writable elements.
            #[no_mangle]
            pub unsafe extern "C" fn $interpolate(
                width: usize,
                height: usize,
                transform: *const f64,
                origin: *const f64,
                image: *mut $t,
                mode: u32,
            ) -> i32 {
                guarded(stringify!($interpolate), || {
                    let mode = InterpolationMode::from_code(mode)?;
                    let transform = unsafe { read_array::<6>(transform, "transform")? };
                    let origin = unsafe { read_array::<2>(origin, "origin")? };
                    let image = unsafe { pixels_mut(image, width, height, "image")? };
                    interpolate::<$t>(width, height, &transform, &origin, image, mode)
                })
            }

            /// Register `moving` onto `fixed` and write 6 parameters to `transform_out`.
            ///
            /// `class`: 0 translation, 1 affine. `backend`: 0 in-process, 1 external tool.
            /// Returns a [`Status`] code.
            ///
            /// # Safety
            /// `fixed` and `moving` must each point to `width * height` aligned elements;
            /// `transform_out` must point to 6 writable `f64`.
            #[no_mangle]
            pub unsafe extern "C" fn $register(
                width: usize,
                height: usize,
                fixed: *const $t,
                moving: *const $t,
                class: u32,
                backend: u32,
                transform_out: *mut f64,
            ) -> i32 {
                guarded(stringify!($register), || {
                    let class = TransformClass::from_code(class)?;
                    let backend = BackendKind::from_code(backend)?;
                    if transform_out.is_null() {
                        return Err(Error::NullPointer("transform_out"));
                    }
                    let fixed = unsafe { pixels(fixed, width, height, "fixed")? };
                    let moving = unsafe { pixels(moving, width, height, "moving")? };

                    let mut parameters = [0.0; 6];
                    register::<$t>(width, height, fixed, moving, class, backend, &mut parameters)?;
                    // SAFETY: non-null and 6 writable values per the contract.
                    unsafe { std::slice::from_raw_parts_mut(transform_out, 6) }.copy_from_slice(&parameters);
                    Ok(())
                })
            }
        )*
    };
}

export_element_type! {
    u8 => imreg_interpolate_u8, imreg_register_u8;
    i8 => imreg_interpolate_i8, imreg_register_i8;
    u16 => imreg_interpolate_u16, imreg_register_u16;
    i16 => imreg_interpolate_i16, imreg_register_i16;
    u32 => imreg_interpolate_u32, imreg_register_u32;
    i32 => imreg_interpolate_i32, imreg_register_i32;
    u64 => imreg_interpolate_u64, imreg_register_u64;
    i64 => imreg_interpolate_i64, imreg_register_i64;
    f32 => imreg_interpolate_f32, imreg_register_f32;
    f64 => imreg_interpolate_f64, imreg_register_f64;
}
