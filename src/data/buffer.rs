//! Conversion between caller-owned raw buffers and owned images.
//!
//! Every function copies; no image ever aliases caller memory past the call.

use crate::data::element::{ElementType, Pixel};
use crate::data::image::{DynImage, Image};
use crate::error::{Error, Result};
use std::ffi::c_void;

/// Number of bytes a `width x height` buffer of `element_type` occupies
pub fn buffer_len(width: usize, height: usize, element_type: ElementType) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(element_type.byte_size()))
        .ok_or_else(|| Error::InvalidArgument(format!("image size {width}x{height} overflows")))
}

/// Build an owned image from a native-endian byte buffer of the declared type
pub fn build(width: usize, height: usize, element_type: ElementType, bytes: &[u8]) -> Result<DynImage> {
    let expected = buffer_len(width, height, element_type)?;
    if bytes.len() != expected {
        return Err(Error::BufferSize {
            expected,
            actual: bytes.len(),
        });
    }

    match element_type {
        ElementType::U8 => typed::<u8>(width, height, bytes),
        ElementType::I8 => typed::<i8>(width, height, bytes),
        ElementType::U16 => typed::<u16>(width, height, bytes),
        ElementType::I16 => typed::<i16>(width, height, bytes),
        ElementType::U32 => typed::<u32>(width, height, bytes),
        ElementType::I32 => typed::<i32>(width, height, bytes),
        ElementType::U64 => typed::<u64>(width, height, bytes),
        ElementType::I64 => typed::<i64>(width, height, bytes),
        ElementType::F32 => typed::<f32>(width, height, bytes),
        ElementType::F64 => typed::<f64>(width, height, bytes),
    }
}

fn typed<T: Pixel>(width: usize, height: usize, bytes: &[u8]) -> Result<DynImage>
where
    DynImage: From<Image<T>>,
{
    // Caller memory carries no alignment guarantee
    let pixels: Vec<T> = bytes
        .chunks_exact(T::ELEMENT_TYPE.byte_size())
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect();
    Ok(Image::from_vec(width, height, pixels)?.into())
}

/// Build an owned image from a raw pointer and a numeric element tag.
///
/// # Safety
/// `ptr` must point to at least `width * height` readable elements of the
/// type named by `tag`.
pub unsafe fn build_from_raw(
    width: usize,
    height: usize,
    tag: u32,
    ptr: *const c_void,
) -> Result<DynImage> {
    let element_type = ElementType::from_tag(tag)?;
    if ptr.is_null() {
        return Err(Error::NullPointer("image buffer"));
    }
    let len = buffer_len(width, height, element_type)?;
    // SAFETY: non-null, and the caller guarantees `len` readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) };
    build(width, height, element_type, bytes)
}

/// Copy an image's pixels into a caller buffer of exactly the same byte length
pub fn extract(image: &DynImage, dst: &mut [u8]) -> Result<()> {
    let src = image.as_bytes();
    if dst.len() != src.len() {
        return Err(Error::BufferSize {
            expected: src.len(),
            actual: dst.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

/// Copy an image's pixels to a raw destination.
///
/// # Safety
/// `ptr` must point to at least `width * height` writable elements of the
/// image's element type.
pub unsafe fn extract_to_raw(image: &DynImage, ptr: *mut c_void) -> Result<()> {
    if ptr.is_null() {
        return Err(Error::NullPointer("image buffer"));
    }
    let len = image.as_bytes().len();
    // SAFETY: non-null, and the caller guarantees `len` writable bytes.
    let dst = unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), len) };
    extract(image, dst)
}
