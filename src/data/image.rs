use crate::data::element::{ElementType, Pixel};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// Owned single-channel image, row-major, `height` rows of `width` pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T: Pixel> {
    data: Array2<T>,
}

impl<T: Pixel> Image<T> {
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| Error::InvalidArgument(format!("image size {width}x{height} overflows")))?;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected: expected * T::ELEMENT_TYPE.byte_size(),
                actual: data.len() * T::ELEMENT_TYPE.byte_size(),
            });
        }
        let data = Array2::from_shape_vec((height, width), data)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        Ok(Self { data })
    }

    /// Copy `width * height` pixels out of a caller-owned slice
    pub fn from_slice(width: usize, height: usize, pixels: &[T]) -> Result<Self> {
        Self::from_vec(width, height, pixels.to_vec())
    }

    pub fn from_array(data: Array2<T>) -> Self {
        // Normalize to standard layout so the raw slice is always row-major
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self { data }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        Self {
            data: Array2::from_shape_fn((height, width), |(y, x)| f(x, y)),
        }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: Array2::from_elem((height, width), T::zero()),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        self.data.get((y, x)).copied()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn array(&self) -> &Array2<T> {
        &self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    pub fn as_slice(&self) -> &[T] {
        // Standard layout is maintained by every constructor
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    /// Write the pixels back into a caller-owned slice of the same length
    pub fn copy_into(&self, dst: &mut [T]) -> Result<()> {
        if dst.len() != self.len() {
            return Err(Error::BufferSize {
                expected: self.len() * T::ELEMENT_TYPE.byte_size(),
                actual: dst.len() * T::ELEMENT_TYPE.byte_size(),
            });
        }
        dst.copy_from_slice(self.as_slice());
        Ok(())
    }

    pub fn to_f64(&self) -> Image<f64> {
        Image {
            data: self.data.mapv(Pixel::as_f64),
        }
    }

    /// Geometric center in pixel coordinates, the default rotation origin
    pub fn center(&self) -> [f64; 2] {
        image_center(self.width(), self.height())
    }
}

pub fn image_center(width: usize, height: usize) -> [f64; 2] {
    [
        (width as f64 - 1.0) / 2.0,
        (height as f64 - 1.0) / 2.0,
    ]
}

/// Type-erased read access used by registration backends
pub trait ImageData: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn element_type(&self) -> ElementType;
    fn as_bytes(&self) -> &[u8];
    fn to_f64(&self) -> Image<f64>;
}

impl<T: Pixel> ImageData for Image<T> {
    fn width(&self) -> usize {
        Image::width(self)
    }

    fn height(&self) -> usize {
        Image::height(self)
    }

    fn element_type(&self) -> ElementType {
        T::ELEMENT_TYPE
    }

    fn as_bytes(&self) -> &[u8] {
        Image::as_bytes(self)
    }

    fn to_f64(&self) -> Image<f64> {
        Image::to_f64(self)
    }
}

/// An image whose element type is only known at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum DynImage {
    U8(Image<u8>),
    I8(Image<i8>),
    U16(Image<u16>),
    I16(Image<i16>),
    U32(Image<u32>),
    I32(Image<i32>),
    U64(Image<u64>),
    I64(Image<i64>),
    F32(Image<f32>),
    F64(Image<f64>),
}

/// Run `$body` with `$image` bound to the typed image inside a `DynImage`
#[macro_export]
macro_rules! with_dyn_image {
    ($dyn_image:expr, $image:ident => $body:expr) => {
        match $dyn_image {
            $crate::data::DynImage::U8($image) => $body,
            $crate::data::DynImage::I8($image) => $body,
            $crate::data::DynImage::U16($image) => $body,
            $crate::data::DynImage::I16($image) => $body,
            $crate::data::DynImage::U32($image) => $body,
            $crate::data::DynImage::I32($image) => $body,
            $crate::data::DynImage::U64($image) => $body,
            $crate::data::DynImage::I64($image) => $body,
            $crate::data::DynImage::F32($image) => $body,
            $crate::data::DynImage::F64($image) => $body,
        }
    };
}

impl DynImage {
    pub fn element_type(&self) -> ElementType {
        with_dyn_image!(self, image => ImageData::element_type(image))
    }

    pub fn width(&self) -> usize {
        with_dyn_image!(self, image => image.width())
    }

    pub fn height(&self) -> usize {
        with_dyn_image!(self, image => image.height())
    }

    pub fn as_bytes(&self) -> &[u8] {
        with_dyn_image!(self, image => image.as_bytes())
    }

    pub fn as_data(&self) -> &dyn ImageData {
        with_dyn_image!(self, image => image as &dyn ImageData)
    }
}

macro_rules! impl_from_image {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Image<$t>> for DynImage {
                fn from(image: Image<$t>) -> Self {
                    DynImage::$variant(image)
                }
            }
        )*
    };
}

impl_from_image! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_length() {
        let err = Image::<u16>::from_vec(3, 2, vec![0; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferSize {
                expected: 12,
                actual: 10
            }
        ));
    }

    #[test]
    fn pixels_are_row_major() {
        let image = Image::<u8>::from_vec(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get(2, 0), Some(3));
        assert_eq!(image.get(0, 1), Some(4));
        assert_eq!(image.get(3, 0), None);
    }

    #[test]
    fn transposed_arrays_are_normalized() {
        let array = Array2::from_shape_vec((2, 3), vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let image = Image::from_array(array.reversed_axes());
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.as_slice(), &[1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn copy_into_rejects_short_destination() {
        let image = Image::<i32>::zeros(4, 4);
        let mut dst = vec![0i32; 15];
        assert!(image.copy_into(&mut dst).is_err());
    }

    #[test]
    fn dyn_image_reports_element_type() {
        let dyn_image: DynImage = Image::<f32>::zeros(2, 2).into();
        assert_eq!(dyn_image.element_type(), ElementType::F32);
        assert_eq!(dyn_image.as_bytes().len(), 16);
        assert_eq!(dyn_image.as_data().width(), 2);
    }

    #[test]
    fn center_is_midpoint_of_pixel_grid() {
        assert_eq!(image_center(8, 8), [3.5, 3.5]);
        assert_eq!(image_center(5, 3), [2.0, 1.0]);
    }
}
