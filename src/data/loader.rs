use crate::data::image::{DynImage, Image};
use crate::utils::metaimage;
use anyhow::{bail, Context};
use image::{DynamicImage, ImageBuffer, Luma};
use std::path::Path;

fn is_metaimage(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mhd"))
}

/// Load a single-channel image.
///
/// `.mhd` keeps its stored element type. Other formats go through the `image`
/// crate: 8-bit gray stays `u8`, 16-bit stays `u16`, float stays `f32`, and
/// color is converted to luma.
pub fn load_image<P: AsRef<Path>>(path: P) -> anyhow::Result<DynImage> {
    let path = path.as_ref();
    if is_metaimage(path) {
        return metaimage::read(path).with_context(|| format!("reading {}", path.display()));
    }

    let decoded = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let image: DynImage = match decoded {
        DynamicImage::ImageLuma8(gray) => Image::from_vec(width, height, gray.into_raw())?.into(),
        DynamicImage::ImageLuma16(gray) => Image::from_vec(width, height, gray.into_raw())?.into(),
        DynamicImage::ImageLumaA16(_) | DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
            Image::from_vec(width, height, decoded.to_luma16().into_raw())?.into()
        }
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            Image::from_vec(width, height, decoded.to_luma32f().into_raw())?.into()
        }
        other => Image::from_vec(width, height, other.to_luma8().into_raw())?.into(),
    };
    Ok(image)
}

/// Save an image; `u8`/`u16` may use any format the `image` crate encodes,
/// every element type may use `.mhd`
pub fn save_image<P: AsRef<Path>>(image: &DynImage, path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if is_metaimage(path) {
        metaimage::write(path, image.as_data()).with_context(|| format!("writing {}", path.display()))?;
        return Ok(());
    }

    let (width, height) = (image.width() as u32, image.height() as u32);
    match image {
        DynImage::U8(typed) => {
            let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, typed.as_slice().to_vec())
                    .context("pixel buffer does not match image size")?;
            buffer.save(path)?;
        }
        DynImage::U16(typed) => {
            let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(width, height, typed.as_slice().to_vec())
                    .context("pixel buffer does not match image size")?;
            buffer.save(path)?;
        }
        other => bail!(
            "{} images can only be saved as .mhd, got {}",
            other.element_type(),
            path.display()
        ),
    }
    Ok(())
}

pub fn validate_image_size(image: &DynImage, min_size: usize) -> anyhow::Result<()> {
    if image.width() < min_size || image.height() < min_size {
        bail!(
            "Image too small: {}x{}, minimum: {}x{}",
            image.width(),
            image.height(),
            min_size,
            min_size
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ElementType;
    use tempfile::tempdir;

    #[test]
    fn png_round_trip_keeps_u16() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("depth.png");
        let image: DynImage = Image::<u16>::from_fn(5, 4, |x, y| (x * 1000 + y) as u16).into();

        save_image(&image, &path).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.element_type(), ElementType::U16);
        assert_eq!(loaded, image);
    }

    #[test]
    fn float_images_need_metaimage() {
        let dir = tempdir().unwrap();
        let image: DynImage = Image::<f64>::zeros(2, 2).into();

        assert!(save_image(&image, dir.path().join("out.png")).is_err());
        save_image(&image, dir.path().join("out.mhd")).unwrap();
        assert_eq!(load_image(dir.path().join("out.mhd")).unwrap(), image);
    }

    #[test]
    fn size_validation() {
        let image: DynImage = Image::<u8>::zeros(8, 4).into();
        assert!(validate_image_size(&image, 4).is_ok());
        assert!(validate_image_size(&image, 5).is_err());
    }
}
