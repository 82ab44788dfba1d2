use crate::data::{Image, Pixel};
use crate::error::{Error, Result};
use crate::transform::ParameterVector;

/// Euclidean distance between the estimated and true translation, in pixels
pub fn translation_error(estimated: &ParameterVector, ground_truth: [f64; 2]) -> f64 {
    let [tx, ty] = estimated.translation();
    (tx - ground_truth[0]).hypot(ty - ground_truth[1])
}

/// Largest absolute deviation of the linear part from the true one
pub fn linear_error(estimated: &ParameterVector, ground_truth: [f64; 4]) -> f64 {
    estimated
        .linear()
        .iter()
        .zip(ground_truth)
        .map(|(e, t)| (e - t).abs())
        .fold(0.0, f64::max)
}

fn check_dimensions<T: Pixel>(a: &Image<T>, b: &Image<T>) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(Error::DimensionMismatch {
            fixed: a.dimensions(),
            moving: b.dimensions(),
        });
    }
    Ok(())
}

pub fn max_abs_difference<T: Pixel>(a: &Image<T>, b: &Image<T>) -> Result<f64> {
    check_dimensions(a, b)?;
    Ok(a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x.as_f64() - y.as_f64()).abs())
        .fold(0.0, f64::max))
}

/// Mean absolute difference over the pixels where `mask` holds
pub fn mean_abs_difference<T: Pixel>(a: &Image<T>, b: &Image<T>, mask: impl Fn(usize, usize) -> bool) -> Result<f64> {
    check_dimensions(a, b)?;
    let (mut sum, mut count) = (0.0, 0usize);
    for ((y, x), va) in a.view().indexed_iter() {
        if mask(x, y) {
            sum += (va.as_f64() - b.view()[(y, x)].as_f64()).abs();
            count += 1;
        }
    }
    if count == 0 {
        return Err(Error::InvalidArgument("mask selects no pixels".into()));
    }
    Ok(sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_error_is_euclidean() {
        let estimated = ParameterVector::from_translation(3.0, 4.0);
        assert_eq!(translation_error(&estimated, [0.0, 0.0]), 5.0);
        assert_eq!(linear_error(&estimated, [1.0, 0.0, 0.0, 1.5]), 0.5);
    }

    #[test]
    fn image_differences() {
        let a = Image::<u8>::from_fn(3, 2, |x, _| x as u8);
        let b = Image::<u8>::from_fn(3, 2, |x, y| (x + y * 2) as u8);
        assert_eq!(max_abs_difference(&a, &b).unwrap(), 2.0);
        assert_eq!(mean_abs_difference(&a, &b, |_, y| y == 0).unwrap(), 0.0);
        assert!(mean_abs_difference(&a, &b, |_, _| false).is_err());
        assert!(max_abs_difference(&a, &Image::zeros(2, 2)).is_err());
    }
}
