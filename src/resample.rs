use crate::config::ResampleConfig;
use crate::data::{Image, Pixel};
use crate::error::Result;
use crate::interpolation::border::round_inside;
use crate::interpolation::BSplineCoefficients;
use crate::logging::ResampleSpan;
use crate::transform::{AffineTransform, InterpolationMode};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

/// Applies an affine transform to an image by pulling every destination pixel
/// from `source` at `transform⁻¹(x, y)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resampler {
    default_value: f64,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler {
    pub fn new() -> Self {
        Self { default_value: 0.0 }
    }

    pub fn from_config(config: &ResampleConfig) -> Self {
        Self::new().with_default_value(config.default_pixel_value)
    }

    /// Value written where the mapped point falls outside the source
    pub fn with_default_value(mut self, value: f64) -> Self {
        self.default_value = value;
        self
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn resample<T: Pixel>(
        &self,
        source: &Image<T>,
        transform: &AffineTransform,
        mode: InterpolationMode,
    ) -> Result<Image<T>> {
        let inverse = transform.inverse()?;
        let (width, height) = source.dimensions();
        let fill = T::saturate_from(self.default_value);
        let mut output = Array2::from_elem((height, width), fill);

        let span = ResampleSpan::new(mode, (width, height));
        let _enter = span.enter();

        match mode {
            InterpolationMode::NearestNeighbor => {
                let pixels = source.view();
                fill_rows(&mut output, &inverse, width, height, |sx, sy| {
                    let x = round_inside(sx, width)?;
                    let y = round_inside(sy, height)?;
                    Some(pixels[(y, x)])
                });
            }
            InterpolationMode::CubicBSpline => {
                let spline = BSplineCoefficients::from_image(source);
                fill_rows(&mut output, &inverse, width, height, |sx, sy| {
                    round_inside(sx, width)?;
                    round_inside(sy, height)?;
                    Some(T::saturate_from(spline.evaluate(sx, sy)))
                });
            }
        }

        span.record_completion();
        Ok(Image::from_array(output))
    }
}

fn fill_rows<T, F>(output: &mut Array2<T>, inverse: &AffineTransform, width: usize, height: usize, sample: F)
where
    T: Pixel,
    F: Fn(f64, f64) -> Option<T> + Sync,
{
    debug_assert_eq!(output.dim(), (height, width));
    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                let [sx, sy] = inverse.forward([x as f64, y as f64]);
                if let Some(value) = sample(sx, sy) {
                    *pixel = value;
                }
            }
        });
}

/// Resample with the default fill value of zero
pub fn resample<T: Pixel>(
    source: &Image<T>,
    transform: &AffineTransform,
    mode: InterpolationMode,
) -> Result<Image<T>> {
    Resampler::new().resample(source, transform, mode)
}
