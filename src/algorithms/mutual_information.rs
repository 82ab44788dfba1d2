//! Mattes mutual information between a fixed image and a transformed moving image.
//!
//! The fixed side uses a zero-order (box) window, the moving side a cubic
//! B-spline Parzen window, which keeps the metric continuous in the transform
//! parameters.

use crate::data::Image;
use crate::error::{Error, Result};
use crate::interpolation::bspline::bspline3;
use crate::interpolation::BSplineCoefficients;
use crate::transform::AffineTransform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MattesMutualInformation {
    pub bins: usize,
    /// Empty bins kept at both ends so the Parzen window never leaves the histogram
    pub padding: usize,
    /// Use every n-th fixed pixel along each axis
    pub sampling_stride: usize,
    pub min_valid_fraction: f64,
}

impl Default for MattesMutualInformation {
    fn default() -> Self {
        Self {
            bins: 32,
            padding: 2,
            sampling_stride: 1,
            min_valid_fraction: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Binning {
    min: f64,
    bin_width: f64,
    low: f64,
    high: f64,
}

impl Binning {
    fn new(min: f64, max: f64, bins: usize, padding: usize) -> Self {
        let usable = (bins - 2 * padding) as f64;
        Self {
            min,
            bin_width: (max - min) / usable,
            low: padding as f64,
            high: (bins - padding - 1) as f64,
        }
    }

    fn continuous_index(&self, value: f64) -> f64 {
        ((value - self.min) / self.bin_width + self.low).clamp(self.low, self.high)
    }
}

struct FixedSample {
    point: [f64; 2],
    bin: usize,
}

/// A fixed/moving pair prepared for repeated metric evaluation
pub struct MetricEvaluator {
    samples: Vec<FixedSample>,
    moving: BSplineCoefficients,
    moving_binning: Binning,
    bins: usize,
    min_valid: usize,
    bounds: [f64; 2],
}

fn intensity_range(image: &Image<f64>, role: &str) -> Result<(f64, f64)> {
    let (min, max) = image
        .as_slice()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return Err(Error::registration(format!("{role} image has non-finite intensities")));
    }
    if max - min <= f64::EPSILON * max.abs().max(1.0) {
        return Err(Error::registration(format!("{role} image has constant intensity")));
    }
    Ok((min, max))
}

impl MattesMutualInformation {
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    pub fn with_sampling_stride(mut self, stride: usize) -> Self {
        self.sampling_stride = stride;
        self
    }

    pub fn with_min_valid_fraction(mut self, fraction: f64) -> Self {
        self.min_valid_fraction = fraction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.bins < 2 * self.padding + 2 {
            return Err(Error::InvalidArgument(format!(
                "{} histogram bins leave no room next to {} padding bins",
                self.bins, self.padding
            )));
        }
        if self.padding < 2 {
            return Err(Error::InvalidArgument("Parzen window needs at least 2 padding bins".into()));
        }
        if self.sampling_stride == 0 {
            return Err(Error::InvalidArgument("sampling_stride must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_valid_fraction) {
            return Err(Error::InvalidArgument("min_valid_fraction must lie in [0, 1]".into()));
        }
        Ok(())
    }

    pub fn prepare(&self, fixed: &Image<f64>, moving: &Image<f64>) -> Result<MetricEvaluator> {
        self.validate()?;
        let (fixed_min, fixed_max) = intensity_range(fixed, "fixed")?;
        let (moving_min, moving_max) = intensity_range(moving, "moving")?;
        let fixed_binning = Binning::new(fixed_min, fixed_max, self.bins, self.padding);

        let mut samples = Vec::new();
        for y in (0..fixed.height()).step_by(self.sampling_stride) {
            for x in (0..fixed.width()).step_by(self.sampling_stride) {
                let value = fixed.get(x, y).unwrap_or(fixed_min);
                samples.push(FixedSample {
                    point: [x as f64, y as f64],
                    bin: fixed_binning.continuous_index(value).floor() as usize,
                });
            }
        }
        let min_valid = ((samples.len() as f64) * self.min_valid_fraction).ceil() as usize;

        Ok(MetricEvaluator {
            samples,
            moving: BSplineCoefficients::from_image(moving),
            moving_binning: Binning::new(moving_min, moving_max, self.bins, self.padding),
            bins: self.bins,
            min_valid: min_valid.max(1),
            bounds: [moving.width() as f64 - 1.0, moving.height() as f64 - 1.0],
        })
    }
}

impl MetricEvaluator {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Mutual information (nats) when `transform` maps fixed points into the moving image
    pub fn value(&self, transform: &AffineTransform) -> Result<f64> {
        let bins = self.bins;
        let mut joint = vec![0.0_f64; bins * bins];
        let mut valid = 0usize;

        for sample in &self.samples {
            let [mx, my] = transform.forward(sample.point);
            if !(0.0..=self.bounds[0]).contains(&mx) || !(0.0..=self.bounds[1]).contains(&my) {
                continue;
            }
            valid += 1;

            let index = self.moving_binning.continuous_index(self.moving.evaluate(mx, my));
            let base = index.floor() as usize;
            let row = &mut joint[sample.bin * bins..(sample.bin + 1) * bins];
            for bin in base - 1..=base + 2 {
                row[bin] += bspline3(index - bin as f64);
            }
        }

        if valid < self.min_valid {
            return Err(Error::registration(format!(
                "only {valid} of {} samples overlap the moving image",
                self.samples.len()
            )));
        }

        let total: f64 = joint.iter().sum();
        let mut fixed_marginal = vec![0.0_f64; bins];
        let mut moving_marginal = vec![0.0_f64; bins];
        for (f, row) in joint.chunks_exact(bins).enumerate() {
            for (m, &p) in row.iter().enumerate() {
                fixed_marginal[f] += p;
                moving_marginal[m] += p;
            }
        }

        let mut mi = 0.0;
        for (f, row) in joint.chunks_exact(bins).enumerate() {
            for (m, &p) in row.iter().enumerate() {
                if p > 0.0 {
                    mi += p / total * (p * total / (fixed_marginal[f] * moving_marginal[m])).ln();
                }
            }
        }
        Ok(mi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::blob_scene;

    fn scene() -> Image<f64> {
        blob_scene::<u8>(32, 32).to_f64()
    }

    #[test]
    fn alignment_maximises_information() {
        let image = scene();
        let evaluator = MattesMutualInformation::default().prepare(&image, &image).unwrap();
        let center = image.center();

        let aligned = evaluator.value(&AffineTransform::identity(center)).unwrap();
        let shifted = evaluator
            .value(&AffineTransform::translation([2.0, 1.0], center))
            .unwrap();
        assert!(aligned > shifted, "{aligned} <= {shifted}");
    }

    #[test]
    fn constant_image_is_rejected() {
        let flat = Image::<f64>::from_fn(8, 8, |_, _| 3.0);
        let err = MattesMutualInformation::default().prepare(&flat, &scene()).err();
        assert!(matches!(err, Some(Error::RegistrationFailed(_))));
    }

    #[test]
    fn disjoint_overlap_is_rejected() {
        let image = scene();
        let evaluator = MattesMutualInformation::default().prepare(&image, &image).unwrap();
        let far = AffineTransform::translation([30.0, 30.0], image.center());
        assert!(matches!(evaluator.value(&far), Err(Error::RegistrationFailed(_))));
    }

    #[test]
    fn stride_reduces_samples() {
        let image = scene();
        let evaluator = MattesMutualInformation::default()
            .with_sampling_stride(2)
            .prepare(&image, &image)
            .unwrap();
        assert_eq!(evaluator.sample_count(), 256);
    }

    #[test]
    fn invalid_settings_are_reported() {
        assert!(MattesMutualInformation::default().with_bins(5).validate().is_err());
        assert!(MattesMutualInformation::default().with_sampling_stride(0).validate().is_err());
        assert!(MattesMutualInformation::default().validate().is_ok());
    }
}
