//! Cubic B-spline interpolation.
//!
//! Samples are turned into spline coefficients by the recursive prefilter of
//! Unser et al. with mirror boundaries, so that evaluating the spline at an
//! integer position returns the original sample.

use crate::data::{Image, Pixel};
use crate::interpolation::border::mirror_index;
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Axis};

const POLE: f64 = -0.267_949_192_431_122_7; // sqrt(3) - 2
const GAIN: f64 = 6.0; // (1 - z)(1 - 1/z)
const TOLERANCE: f64 = 1e-10;

/// Centered cubic B-spline kernel, support `(-2, 2)`
pub fn bspline3(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        2.0 / 3.0 - t * t + 0.5 * t * t * t
    } else if t < 2.0 {
        let u = 2.0 - t;
        u * u * u / 6.0
    } else {
        0.0
    }
}

/// The four kernel weights for the neighborhood `floor(s) - 1 ..= floor(s) + 2`
pub(crate) fn weights(s: f64) -> (isize, [f64; 4]) {
    let base = s.floor();
    let start = base as isize - 1;
    let mut w = [0.0; 4];
    for (k, wk) in w.iter_mut().enumerate() {
        *wk = bspline3(s - (base - 1.0 + k as f64));
    }
    (start, w)
}

fn initial_causal(c: &[f64]) -> f64 {
    let n = c.len();
    let horizon = (TOLERANCE.ln() / POLE.abs().ln()).ceil() as usize;
    if horizon < n {
        let mut zn = POLE;
        let mut sum = c[0];
        for &value in &c[1..horizon] {
            sum += zn * value;
            zn *= POLE;
        }
        sum
    } else {
        let iz = 1.0 / POLE;
        let mut zn = POLE;
        let mut z2n = POLE.powi(n as i32 - 1);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for &value in &c[1..n - 1] {
            sum += (zn + z2n) * value;
            zn *= POLE;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }
}

fn initial_anticausal(c: &[f64]) -> f64 {
    let n = c.len();
    (POLE / (POLE * POLE - 1.0)) * (POLE * c[n - 2] + c[n - 1])
}

/// In-place conversion of one line of samples to spline coefficients
pub fn prefilter_line(c: &mut [f64]) {
    let n = c.len();
    if n < 2 {
        return;
    }
    for value in c.iter_mut() {
        *value *= GAIN;
    }

    c[0] = initial_causal(c);
    for k in 1..n {
        c[k] += POLE * c[k - 1];
    }

    c[n - 1] = initial_anticausal(c);
    for k in (0..n - 1).rev() {
        c[k] = POLE * (c[k + 1] - c[k]);
    }
}

fn prefilter_rows(data: &mut Array2<f64>) {
    data.axis_iter_mut(Axis(0)).into_par_iter().for_each(|mut row| {
        let mut line = row.to_vec();
        prefilter_line(&mut line);
        row.assign(&Array1::from(line));
    });
}

/// Spline coefficients of an image, ready for evaluation anywhere in the plane
#[derive(Debug, Clone)]
pub struct BSplineCoefficients {
    coefficients: Array2<f64>,
}

impl BSplineCoefficients {
    pub fn from_image<T: Pixel>(image: &Image<T>) -> Self {
        Self::from_samples(image.array().mapv(Pixel::as_f64))
    }

    /// Prefilter `samples` (rows = y) along both axes
    pub fn from_samples(mut samples: Array2<f64>) -> Self {
        prefilter_rows(&mut samples);
        let mut columns = samples.reversed_axes().as_standard_layout().into_owned();
        prefilter_rows(&mut columns);
        let coefficients = columns.reversed_axes().as_standard_layout().into_owned();
        Self { coefficients }
    }

    pub fn width(&self) -> usize {
        self.coefficients.ncols()
    }

    pub fn height(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Spline value at `(x, y)`; the 4x4 neighborhood is mirrored at the borders
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return 0.0;
        }
        let (x0, wx) = weights(x);
        let (y0, wy) = weights(y);

        let mut columns = [0usize; 4];
        for (k, column) in columns.iter_mut().enumerate() {
            *column = mirror_index(x0 + k as isize, width);
        }

        let mut value = 0.0;
        for (j, &weight_y) in wy.iter().enumerate() {
            let row = self.coefficients.row(mirror_index(y0 + j as isize, height));
            let mut acc = 0.0;
            for (&column, &weight_x) in columns.iter().zip(&wx) {
                acc += weight_x * row[column];
            }
            value += weight_y * acc;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_partitions_unity() {
        for s in [0.0, 0.25, 0.5, 0.9, 3.3] {
            let (_, w) = weights(s);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert_eq!(bspline3(2.0), 0.0);
        assert!((bspline3(0.0) - 2.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn interpolates_samples_exactly() {
        let image = Image::<f64>::from_fn(9, 7, |x, y| ((x * 7 + y * 13) % 11) as f64 * 3.0);
        let spline = BSplineCoefficients::from_image(&image);
        for y in 0..7 {
            for x in 0..9 {
                let expected = image.get(x, y).unwrap();
                let got = spline.evaluate(x as f64, y as f64);
                assert!((got - expected).abs() < 1e-6, "({x},{y}): {got} vs {expected}");
            }
        }
    }

    #[test]
    fn long_lines_use_truncated_initialisation() {
        let original: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        let samples = Array2::from_shape_vec((1, 64), original.clone()).unwrap();
        let spline = BSplineCoefficients::from_samples(samples);
        for (i, expected) in original.iter().enumerate() {
            assert!((spline.evaluate(i as f64, 0.0) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn constant_image_stays_constant_between_samples() {
        let image = Image::<u8>::from_fn(5, 5, |_, _| 42);
        let spline = BSplineCoefficients::from_image(&image);
        assert!((spline.evaluate(1.37, 2.81) - 42.0).abs() < 1e-9);
        assert!((spline.evaluate(-0.4, 4.3) - 42.0).abs() < 1e-9);
    }
}
