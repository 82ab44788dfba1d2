use crate::data::element::Pixel;
use crate::data::image::Image;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Isotropic Gaussian bump used to build smooth test scenes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub center: [f64; 2],
    pub sigma: f64,
    pub amplitude: f64,
}

impl Blob {
    pub fn new(cx: f64, cy: f64, sigma: f64, amplitude: f64) -> Self {
        Self {
            center: [cx, cy],
            sigma,
            amplitude,
        }
    }

    fn value_at(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.center[0];
        let dy = y - self.center[1];
        self.amplitude * (-(dx * dx + dy * dy) / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Square checkerboard alternating between `low` and `high`, starting with `high`
/// in the top-left cell
pub fn checkerboard<T: Pixel>(width: usize, height: usize, cell: usize, low: f64, high: f64) -> Image<T> {
    let cell = cell.max(1);
    let (low, high) = (T::saturate_from(low), T::saturate_from(high));
    Image::from_fn(width, height, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            high
        } else {
            low
        }
    })
}

/// Sum of Gaussian blobs over a constant background
pub fn gaussian_blobs<T: Pixel>(width: usize, height: usize, background: f64, blobs: &[Blob]) -> Image<T> {
    Image::from_fn(width, height, |x, y| {
        let value = blobs
            .iter()
            .fold(background, |acc, blob| acc + blob.value_at(x as f64, y as f64));
        T::saturate_from(value)
    })
}

/// Smooth scene with no point symmetry, scaled to the image size.
///
/// Intensities stay within `[10, 240]` so every integer type can hold them.
pub fn blob_scene<T: Pixel>(width: usize, height: usize) -> Image<T> {
    let (w, h) = (width as f64, height as f64);
    let scale = w.min(h);
    let blobs = [
        Blob::new(0.30 * w, 0.35 * h, 0.12 * scale, 150.0),
        Blob::new(0.68 * w, 0.60 * h, 0.09 * scale, 110.0),
        Blob::new(0.45 * w, 0.78 * h, 0.06 * scale, 70.0),
        Blob::new(0.80 * w, 0.22 * h, 0.05 * scale, -60.0),
    ];
    let image: Image<f64> = gaussian_blobs(width, height, 70.0, &blobs);
    Image::from_fn(width, height, |x, y| {
        let value = image.get(x, y).unwrap_or(0.0);
        T::saturate_from(value.clamp(10.0, 240.0))
    })
}

/// Add zero-mean Gaussian noise with a fixed seed; integer results saturate
pub fn add_gaussian_noise<T: Pixel>(image: &Image<T>, sigma: f64, seed: u64) -> Result<Image<T>> {
    if sigma == 0.0 {
        return Ok(image.clone());
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| Error::InvalidArgument(format!("noise sigma {sigma}: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let noisy = image
        .as_slice()
        .iter()
        .map(|&p| T::saturate_from(p.as_f64() + normal.sample(&mut rng)))
        .collect();
    Image::from_vec(image.width(), image.height(), noisy)
}
