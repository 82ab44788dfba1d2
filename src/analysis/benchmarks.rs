use crate::algorithms::RegistrationBackend;
use crate::analysis::metrics::translation_error;
use crate::config::BenchmarkConfig;
use crate::data::synthetic::{add_gaussian_noise, blob_scene};
use crate::data::Image;
use crate::error::Result;
use crate::registration::ImageRegistration;
use crate::resample::resample;
use crate::transform::{AffineTransform, InterpolationMode, TransformClass};
use chrono::{DateTime, Utc};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkCase {
    pub shift: (f64, f64),
    pub estimated: Option<(f64, f64)>,
    pub error_px: Option<f64>,
    pub within_threshold: bool,
    pub processing_time_ms: f64,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSummary {
    pub backend: String,
    pub cases: Vec<BenchmarkCase>,
    pub mean_error_px: Option<f64>,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub image_size: usize,
    pub noise_sigma: f64,
    pub seed: u64,
    pub backends: Vec<BackendSummary>,
}

impl BenchmarkReport {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Registers synthetic pairs with known translations and scores each backend
pub struct BenchmarkRunner {
    pub engines: Vec<ImageRegistration>,
    config: BenchmarkConfig,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new(BenchmarkConfig::default())
    }
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self {
            engines: Vec::new(),
            config,
        }
    }

    pub fn add_backend(&mut self, backend: Box<dyn RegistrationBackend>) {
        self.engines.push(ImageRegistration::new().with_backend(backend));
    }

    /// `(fixed, moving, shift)` triples: fixed is moving shifted by `shift`, plus noise
    pub fn cases(&self) -> Result<Vec<(Image<f32>, Image<f32>, (f64, f64))>> {
        let size = self.config.image_size;
        let moving = blob_scene::<f32>(size, size);
        let center = moving.center();

        self.config
            .shifts
            .iter()
            .enumerate()
            .map(|(i, &(dx, dy))| {
                let shifted = resample(
                    &moving,
                    &AffineTransform::translation([dx, dy], center),
                    InterpolationMode::CubicBSpline,
                )?;
                let fixed = if self.config.noise_sigma > 0.0 {
                    add_gaussian_noise(&shifted, self.config.noise_sigma, self.config.seed + i as u64)?
                } else {
                    shifted
                };
                Ok((fixed, moving.clone(), (dx, dy)))
            })
            .collect()
    }

    pub fn run_benchmark(&self) -> Result<BenchmarkReport> {
        let cases = self.cases()?;
        let session_id = Uuid::new_v4();
        tracing::info!(
            %session_id,
            backends = self.engines.len(),
            cases = cases.len(),
            "Starting benchmark"
        );

        let backends = self
            .engines
            .iter()
            .map(|engine| self.run_backend(engine, &cases))
            .collect();

        Ok(BenchmarkReport {
            session_id,
            timestamp: Utc::now(),
            image_size: self.config.image_size,
            noise_sigma: self.config.noise_sigma,
            seed: self.config.seed,
            backends,
        })
    }

    fn run_backend(&self, engine: &ImageRegistration, cases: &[(Image<f32>, Image<f32>, (f64, f64))]) -> BackendSummary {
        let mut results = Vec::with_capacity(cases.len());

        for (fixed, moving, shift) in cases {
            let start = Instant::now();
            let outcome = engine.register(fixed, moving, TransformClass::Translation);
            let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

            let case = match outcome {
                Ok(parameters) => {
                    let error = translation_error(&parameters, [shift.0, shift.1]);
                    let [tx, ty] = parameters.translation();
                    BenchmarkCase {
                        shift: *shift,
                        estimated: Some((tx, ty)),
                        error_px: Some(error),
                        within_threshold: error <= self.config.accuracy_threshold_px,
                        processing_time_ms,
                        failure: None,
                    }
                }
                Err(e) => {
                    tracing::error!(backend = engine.backend_name(), ?shift, error = %e, "Backend failed");
                    BenchmarkCase {
                        shift: *shift,
                        estimated: None,
                        error_px: None,
                        within_threshold: false,
                        processing_time_ms,
                        failure: Some(e.to_string()),
                    }
                }
            };
            results.push(case);
        }

        let errors: Vec<f64> = results.iter().filter_map(|c| c.error_px).collect();
        let passed = results.iter().filter(|c| c.within_threshold).count();
        BackendSummary {
            backend: engine.backend_name().to_string(),
            mean_error_px: (!errors.is_empty()).then(|| errors.iter().sum::<f64>() / errors.len() as f64),
            success_rate: if results.is_empty() {
                0.0
            } else {
                passed as f64 / results.len() as f64
            },
            cases: results,
        }
    }
}
