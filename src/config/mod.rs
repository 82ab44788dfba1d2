use crate::algorithms::elastix::ParameterMap;
use crate::algorithms::{BackendKind, MattesMutualInformation};
use crate::logging::LoggingConfig;
use crate::transform::InterpolationMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registration: RegistrationConfig,
    pub resample: ResampleConfig,
    pub benchmark: BenchmarkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub backend: BackendKind,
    pub optimizer: OptimizerConfig,
    pub metric: MattesMutualInformation,
    pub elastix: ElastixConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_step: f64,
    pub min_step: f64,
    pub relaxation: f64,
    pub max_iterations: usize,
    pub gradient_tolerance: f64,
    pub finite_difference_step: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElastixConfig {
    pub executable: PathBuf,
    /// File the tool writes the final transform to, inside its output directory
    pub result_file: String,
    /// Merged over the tool's default parameter map
    pub parameter_overrides: ParameterMap,
    /// Parent of the per-call scratch directories (system temp dir if unset)
    pub working_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub default_pixel_value: f64,
    pub interpolation: InterpolationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub image_size: usize,
    pub shifts: Vec<(f64, f64)>,
    pub noise_sigma: f64,
    pub seed: u64,
    pub accuracy_threshold_px: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_step: 4.0,
            min_step: 0.01,
            relaxation: 0.5,
            max_iterations: 200,
            gradient_tolerance: 1e-6,
            finite_difference_step: 0.05,
        }
    }
}

impl Default for ElastixConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("elastix"),
            result_file: "TransformParameters.0.txt".to_string(),
            parameter_overrides: ParameterMap::new(),
            working_root: None,
        }
    }
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            default_pixel_value: 0.0,
            interpolation: InterpolationMode::CubicBSpline,
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            image_size: 64,
            shifts: vec![(1.5, -0.5), (3.0, 2.0), (-2.25, 4.0), (-5.0, -3.5)],
            noise_sigma: 2.0,
            seed: 42,
            accuracy_threshold_px: 0.5,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> anyhow::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let optimizer = &self.registration.optimizer;

        if optimizer.min_step <= 0.0 {
            errors.push("Optimizer min_step must be positive".to_string());
        }

        if optimizer.max_step < optimizer.min_step {
            errors.push("Optimizer max_step must not be below min_step".to_string());
        }

        if !(optimizer.relaxation > 0.0 && optimizer.relaxation < 1.0) {
            errors.push("Optimizer relaxation must lie in (0, 1)".to_string());
        }

        if optimizer.finite_difference_step <= 0.0 {
            errors.push("Optimizer finite_difference_step must be positive".to_string());
        }

        if let Err(e) = self.registration.metric.validate() {
            errors.push(format!("Metric: {e}"));
        }

        if self.registration.elastix.result_file.trim().is_empty() {
            errors.push("Elastix result_file must not be empty".to_string());
        }

        if self.benchmark.image_size < 16 {
            errors.push("Benchmark image_size must be at least 16".to_string());
        }

        if self.benchmark.noise_sigma < 0.0 {
            errors.push("Benchmark noise_sigma must be non-negative".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

pub fn load_config_or_default(config_path: Option<&str>) -> Config {
    match config_path {
        Some(path) => match Config::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    tracing::warn!(
                        path,
                        errors = %errors.join("; "),
                        "Configuration validation failed, using defaults"
                    );
                    Config::default()
                } else {
                    config
                }
            }
            Err(e) => {
                tracing::warn!(path, error = %format!("{e:#}"), "Failed to load configuration, using defaults");
                Config::default()
            }
        },
        None => Config::default(),
    }
}
