// Registration backends: in-process step descent and the external elastix tool
pub mod elastix;
pub mod mutual_information;
pub mod step_descent;

pub use elastix::ElastixBackend;
pub use mutual_information::MattesMutualInformation;
pub use step_descent::{OptimizationReport, OptimizerState, StepDescentBackend, StopCondition};

use crate::config::RegistrationConfig;
use crate::data::ImageData;
use crate::error::{Error, Result};
use crate::transform::TransformClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a backend found, in its native fixed-to-moving sampling convention
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEstimate {
    pub class: TransformClass,
    /// 2 values for translation, 6 for affine
    pub parameters: Vec<f64>,
    /// Origin the estimate is expressed about
    pub center: [f64; 2],
    pub report: Option<OptimizationReport>,
}

/// A registration engine able to estimate a transform between two images
pub trait RegistrationBackend: Send + Sync {
    /// Returns the name of the backend
    fn name(&self) -> &str;

    /// Reconfigure from the registration section of the configuration
    fn configure(&mut self, _config: &RegistrationConfig) -> Result<()> {
        Ok(())
    }

    /// Estimate the map taking fixed pixel positions to moving pixel positions
    fn estimate(&self, fixed: &dyn ImageData, moving: &dyn ImageData, class: TransformClass) -> Result<BackendEstimate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    StepDescent,
    Elastix,
}

impl BackendKind {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::StepDescent),
            1 => Ok(Self::Elastix),
            _ => Err(Error::InvalidArgument(format!("unknown backend code {code}"))),
        }
    }

    pub fn create(self, config: &RegistrationConfig) -> Result<Box<dyn RegistrationBackend>> {
        let mut backend: Box<dyn RegistrationBackend> = match self {
            Self::StepDescent => Box::new(StepDescentBackend::new()),
            Self::Elastix => Box::new(ElastixBackend::new()),
        };
        backend.configure(config)?;
        Ok(backend)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepDescent => f.write_str("step-descent"),
            Self::Elastix => f.write_str("elastix"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "step-descent" | "native" => Ok(Self::StepDescent),
            "elastix" | "external" => Ok(Self::Elastix),
            _ => Err(Error::InvalidArgument(format!("unknown backend '{s}'"))),
        }
    }
}
