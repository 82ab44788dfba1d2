//! Registration engine.
//!
//! Validates the image pair, runs the selected backend, and converts its
//! fixed-to-moving sampling estimate into the transform that carries the moving
//! image onto the fixed one, expressed about the image center.

use crate::algorithms::{OptimizationReport, RegistrationBackend, StepDescentBackend};
use crate::config::RegistrationConfig;
use crate::data::{image_center, DynImage, Image, ImageData, Pixel};
use crate::error::{Error, Result};
use crate::logging::{get_correlation_id, RegistrationSpan};
use crate::transform::{marshal, AffineTransform, ParameterVector, TransformClass};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResult {
    /// Maps moving points onto fixed points, `[m00, m01, m10, m11, tx, ty]`
    pub parameters: ParameterVector,
    pub origin: [f64; 2],
    pub backend: String,
    pub report: Option<OptimizationReport>,
}

impl RegistrationResult {
    pub fn transform(&self) -> AffineTransform {
        AffineTransform::from_parameters(&self.parameters, self.origin)
    }
}

pub struct ImageRegistration {
    backend: Box<dyn RegistrationBackend>,
}

impl Default for ImageRegistration {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRegistration {
    /// In-process step descent with default settings
    pub fn new() -> Self {
        Self {
            backend: Box::new(StepDescentBackend::new()),
        }
    }

    pub fn from_config(config: &RegistrationConfig) -> Result<Self> {
        Ok(Self {
            backend: config.backend.create(config)?,
        })
    }

    pub fn with_backend(mut self, backend: Box<dyn RegistrationBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn register<T: Pixel>(
        &self,
        fixed: &Image<T>,
        moving: &Image<T>,
        class: TransformClass,
    ) -> Result<ParameterVector> {
        Ok(self.register_detailed(fixed, moving, class)?.parameters)
    }

    pub fn register_detailed<T: Pixel>(
        &self,
        fixed: &Image<T>,
        moving: &Image<T>,
        class: TransformClass,
    ) -> Result<RegistrationResult> {
        self.run(fixed, moving, class)
    }

    /// Register images whose element type is only known at runtime; both must share it
    pub fn register_dyn(&self, fixed: &DynImage, moving: &DynImage, class: TransformClass) -> Result<RegistrationResult> {
        if fixed.element_type() != moving.element_type() {
            return Err(Error::ElementTypeMismatch {
                fixed: fixed.element_type(),
                moving: moving.element_type(),
            });
        }
        self.run(fixed.as_data(), moving.as_data(), class)
    }

    fn run(&self, fixed: &dyn ImageData, moving: &dyn ImageData, class: TransformClass) -> Result<RegistrationResult> {
        let size = (fixed.width(), fixed.height());
        if size != (moving.width(), moving.height()) {
            return Err(Error::DimensionMismatch {
                fixed: size,
                moving: (moving.width(), moving.height()),
            });
        }

        let correlation_id = get_correlation_id().unwrap_or_else(Uuid::new_v4);
        let span = RegistrationSpan::new(self.backend.name(), class, size, Some(correlation_id));
        let _enter = span.enter();

        match self.estimate(fixed, moving, class, size) {
            Ok(result) => {
                if let Some(report) = &result.report {
                    span.record_optimizer(report.iterations, report.final_value);
                }
                span.record_result(result.parameters.as_array());
                Ok(result)
            }
            Err(e) => {
                span.record_failure(&e);
                Err(e)
            }
        }
    }

    fn estimate(
        &self,
        fixed: &dyn ImageData,
        moving: &dyn ImageData,
        class: TransformClass,
        size: (usize, usize),
    ) -> Result<RegistrationResult> {
        let estimate = self.backend.estimate(fixed, moving, class)?;
        let native = marshal(class, &estimate.parameters)?;

        let sampling = AffineTransform::from_parameters(&native, estimate.center);
        let inverse = sampling.inverse().map_err(|e| match e {
            Error::SingularTransform { determinant } => Error::registration(format!(
                "{} produced a singular estimate (determinant {determinant})",
                self.backend.name()
            )),
            other => other,
        })?;

        let origin = image_center(size.0, size.1);
        Ok(RegistrationResult {
            parameters: inverse.with_origin(origin).to_parameters(),
            origin,
            backend: self.backend.name().to_string(),
            report: estimate.report,
        })
    }
}
