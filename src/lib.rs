//! Intensity-based 2-D image registration and affine resampling.
//!
//! Images of any of ten primitive element types are registered with a
//! translation or affine model, either in process (Mattes mutual information
//! with regular step gradient descent) or through the external `elastix`
//! tool, and resampled through nearest-neighbor or cubic B-spline interpolation.

pub mod algorithms;
pub mod analysis;
pub mod bindings;
pub mod config;
pub mod data;
pub mod error;
pub mod interpolation;
pub mod logging;
pub mod registration;
pub mod resample;
pub mod transform;
pub mod utils;

pub use algorithms::{BackendKind, ElastixBackend, RegistrationBackend, StepDescentBackend};
pub use data::{DynImage, ElementType, Image, Pixel};
pub use error::{Error, Result};
pub use registration::{ImageRegistration, RegistrationResult};
pub use resample::Resampler;
pub use transform::{AffineTransform, InterpolationMode, ParameterVector, TransformClass};
