pub mod affine;
pub mod parameters;

pub use affine::{AffineTransform, TransformRecord};
pub use parameters::{marshal, parse_parameter_values, InterpolationMode, ParameterVector, TransformClass};
