use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Six affine parameters laid out as `[m00, m01, m10, m11, tx, ty]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(pub [f64; 6]);

impl ParameterVector {
    pub const LEN: usize = 6;

    pub fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }

    pub fn from_translation(tx: f64, ty: f64) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let values: [f64; 6] = values.try_into().map_err(|_| Error::InvalidParameterCount {
            expected: Self::LEN,
            actual: values.len(),
        })?;
        Ok(Self(values))
    }

    pub fn linear(&self) -> [f64; 4] {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }

    pub fn translation(&self) -> [f64; 2] {
        [self.0[4], self.0[5]]
    }

    pub fn as_array(&self) -> &[f64; 6] {
        &self.0
    }
}

impl Default for ParameterVector {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[f64; 6]> for ParameterVector {
    fn from(values: [f64; 6]) -> Self {
        Self(values)
    }
}

/// Degrees of freedom a registration estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformClass {
    Translation,
    Affine,
}

impl TransformClass {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Translation),
            1 => Ok(Self::Affine),
            _ => Err(Error::InvalidArgument(format!("unknown transform class code {code}"))),
        }
    }

    pub fn parameter_count(self) -> usize {
        match self {
            Self::Translation => 2,
            Self::Affine => 6,
        }
    }

    /// Name of the external tool's default parameter map for this class
    pub fn preset_name(self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Affine => "affine",
        }
    }
}

impl fmt::Display for TransformClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.preset_name())
    }
}

impl FromStr for TransformClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "translation" => Ok(Self::Translation),
            "affine" => Ok(Self::Affine),
            _ => Err(Error::InvalidArgument(format!("unknown transform class '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    NearestNeighbor,
    #[default]
    CubicBSpline,
}

impl InterpolationMode {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::NearestNeighbor),
            1 => Ok(Self::CubicBSpline),
            _ => Err(Error::InvalidArgument(format!("unknown interpolation mode code {code}"))),
        }
    }
}

impl FromStr for InterpolationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "nearest_neighbor" | "nn" => Ok(Self::NearestNeighbor),
            "bspline" | "cubic_bspline" | "cubic" => Ok(Self::CubicBSpline),
            _ => Err(Error::InvalidArgument(format!("unknown interpolation mode '{s}'"))),
        }
    }
}

/// Place a backend's native estimate into the six-slot layout.
///
/// Translation estimates carry `[tx, ty]` and get an identity linear part;
/// affine estimates already carry all six values.
pub fn marshal(class: TransformClass, native: &[f64]) -> Result<ParameterVector> {
    let expected = class.parameter_count();
    if native.len() != expected {
        return Err(Error::InvalidParameterCount {
            expected,
            actual: native.len(),
        });
    }
    match class {
        TransformClass::Translation => Ok(ParameterVector::from_translation(native[0], native[1])),
        TransformClass::Affine => ParameterVector::from_slice(native),
    }
}

/// Parse the textual numbers of an external tool's parameter file
pub fn parse_parameter_values<S: AsRef<str>>(values: &[S]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            let v = v.as_ref().trim().trim_matches('"');
            v.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| Error::registration(format!("unparsable parameter value '{v}'")))
        })
        .collect()
}
