use crate::error::{Error, Result};
use crate::transform::parameters::ParameterVector;
use anyhow::Context;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 2-D affine map about an origin: `q = L·(p − o) + o + t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    /// Row-major `[m00, m01, m10, m11]`
    pub linear: [f64; 4],
    pub translation: [f64; 2],
    pub origin: [f64; 2],
}

impl AffineTransform {
    pub fn identity(origin: [f64; 2]) -> Self {
        Self {
            linear: [1.0, 0.0, 0.0, 1.0],
            translation: [0.0, 0.0],
            origin,
        }
    }

    pub fn translation(offset: [f64; 2], origin: [f64; 2]) -> Self {
        Self {
            translation: offset,
            ..Self::identity(origin)
        }
    }

    pub fn from_parameters(parameters: &ParameterVector, origin: [f64; 2]) -> Self {
        Self {
            linear: parameters.linear(),
            translation: parameters.translation(),
            origin,
        }
    }

    pub fn to_parameters(&self) -> ParameterVector {
        let [m00, m01, m10, m11] = self.linear;
        let [tx, ty] = self.translation;
        ParameterVector([m00, m01, m10, m11, tx, ty])
    }

    pub fn determinant(&self) -> f64 {
        let [m00, m01, m10, m11] = self.linear;
        m00 * m11 - m01 * m10
    }

    pub fn is_identity(&self) -> bool {
        const TOLERANCE: f64 = 1e-12;
        let [m00, m01, m10, m11] = self.linear;
        let [tx, ty] = self.translation;
        (m00 - 1.0).abs() <= TOLERANCE
            && m01.abs() <= TOLERANCE
            && m10.abs() <= TOLERANCE
            && (m11 - 1.0).abs() <= TOLERANCE
            && tx.abs() <= TOLERANCE
            && ty.abs() <= TOLERANCE
    }

    pub fn forward(&self, point: [f64; 2]) -> [f64; 2] {
        let [m00, m01, m10, m11] = self.linear;
        let dx = point[0] - self.origin[0];
        let dy = point[1] - self.origin[1];
        [
            m00 * dx + m01 * dy + self.origin[0] + self.translation[0],
            m10 * dx + m11 * dy + self.origin[1] + self.translation[1],
        ]
    }

    /// Algebraic inverse about the same origin
    pub fn inverse(&self) -> Result<Self> {
        let det = self.determinant();
        let scale = self.linear.iter().fold(0.0_f64, |acc, m| acc.max(m.abs()));
        if !det.is_finite() || scale == 0.0 || det.abs() <= f64::EPSILON * scale * scale {
            return Err(Error::SingularTransform { determinant: det });
        }

        let [m00, m01, m10, m11] = self.linear;
        let inv = [m11 / det, -m01 / det, -m10 / det, m00 / det];
        let [tx, ty] = self.translation;
        Ok(Self {
            linear: inv,
            translation: [-(inv[0] * tx + inv[1] * ty), -(inv[2] * tx + inv[3] * ty)],
            origin: self.origin,
        })
    }

    pub fn inverse_point(&self, point: [f64; 2]) -> Result<[f64; 2]> {
        Ok(self.inverse()?.forward(point))
    }

    /// Apply `self`, then `other`; the result keeps `self`'s origin
    pub fn then(&self, other: &AffineTransform) -> Self {
        let [a00, a01, a10, a11] = self.linear;
        let [b00, b01, b10, b11] = other.linear;
        let linear = [
            b00 * a00 + b01 * a10,
            b00 * a01 + b01 * a11,
            b10 * a00 + b11 * a10,
            b10 * a01 + b11 * a11,
        ];
        // Where self's origin lands after both maps
        let [qx, qy] = other.forward([
            self.origin[0] + self.translation[0],
            self.origin[1] + self.translation[1],
        ]);
        Self {
            linear,
            translation: [qx - self.origin[0], qy - self.origin[1]],
            origin: self.origin,
        }
    }

    /// Same mapping expressed about another origin
    pub fn with_origin(&self, origin: [f64; 2]) -> Self {
        let [m00, m01, m10, m11] = self.linear;
        let dx = origin[0] - self.origin[0];
        let dy = origin[1] - self.origin[1];
        Self {
            linear: self.linear,
            translation: [
                self.translation[0] + (m00 - 1.0) * dx + m01 * dy,
                self.translation[1] + m10 * dx + (m11 - 1.0) * dy,
            ],
            origin,
        }
    }

    /// Re-target a transform estimated on a `(width, height)` image to a
    /// centered crop or pad of another size
    pub fn adapt(&self, old_shape: (usize, usize), new_shape: (usize, usize)) -> Self {
        let shift_x = (new_shape.0 as f64 - old_shape.0 as f64) / 2.0;
        let shift_y = (new_shape.1 as f64 - old_shape.1 as f64) / 2.0;
        Self {
            origin: [self.origin[0] + shift_x, self.origin[1] + shift_y],
            ..*self
        }
    }

    /// Map an `n x 2` array of `(x, y)` rows forward
    pub fn map_coordinates(&self, points: &Array2<f64>) -> Result<Array2<f64>> {
        if points.ncols() != 2 {
            return Err(Error::InvalidArgument(format!(
                "coordinates must have 2 columns, got {}",
                points.ncols()
            )));
        }
        let mut mapped = Array2::zeros(points.raw_dim());
        for (src, mut dst) in points.rows().into_iter().zip(mapped.rows_mut()) {
            let [x, y] = self.forward([src[0], src[1]]);
            dst[0] = x;
            dst[1] = y;
        }
        Ok(mapped)
    }
}

/// A transform persisted together with the image shape it applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub parameters: ParameterVector,
    pub origin: [f64; 2],
    /// `(width, height)`
    pub shape: (usize, usize),
}

impl TransformRecord {
    pub fn new(transform: &AffineTransform, shape: (usize, usize)) -> Self {
        Self {
            parameters: transform.to_parameters(),
            origin: transform.origin,
            shape,
        }
    }

    pub fn transform(&self) -> AffineTransform {
        AffineTransform::from_parameters(&self.parameters, self.origin)
    }

    /// Saved as JSON for a `.json` extension, TOML otherwise
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let record = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(record)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: [f64; 2], b: [f64; 2]) {
        assert!((a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9, "{a:?} != {b:?}");
    }

    fn sample() -> AffineTransform {
        AffineTransform {
            linear: [1.1, 0.2, -0.15, 0.9],
            translation: [3.0, -2.0],
            origin: [10.0, 5.0],
        }
    }

    #[test]
    fn forward_maps_origin_by_translation() {
        let t = sample();
        assert_close(t.forward(t.origin), [13.0, 3.0]);
    }

    #[test]
    fn inverse_undoes_forward() {
        let t = sample();
        let inv = t.inverse().unwrap();
        for p in [[0.0, 0.0], [7.5, -3.0], [100.0, 42.0]] {
            assert_close(inv.forward(t.forward(p)), p);
            assert_close(t.inverse_point(t.forward(p)).unwrap(), p);
        }
        assert_eq!(inv.origin, t.origin);
    }

    #[test]
    fn singular_linear_part_is_rejected() {
        let t = AffineTransform {
            linear: [1.0, 2.0, 2.0, 4.0],
            ..AffineTransform::identity([0.0, 0.0])
        };
        assert!(matches!(t.inverse(), Err(Error::SingularTransform { .. })));

        let zero = AffineTransform {
            linear: [0.0; 4],
            ..AffineTransform::identity([0.0, 0.0])
        };
        assert!(zero.inverse().is_err());
    }

    #[test]
    fn composition_matches_sequential_application() {
        let a = sample();
        let b = AffineTransform {
            linear: [0.8, -0.1, 0.3, 1.2],
            translation: [-1.0, 4.0],
            origin: [2.0, 2.0],
        };
        let ab = a.then(&b);
        for p in [[0.0, 0.0], [5.0, 9.0]] {
            assert_close(ab.forward(p), b.forward(a.forward(p)));
        }
        assert!(a.then(&a.inverse().unwrap()).is_identity());
    }

    #[test]
    fn reorigin_preserves_mapping() {
        let t = sample();
        let moved = t.with_origin([0.0, 0.0]);
        for p in [[1.0, 1.0], [-4.0, 12.0]] {
            assert_close(moved.forward(p), t.forward(p));
        }
    }

    #[test]
    fn adapt_shifts_origin_by_half_size_change() {
        let t = AffineTransform::identity([31.5, 31.5]);
        let adapted = t.adapt((64, 64), (128, 32));
        assert_eq!(adapted.origin, [63.5, 15.5]);
        assert_eq!(adapted.linear, t.linear);
    }

    #[test]
    fn map_coordinates_requires_two_columns() {
        let t = AffineTransform::translation([1.0, -1.0], [0.0, 0.0]);
        let mapped = t.map_coordinates(&array![[0.0, 0.0], [2.0, 3.0]]).unwrap();
        assert_eq!(mapped, array![[1.0, -1.0], [3.0, 2.0]]);
        assert!(t.map_coordinates(&Array2::zeros((4, 3))).is_err());
    }

    #[test]
    fn parameters_round_trip() {
        let t = sample();
        assert_eq!(AffineTransform::from_parameters(&t.to_parameters(), t.origin), t);
    }

    #[test]
    fn record_persists_as_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let transform = AffineTransform {
            linear: [1.25, 0.5, -0.125, 0.75],
            translation: [3.0, -2.5],
            origin: [31.5, 23.5],
        };
        let record = TransformRecord::new(&transform, (64, 48));
        for name in ["t.toml", "t.json"] {
            let path = dir.path().join(name);
            record.save(&path).unwrap();
            assert_eq!(TransformRecord::load(&path).unwrap(), record);
        }
        assert_eq!(record.transform(), transform);
    }
}
