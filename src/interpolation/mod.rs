pub mod border;
pub mod bspline;

pub use bspline::BSplineCoefficients;
