pub mod benchmarks;
pub mod metrics;

pub use benchmarks::{BenchmarkReport, BenchmarkRunner};
