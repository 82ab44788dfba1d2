//! Structured spans for registration and resampling calls

use crate::transform::{InterpolationMode, TransformClass};
use std::time::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span covering one registration call, from validation to the final transform
pub struct RegistrationSpan {
    span: Span,
    start_time: Instant,
}

impl RegistrationSpan {
    pub fn new(backend: &str, class: TransformClass, size: (usize, usize), correlation_id: Option<Uuid>) -> Self {
        let span = span!(
            Level::INFO,
            "registration",
            backend = backend,
            class = %class,
            width = size.0,
            height = size.1,
            correlation_id = field::Empty,
            iterations = field::Empty,
            mutual_information = field::Empty,
            execution_time_ms = field::Empty,
        );
        if let Some(id) = correlation_id {
            span.record("correlation_id", field::display(id));
        }

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    /// Record the optimizer outcome, when the backend reports one
    pub fn record_optimizer(&self, iterations: usize, mutual_information: f64) {
        self.span.record("iterations", iterations);
        self.span.record("mutual_information", mutual_information);
        tracing::debug!(
            parent: &self.span,
            iterations,
            mutual_information,
            "Optimizer finished"
        );
    }

    pub fn record_result(&self, parameters: &[f64; 6]) {
        let duration = self.start_time.elapsed();
        self.span.record("execution_time_ms", duration.as_millis() as u64);
        tracing::info!(
            parent: &self.span,
            parameters = ?parameters,
            execution_time_ms = duration.as_millis() as u64,
            "Registration completed"
        );
    }

    pub fn record_failure(&self, error: &dyn std::error::Error) {
        let duration = self.start_time.elapsed();
        self.span.record("execution_time_ms", duration.as_millis() as u64);
        tracing::warn!(
            parent: &self.span,
            error = %error,
            execution_time_ms = duration.as_millis() as u64,
            "Registration failed"
        );
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Span covering one resampling call
pub struct ResampleSpan {
    span: Span,
    start_time: Instant,
}

impl ResampleSpan {
    pub fn new(mode: InterpolationMode, size: (usize, usize)) -> Self {
        let span = span!(
            Level::DEBUG,
            "resample",
            mode = ?mode,
            width = size.0,
            height = size.1,
            execution_time_ms = field::Empty,
        );
        Self {
            span,
            start_time: Instant::now(),
        }
    }

    pub fn record_completion(&self) {
        let duration = self.start_time.elapsed();
        self.span.record("execution_time_ms", duration.as_millis() as u64);
        tracing::debug!(
            parent: &self.span,
            execution_time_ms = duration.as_millis() as u64,
            "Resampling completed"
        );
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_test_subscriber(f: impl FnOnce()) {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_registration_span() {
        with_test_subscriber(|| {
            let span = RegistrationSpan::new("step-descent", TransformClass::Affine, (64, 48), Some(Uuid::new_v4()));
            let _enter = span.enter();
            span.record_optimizer(42, 1.25);
            span.record_result(&[1.0, 0.0, 0.0, 1.0, 2.0, -1.0]);
            assert!(!span.span().is_disabled());
        });
    }

    #[test]
    fn test_resample_span() {
        with_test_subscriber(|| {
            let span = ResampleSpan::new(InterpolationMode::NearestNeighbor, (8, 8));
            let _enter = span.enter();
            span.record_completion();
        });
    }
}
