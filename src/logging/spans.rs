//! Span carried through one alignment attempt.

use crate::detection::Backend;
use crate::pipeline::AlignmentState;
use crate::transform::SimilarityTransform;
use std::time::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Wraps the `face_alignment` span so every state change, the chosen backend
/// and the result land on the same correlation id.
pub struct AlignmentSpan {
    span: Span,
    start_time: Instant,
    correlation_id: Uuid,
}

impl AlignmentSpan {
    pub fn new(correlation_id: Uuid, generated_size: (u32, u32), template_size: (u32, u32)) -> Self {
        let span = span!(
            Level::INFO,
            "face_alignment",
            correlation_id = %correlation_id,
            generated_width = generated_size.0,
            generated_height = generated_size.1,
            template_width = template_size.0,
            template_height = template_size.1,
            state = field::Empty,
            backend = field::Empty,
            rotation_degrees = field::Empty,
            scale = field::Empty,
            success = field::Empty,
            execution_time_ms = field::Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    pub fn record_transition(&self, from: AlignmentState, to: AlignmentState) {
        self.span.record("state", field::display(to));
        tracing::info!(
            parent: &self.span,
            correlation_id = %self.correlation_id,
            from = %from,
            to = %to,
            "Alignment state transition"
        );
    }

    pub fn record_backend(&self, backend: Backend) {
        self.span.record("backend", backend.name());
    }

    pub fn record_transform(&self, transform: &SimilarityTransform) {
        self.span.record("rotation_degrees", transform.rotation_degrees());
        self.span.record("scale", transform.scale);
        tracing::debug!(
            parent: &self.span,
            rotation = format!("{:.2}°", transform.rotation_degrees()),
            scale = format!("{:.3}x", transform.scale),
            translation = format!("({:.1}, {:.1})", transform.translation.0, transform.translation.1),
            "Transform recorded"
        );
    }

    pub fn record_result(&self, success: bool) {
        let duration = self.start_time.elapsed();
        self.span.record("success", success);
        self.span.record("execution_time_ms", duration.as_millis() as u64);
        tracing::info!(
            parent: &self.span,
            success,
            execution_time_ms = duration.as_millis() as u64,
            "Alignment attempt finished"
        );
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}
