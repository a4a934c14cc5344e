use super::{AlignmentOutcome, AlignmentState, FallbackReason, StateTracker};
use crate::config::AlignmentConfig;
use crate::detection::{Backend, Bypass, DetectorCoordinator, DetectorSet};
use crate::error::{AlignError, Result};
use crate::logging::{self, AlignmentSpan};
use crate::transform::{compute_similarity_transform, warp_to_canvas, FillPolicy, SimilarityTransform};
use crate::utils::{format_supports_alpha, load_image, mat_size, save_image};
use opencv::core::Mat;
use opencv::prelude::*;
use std::path::Path;
use uuid::Uuid;

/// Detect → solve → warp, degrading to the unaligned generated image when
/// landmarks or geometry fail.
pub struct AlignmentPipeline<'a> {
    detectors: &'a DetectorSet,
    config: AlignmentConfig,
}

/// What the stages produced before finishing or failing.
#[derive(Default)]
struct Progress {
    backend: Option<Backend>,
    transform: Option<SimilarityTransform>,
}

impl<'a> AlignmentPipeline<'a> {
    pub fn new(detectors: &'a DetectorSet, config: AlignmentConfig) -> Self {
        Self { detectors, config }
    }

    /// Fill used by [`align`](Self::align).
    pub fn fill_policy(&self) -> FillPolicy {
        if self.config.transparent_fill {
            FillPolicy::Transparent
        } else {
            FillPolicy::Solid(self.config.background_color)
        }
    }

    /// Align `generated` onto the canvas of `template`. Neither input is modified.
    ///
    /// Detection and geometry failures return `Ok` with `success == false`
    /// and the generated image passed through. Empty inputs and other
    /// failures return `Err`.
    pub fn align(&self, generated: &Mat, template: &Mat, bypass: Bypass) -> Result<AlignmentOutcome> {
        self.align_with_fill(generated, template, bypass, self.fill_policy())
    }

    /// Decode both files, align, and encode the result (or the passthrough)
    /// to `output_path`. Formats without alpha get the solid background.
    pub fn align_files(
        &self,
        generated_path: &Path,
        template_path: &Path,
        output_path: &Path,
        bypass: Bypass,
    ) -> Result<AlignmentOutcome> {
        let template = load_image(template_path).inspect_err(|e| {
            tracing::error!(path = %template_path.display(), error = %e, "Template could not be loaded");
        })?;
        let generated = load_image(generated_path).inspect_err(|e| {
            tracing::error!(path = %generated_path.display(), error = %e, "Generated image could not be loaded");
        })?;

        let fill = if format_supports_alpha(output_path) {
            self.fill_policy()
        } else {
            FillPolicy::Solid(self.config.background_color)
        };

        let outcome = self.align_with_fill(&generated, &template, bypass, fill)?;
        save_image(&outcome.output, output_path).inspect_err(|e| {
            tracing::error!(
                correlation_id = %outcome.correlation_id,
                path = %output_path.display(),
                error = %e,
                "Output could not be written"
            );
        })?;
        tracing::info!(
            correlation_id = %outcome.correlation_id,
            path = %output_path.display(),
            aligned = outcome.success,
            "Output written"
        );
        Ok(outcome)
    }

    fn align_with_fill(
        &self,
        generated: &Mat,
        template: &Mat,
        bypass: Bypass,
        fill: FillPolicy,
    ) -> Result<AlignmentOutcome> {
        let correlation_id = Uuid::new_v4();
        logging::set_correlation_id(correlation_id);
        let canvas_size = mat_size(template);
        let span = AlignmentSpan::new(correlation_id, mat_size(generated), canvas_size);
        let _enter = span.enter();
        let mut tracker = StateTracker::new();

        let empty = if template.empty() {
            Some("template")
        } else if generated.empty() {
            Some("generated")
        } else {
            None
        };
        if let Some(which) = empty {
            transition(&mut tracker, &span, AlignmentState::FailedHard)?;
            span.record_result(false);
            return Err(AlignError::EmptyImage(which));
        }

        let mut progress = Progress::default();
        let result = self.run_stages(&mut tracker, &span, &mut progress, generated, template, bypass, fill);

        match result {
            Ok(output) => {
                transition(&mut tracker, &span, AlignmentState::Succeeded)?;
                span.record_result(true);
                Ok(AlignmentOutcome {
                    success: true,
                    backend_used: progress.backend,
                    transform: progress.transform,
                    canvas_size,
                    output,
                    final_state: tracker.current(),
                    state_history: tracker.history().to_vec(),
                    fallback: None,
                    correlation_id,
                })
            }
            Err(error) => match FallbackReason::from_error(tracker.current(), &error) {
                Some(reason) => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        stage = %reason.stage,
                        error = %error,
                        "Alignment failed, passing generated image through unaligned"
                    );
                    transition(&mut tracker, &span, AlignmentState::FailedGraceful)?;
                    span.record_result(false);
                    Ok(AlignmentOutcome {
                        success: false,
                        backend_used: progress.backend,
                        transform: None,
                        canvas_size,
                        output: generated.try_clone()?,
                        final_state: tracker.current(),
                        state_history: tracker.history().to_vec(),
                        fallback: Some(reason),
                        correlation_id,
                    })
                }
                None => {
                    tracing::error!(
                        correlation_id = %correlation_id,
                        stage = %tracker.current(),
                        error = %error,
                        "Alignment failed hard"
                    );
                    if !tracker.current().is_terminal() {
                        transition(&mut tracker, &span, AlignmentState::FailedHard)?;
                    }
                    span.record_result(false);
                    Err(error)
                }
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_stages(
        &self,
        tracker: &mut StateTracker,
        span: &AlignmentSpan,
        progress: &mut Progress,
        generated: &Mat,
        template: &Mat,
        bypass: Bypass,
        fill: FillPolicy,
    ) -> Result<Mat> {
        transition(tracker, span, AlignmentState::DetectingLandmarks)?;
        let coordinator = DetectorCoordinator::new(self.detectors, self.config.preferred_backend);
        let pair = coordinator.detect_both_images(template, generated, bypass)?;
        progress.backend = Some(pair.backend);
        span.record_backend(pair.backend);

        transition(tracker, span, AlignmentState::ComputingTransform)?;
        let transform = compute_similarity_transform(&pair.template.triplet(), &pair.generated.triplet())?;
        progress.transform = Some(transform);
        span.record_transform(&transform);

        transition(tracker, span, AlignmentState::Warping)?;
        warp_to_canvas(generated, mat_size(template), &transform, fill)
    }
}

fn transition(tracker: &mut StateTracker, span: &AlignmentSpan, next: AlignmentState) -> Result<()> {
    let previous = tracker.advance(next)?;
    span.record_transition(previous, next);
    Ok(())
}
