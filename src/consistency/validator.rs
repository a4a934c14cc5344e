use super::compare::{compare_landmarks, AxisDelta, LandmarkName};
use crate::config::ConsistencyConfig;
use crate::detection::{Backend, Bypass, DetectorSet, LandmarkSet};
use crate::error::{AlignError, Result};
use crate::logging;
use crate::pipeline::{AlignmentOutcome, AlignmentPipeline};
use chrono::{DateTime, Utc};
use opencv::core::Mat;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNRELIABLE_TEMPLATE_NOTE: &str = "cross-detector validation unreliable for this template";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Template,
    Aligned,
}

/// Cross-backend agreement on one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConsistency {
    pub label: String,
    pub role: ImageRole,
    pub per_landmark_deltas: BTreeMap<LandmarkName, AxisDelta>,
    pub landmark_pass: BTreeMap<LandmarkName, bool>,
    pub pass: bool,
    pub notes: Vec<String>,
    /// Detections that succeeded, kept for overlays.
    #[serde(skip)]
    pub detections: BTreeMap<Backend, LandmarkSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub images: Vec<ImageConsistency>,
    pub pass: bool,
    pub notes: Vec<String>,
    pub tolerance_px: f64,
    pub generated_at: DateTime<Utc>,
}

impl ConsistencyReport {
    pub fn image(&self, label: &str) -> Option<&ImageConsistency> {
        self.images.iter().find(|i| i.label == label)
    }
}

/// Output of [`ConsistencyValidator::run`]: one forced-backend alignment per
/// backend plus the report over the template and both outputs.
#[derive(Debug)]
pub struct ConsistencyRun {
    pub alignments: Vec<(Backend, AlignmentOutcome)>,
    pub report: ConsistencyReport,
}

impl ConsistencyRun {
    pub fn output_label(backend: Backend) -> String {
        format!("aligned_{}", backend.name())
    }
}

/// Runs both backends on the same image and reports how far apart their
/// eye and mouth centers land. Diagnostic only.
pub struct ConsistencyValidator<'a> {
    detectors: &'a DetectorSet,
    tolerance: f64,
}

impl<'a> ConsistencyValidator<'a> {
    pub fn new(detectors: &'a DetectorSet, config: &ConsistencyConfig) -> Self {
        Self {
            detectors,
            tolerance: config.max_axis_delta_px,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[tracing::instrument(skip(self, image))]
    pub fn check_image(&self, label: &str, role: ImageRole, image: &Mat) -> Result<ImageConsistency> {
        if image.empty() {
            return Err(AlignError::EmptyImage("consistency"));
        }

        let mut notes = Vec::new();
        let mut detections = BTreeMap::new();
        for backend in Backend::ALL {
            match self.detectors.get(backend).detect(image) {
                Ok(Some(set)) => {
                    detections.insert(backend, set);
                }
                Ok(None) => notes.push(format!("{backend} found no face")),
                Err(e) => {
                    tracing::warn!(%backend, error = %e, "Backend fault during consistency check");
                    notes.push(format!("{backend} fault: {e}"));
                }
            }
        }

        let mut result = ImageConsistency {
            label: label.to_string(),
            role,
            per_landmark_deltas: BTreeMap::new(),
            landmark_pass: BTreeMap::new(),
            pass: false,
            notes,
            detections,
        };

        if let (Some(a), Some(b)) = (
            result.detections.get(&Backend::Yunet),
            result.detections.get(&Backend::Lbf),
        ) {
            let cmp = compare_landmarks(a, b, self.tolerance);
            result.pass = cmp.all_pass();
            for name in cmp.failing() {
                let d = cmp.deltas[&name];
                result
                    .notes
                    .push(format!("{name} differs by ({:.2}, {:.2}) px", d.dx, d.dy));
            }
            result.per_landmark_deltas = cmp.deltas;
            result.landmark_pass = cmp.pass;
        }

        tracing::info!(label, pass = result.pass, notes = result.notes.len(), "Image checked");
        Ok(result)
    }

    /// Check the template and every labelled output. Passes only if all do.
    pub fn validate(&self, template: &Mat, outputs: &[(&str, &Mat)]) -> Result<ConsistencyReport> {
        let mut images = Vec::with_capacity(outputs.len() + 1);
        let mut notes = Vec::new();

        let template_check = self.check_image("template", ImageRole::Template, template)?;
        if !template_check.pass {
            notes.push(UNRELIABLE_TEMPLATE_NOTE.to_string());
        }
        images.push(template_check);

        for (label, image) in outputs {
            images.push(self.check_image(label, ImageRole::Aligned, image)?);
        }

        let pass = images.iter().all(|i| i.pass);
        tracing::info!(images = images.len(), pass, "Consistency validation finished");
        Ok(ConsistencyReport {
            images,
            pass,
            notes,
            tolerance_px: self.tolerance,
            generated_at: Utc::now(),
        })
    }

    /// Align `generated` once per backend, forcing that backend, then
    /// validate the template and both outputs.
    pub fn run(
        &self,
        pipeline: &AlignmentPipeline<'_>,
        template: &Mat,
        generated: &Mat,
    ) -> Result<ConsistencyRun> {
        let run_id = logging::new_correlation_id();
        let span = crate::correlation_span!(tracing::Level::INFO, "consistency_run");
        let _enter = span.enter();
        tracing::info!(%run_id, "Consistency run started");

        let mut alignments = Vec::with_capacity(Backend::ALL.len());
        let mut fallback_notes = Vec::new();
        for backend in Backend::ALL {
            let outcome = pipeline.align(generated, template, Bypass::only(backend))?;
            if let Some(reason) = &outcome.fallback {
                fallback_notes.push(format!(
                    "{backend}-only alignment fell back during {}: {}",
                    reason.stage, reason.message
                ));
            }
            alignments.push((backend, outcome));
        }

        let labels: Vec<String> = alignments
            .iter()
            .map(|(b, _)| ConsistencyRun::output_label(*b))
            .collect();
        let outputs: Vec<(&str, &Mat)> = labels
            .iter()
            .zip(alignments.iter())
            .map(|(label, (_, outcome))| (label.as_str(), &outcome.output))
            .collect();

        let mut report = self.validate(template, &outputs)?;
        report.notes.extend(fallback_notes);
        Ok(ConsistencyRun { alignments, report })
    }
}
