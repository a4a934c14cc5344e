use super::{Backend, Bypass, DetectorSet, LandmarkSet};
use crate::error::{AlignError, Result};
use opencv::core::Mat;
use std::fmt;

/// Landmarks for both images of a pair, always from the same backend.
#[derive(Debug, Clone)]
pub struct DetectedPair {
    pub template: LandmarkSet,
    pub generated: LandmarkSet,
    pub backend: Backend,
}

/// What happened when one backend was tried on a pair.
#[derive(Debug, Clone, PartialEq)]
enum Attempt {
    Bypassed,
    NoTemplateFace,
    NoGeneratedFace,
    Fault(String),
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Bypassed => f.write_str("bypassed"),
            Attempt::NoTemplateFace => f.write_str("no face in template"),
            Attempt::NoGeneratedFace => f.write_str("no face in generated image"),
            Attempt::Fault(msg) => write!(f, "fault: {msg}"),
        }
    }
}

/// Picks the first backend, in preference order, that finds a face in both
/// images of a pair.
pub struct DetectorCoordinator<'a> {
    detectors: &'a DetectorSet,
    preferred: Backend,
}

impl<'a> DetectorCoordinator<'a> {
    pub fn new(detectors: &'a DetectorSet, preferred: Backend) -> Self {
        Self {
            detectors,
            preferred,
        }
    }

    pub fn preference_order(&self) -> [Backend; 2] {
        [self.preferred, self.preferred.other()]
    }

    #[tracing::instrument(skip_all, fields(preferred = %self.preferred))]
    pub fn detect_both_images(
        &self,
        template: &Mat,
        generated: &Mat,
        bypass: Bypass,
    ) -> Result<DetectedPair> {
        let mut attempts = Vec::with_capacity(2);

        for backend in self.preference_order() {
            if bypass.is_bypassed(backend) {
                tracing::debug!(%backend, "Backend bypassed");
                attempts.push((backend, Attempt::Bypassed));
                continue;
            }

            match self.try_backend(backend, template, generated) {
                Ok(pair) => {
                    tracing::info!(%backend, "Landmarks found in both images");
                    return Ok(pair);
                }
                Err(attempt) => {
                    if let Attempt::Fault(msg) = &attempt {
                        tracing::warn!(%backend, error = %msg, "Backend fault, trying next backend");
                    } else {
                        tracing::info!(%backend, outcome = %attempt, "Backend did not find both faces");
                    }
                    attempts.push((backend, attempt));
                }
            }
        }

        let summary = attempts
            .iter()
            .map(|(b, a)| format!("{b}: {a}"))
            .collect::<Vec<_>>()
            .join("; ");
        let message = if attempts.iter().all(|(_, a)| *a == Attempt::Bypassed) {
            format!("all backends bypassed ({summary})")
        } else {
            format!("no backend detected faces in both images ({summary})")
        };
        Err(AlignError::Detection(message))
    }

    fn try_backend(
        &self,
        backend: Backend,
        template: &Mat,
        generated: &Mat,
    ) -> std::result::Result<DetectedPair, Attempt> {
        let detector = self.detectors.get(backend);

        let template_set = match detector.detect(template) {
            Ok(Some(set)) => set,
            Ok(None) => return Err(Attempt::NoTemplateFace),
            Err(e) => return Err(Attempt::Fault(e.to_string())),
        };
        let generated_set = match detector.detect(generated) {
            Ok(Some(set)) => set,
            Ok(None) => return Err(Attempt::NoGeneratedFace),
            Err(e) => return Err(Attempt::Fault(e.to_string())),
        };

        Ok(DetectedPair {
            template: template_set,
            generated: generated_set,
            backend,
        })
    }
}
