mod common;

use common::*;
use face_align::config::AlignmentConfig;
use face_align::detection::{Backend, Bypass};
use face_align::error::AlignError;
use face_align::pipeline::{AlignmentPipeline, AlignmentState, FailureKind};
use face_align::utils::save_image;
use opencv::core::{self, Mat};
use opencv::prelude::*;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

fn inputs() -> (Mat, Mat) {
    (
        dotted(GENERATED_SIZE, &GENERATED_POINTS, 8),
        blank(TEMPLATE_SIZE, core::CV_8UC3),
    )
}

#[test]
fn test_successful_alignment() {
    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let (generated, template) = inputs();

    let outcome = pipeline.align(&generated, &template, Bypass::none()).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.final_state, AlignmentState::Succeeded);
    assert_eq!(outcome.backend_used, Some(Backend::Yunet));
    assert_eq!(outcome.canvas_size, (800, 600));
    assert_eq!((outcome.output.cols(), outcome.output.rows()), (800, 600));
    assert_eq!(outcome.output.channels(), 4);
    assert!(outcome.fallback.is_none());
    assert_eq!(
        outcome.state_history,
        [
            AlignmentState::NotStarted,
            AlignmentState::DetectingLandmarks,
            AlignmentState::ComputingTransform,
            AlignmentState::Warping,
            AlignmentState::Succeeded,
        ]
    );
    assert_eq!(outcome.summary().state_history.len(), 5);

    let t = outcome.transform.unwrap();
    assert!((t.scale - 0.5).abs() < 1e-9);
    for (x, y) in TEMPLATE_POINTS {
        assert!(channel_at(&outcome.output, x as i32, y as i32, 0) > 200);
    }
}

#[test]
fn test_solid_background_when_transparency_is_off() {
    let detectors = agreeing_detectors();
    let config = AlignmentConfig {
        transparent_fill: false,
        background_color: [255, 0, 0],
        ..AlignmentConfig::default()
    };
    let pipeline = AlignmentPipeline::new(&detectors, config);
    let (generated, template) = inputs();

    let outcome = pipeline.align(&generated, &template, Bypass::none()).unwrap();
    assert_eq!(outcome.output.channels(), 3);
    // Top-right corner maps outside the generated image.
    assert_eq!(channel_at(&outcome.output, 799, 0, 2), 255);
    assert_eq!(channel_at(&outcome.output, 799, 0, 0), 0);
}

#[test]
fn test_both_backends_bypassed_degrades_gracefully() {
    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let (generated, template) = inputs();

    let outcome = pipeline.align(&generated, &template, Bypass::all()).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.final_state, AlignmentState::FailedGraceful);
    assert_eq!(
        outcome.state_history,
        [
            AlignmentState::NotStarted,
            AlignmentState::DetectingLandmarks,
            AlignmentState::FailedGraceful,
        ]
    );
    assert!(outcome.transform.is_none());
    assert!(outcome.backend_used.is_none());
    assert_eq!(outcome.canvas_size, (800, 600));
    assert_eq!((outcome.output.cols(), outcome.output.rows()), (1024, 768));
    assert_eq!(
        outcome.output.data_bytes().unwrap(),
        generated.data_bytes().unwrap()
    );

    let reason = outcome.fallback.unwrap();
    assert_eq!(reason.stage, AlignmentState::DetectingLandmarks);
    assert_eq!(reason.kind, FailureKind::Detection);
    assert!(reason.message.contains("bypassed"));
}

#[test]
fn test_collinear_landmarks_fall_back_at_transform_stage() {
    let detectors = detector_set(
        MockDetector::new(Backend::Yunet)
            .respond(TEMPLATE_SIZE, Response::Face(TEMPLATE_POINTS))
            .respond(
                GENERATED_SIZE,
                Response::Face([(100.0, 100.0), (200.0, 200.0), (300.0, 300.0)]),
            ),
        MockDetector::new(Backend::Lbf),
    );
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let (generated, template) = inputs();

    let outcome = pipeline.align(&generated, &template, Bypass::none()).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.backend_used, Some(Backend::Yunet));
    let reason = outcome.fallback.unwrap();
    assert_eq!(reason.stage, AlignmentState::ComputingTransform);
    assert_eq!(reason.kind, FailureKind::Geometry);
}

#[test]
fn test_empty_input_is_a_hard_failure() {
    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let (generated, template) = inputs();

    assert!(matches!(
        pipeline.align(&generated, &Mat::default(), Bypass::none()),
        Err(AlignError::EmptyImage("template"))
    ));
    assert!(matches!(
        pipeline.align(&Mat::default(), &template, Bypass::none()),
        Err(AlignError::EmptyImage("generated"))
    ));
}

#[test]
fn test_preferred_backend_is_tried_first() {
    let yunet = MockDetector::new(Backend::Yunet)
        .respond(TEMPLATE_SIZE, Response::Face(TEMPLATE_POINTS))
        .respond(GENERATED_SIZE, Response::Face(GENERATED_POINTS));
    let yunet_calls = yunet.call_counter();
    let lbf = MockDetector::new(Backend::Lbf)
        .respond(TEMPLATE_SIZE, Response::Face(TEMPLATE_POINTS))
        .respond(GENERATED_SIZE, Response::Face(GENERATED_POINTS));
    let detectors = detector_set(yunet, lbf);
    let config = AlignmentConfig {
        preferred_backend: Backend::Lbf,
        ..AlignmentConfig::default()
    };
    let pipeline = AlignmentPipeline::new(&detectors, config);
    let (generated, template) = inputs();

    let outcome = pipeline.align(&generated, &template, Bypass::none()).unwrap();
    assert_eq!(outcome.backend_used, Some(Backend::Lbf));
    assert_eq!(yunet_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_each_attempt_gets_its_own_correlation_id() {
    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let (generated, template) = inputs();
    let a = pipeline.align(&generated, &template, Bypass::none()).unwrap();
    let b = pipeline.align(&generated, &template, Bypass::all()).unwrap();
    assert_ne!(a.correlation_id, b.correlation_id);
    assert_eq!(a.summary().correlation_id, a.correlation_id);
}

#[test]
fn test_align_files_writes_output() {
    let dir = TempDir::new().unwrap();
    let (generated, template) = inputs();
    let generated_path = dir.path().join("generated.png");
    let template_path = dir.path().join("template.png");
    save_image(&generated, &generated_path).unwrap();
    save_image(&template, &template_path).unwrap();

    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());

    let png_out = dir.path().join("out/aligned.png");
    let outcome = pipeline
        .align_files(&generated_path, &template_path, &png_out, Bypass::none())
        .unwrap();
    assert!(outcome.success);
    let written = image::open(&png_out).unwrap();
    assert_eq!((written.width(), written.height()), (800, 600));
    assert!(written.color().has_alpha());

    // JPEG has no alpha: solid background instead of transparency.
    let jpg_out = dir.path().join("aligned.jpg");
    let outcome = pipeline
        .align_files(&generated_path, &template_path, &jpg_out, Bypass::none())
        .unwrap();
    assert_eq!(outcome.output.channels(), 3);
    let written = image::open(&jpg_out).unwrap();
    assert!(!written.color().has_alpha());

    let summary = outcome.summary().with_paths(&generated_path, &jpg_out);
    assert_eq!(summary.output_path.as_deref(), Some(jpg_out.as_path()));
}

#[test]
fn test_align_files_passthrough_on_fallback() {
    let dir = TempDir::new().unwrap();
    let (generated, template) = inputs();
    let generated_path = dir.path().join("generated.png");
    let template_path = dir.path().join("template.png");
    save_image(&generated, &generated_path).unwrap();
    save_image(&template, &template_path).unwrap();

    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let out = dir.path().join("passthrough.png");
    let outcome = pipeline
        .align_files(&generated_path, &template_path, &out, Bypass::all())
        .unwrap();
    assert!(!outcome.success);
    let written = image::open(&out).unwrap();
    assert_eq!((written.width(), written.height()), (1024, 768));
}

#[test]
fn test_missing_input_file_is_a_hard_failure() {
    let dir = TempDir::new().unwrap();
    let detectors = agreeing_detectors();
    let pipeline = AlignmentPipeline::new(&detectors, AlignmentConfig::default());
    let result = pipeline.align_files(
        &dir.path().join("missing.png"),
        &dir.path().join("also_missing.png"),
        &dir.path().join("out.png"),
        Bypass::none(),
    );
    assert!(matches!(result, Err(AlignError::Image { .. })));
    assert!(!dir.path().join("out.png").exists());
}
