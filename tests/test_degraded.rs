extern crate fruit_grade;

use std::sync::Arc;
use std::time::Duration;
use fruit_grade::common::{Grade, GradeError, ModelRole, RipenessLabel, SizeBucket, VarietyOutcome};
use fruit_grade::detection_runners::{CancelToken, InferenceOrchestrator, ModelHandles};

use fakes::*;

fn photo() -> fruit_grade::common::GradeImage {
    fruit_photo(640, 480, (120, 80, 300, 260))
}

#[tokio::test]
async fn no_detection_falls_back_to_full_frame() {
    let orchestrator = InferenceOrchestrator::new(standard_config(), standard_handles(RIPE, vec![])).unwrap();
    let result = orchestrator.analyze(&empty_photo(640, 480), &CancelToken::new()).await.unwrap();

    assert!(!result.detection_successful());
    assert!(result.roi().detection.is_none());
    assert_eq!(result.roi().bbox.xy1_wh(), (0., 0., 640., 480.));
    assert_eq!(result.decision().grade, Grade::Accept);
}

#[tokio::test]
async fn low_confidence_detection_is_ignored() {
    let handles = ModelHandles::new()
        .with_detection(fixed_detector(1, vec![(320., 320., 100., 100., 0, 0.5)]))
        .with_ripeness(classifier_favouring(RIPE, 6))
        .with_defect(fixed_detector(3, vec![]));
    let orchestrator = InferenceOrchestrator::new(standard_config(), handles).unwrap();
    let result = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap();
    assert!(!result.detection_successful());
}

#[tokio::test]
async fn detection_outside_the_frame_is_invalid_input() {
    let handles = ModelHandles::new()
        .with_detection(fixed_detector(1, vec![(-400., -400., 50., 50., 0, 0.95)]))
        .with_ripeness(classifier_favouring(RIPE, 6))
        .with_defect(fixed_detector(3, vec![]));
    let orchestrator = InferenceOrchestrator::new(standard_config(), handles).unwrap();
    let err = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, GradeError::InvalidInput(_)), "{err:?}");
}

#[tokio::test]
async fn missing_mandatory_model_is_reported_up_front() {
    let handles = ModelHandles::new()
        .with_detection(colour_detector())
        .with_ripeness(classifier_favouring(RIPE, 6));
    let err = InferenceOrchestrator::new(standard_config(), handles).unwrap_err();
    assert!(matches!(err, GradeError::ModelsUnavailable(_)));
    assert_eq!(err.to_string(), "models unavailable: defect model not loaded");
}

#[tokio::test]
async fn failing_variety_degrades_to_a_marker() {
    let handles = standard_handles(RIPE, vec![]).with_variety(failing("variety"));
    let orchestrator = InferenceOrchestrator::new(variety_config(), handles).unwrap();
    let result = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap();

    match result.variety() {
        VarietyOutcome::Unavailable { reason } => assert!(reason.contains("execution provider lost")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(result.variety().label(), "");
    assert_eq!(result.decision().grade, Grade::Accept);
}

#[tokio::test]
async fn configured_but_unloaded_variety_is_unavailable() {
    let orchestrator = InferenceOrchestrator::new(variety_config(), standard_handles(RIPE, vec![])).unwrap();
    let result = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap();
    assert!(matches!(result.variety(), VarietyOutcome::Unavailable { .. }));
}

#[tokio::test]
async fn failing_mandatory_model_aborts_only_that_call() {
    let handles = ModelHandles::new()
        .with_detection(colour_detector())
        .with_ripeness(classifier_favouring(RIPE, 6))
        .with_defect(failing("defect"));
    let orchestrator = InferenceOrchestrator::new(standard_config(), handles).unwrap();
    let cancel = CancelToken::new();

    let err = orchestrator.analyze(&photo(), &cancel).await.unwrap_err();
    assert!(err.is_model_failure());
    assert_eq!(err.role(), Some(ModelRole::Defect));

    // The orchestrator stays usable.
    let err = orchestrator.analyze(&photo(), &cancel).await.unwrap_err();
    assert_eq!(err.role(), Some(ModelRole::Defect));
}

#[tokio::test]
async fn malformed_classifier_output_is_reported() {
    let handles = ModelHandles::new()
        .with_detection(colour_detector())
        .with_ripeness(classifier_favouring(1, 4))
        .with_defect(fixed_detector(3, vec![]));
    let orchestrator = InferenceOrchestrator::new(standard_config(), handles).unwrap();
    let err = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, GradeError::MalformedOutput { role: ModelRole::Ripeness, .. }), "{err:?}");
}

#[tokio::test]
async fn slow_mandatory_model_times_out() {
    let handles = ModelHandles::new()
        .with_detection(framing_detector())
        .with_ripeness(slow(Duration::from_millis(600), classifier_favouring(RIPE, 6)))
        .with_defect(fixed_detector(3, vec![]));
    let config = standard_config().with_model_timeout(Some(Duration::from_millis(50)));
    let orchestrator = InferenceOrchestrator::new(config, handles).unwrap();

    let err = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap_err();
    match err {
        GradeError::ModelTimeout { role, timeout } => {
            assert_eq!(role, ModelRole::Ripeness);
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn slow_variety_times_out_without_failing_the_grade() {
    let handles = ModelHandles::new()
        .with_detection(framing_detector())
        .with_ripeness(classifier_favouring(UNRIPE, 6))
        .with_defect(fixed_detector(3, vec![]))
        .with_variety(slow(Duration::from_millis(600), classifier_favouring(0, 4)));
    let config = variety_config().with_model_timeout(Some(Duration::from_millis(50)));
    let orchestrator = InferenceOrchestrator::new(config, handles).unwrap();

    let result = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap();
    match result.variety() {
        VarietyOutcome::Unavailable { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(*result.ripeness().top_label(), RipenessLabel::Unripe);
}

#[tokio::test]
async fn timeout_bounds_the_model_call_not_image_preparation() {
    // 4000x3000 letterboxes into 640 with scale 0.16 and 80 px of padding on top.
    let image = fruit_photo(4000, 3000, (1000, 750, 2000, 1500));
    let handles = ModelHandles::new()
        .with_detection(fixed_detector(1, vec![(320., 320., 320., 240., 0, 0.9)]))
        .with_ripeness(classifier_favouring(RIPE, 6))
        .with_defect(fixed_detector(3, vec![]));
    let config = standard_config().with_model_timeout(Some(Duration::from_millis(50)));
    let orchestrator = InferenceOrchestrator::new(config, handles).unwrap();

    let result = orchestrator.analyze(&image, &CancelToken::new()).await.unwrap();
    assert!(result.detection_successful());
    let (x, y, w, h) = result.roi().bbox.xy1_wh();
    assert!((x - 1000.).abs() <= 1. && (y - 750.).abs() <= 1., "roi origin {x},{y}");
    assert!((w - 2000.).abs() <= 1. && (h - 1500.).abs() <= 1., "roi size {w}x{h}");
    assert_eq!(result.decision().grade, Grade::Accept);
    assert_eq!(result.size(), SizeBucket::ExtraLarge);
}

#[tokio::test]
async fn crop_passes_are_in_flight_together() {
    let point = Arc::new(Rendezvous::default());
    let handles = ModelHandles::new()
        .with_detection(framing_detector())
        .with_ripeness(meeting(&point, 3, classifier_favouring(RIPE, 6)))
        .with_defect(meeting(&point, 3, fixed_detector(3, vec![])))
        .with_variety(meeting(&point, 3, classifier_favouring(2, 4)));
    let config = variety_config().with_model_timeout(None);
    let orchestrator = InferenceOrchestrator::new(config, handles).unwrap();

    let result = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap();
    assert_eq!(result.variety().label(), "red_dacca");
    assert_eq!(result.decision().grade, Grade::Accept);
}

#[tokio::test]
async fn out_of_range_defect_scores_are_malformed() {
    let handles = ModelHandles::new()
        .with_detection(framing_detector())
        .with_ripeness(classifier_favouring(RIPE, 6))
        .with_defect(fixed_detector(3, vec![(100., 100., 20., 20., SCAB, 3.7)]));
    let orchestrator = InferenceOrchestrator::new(standard_config(), handles).unwrap();
    let err = orchestrator.analyze(&photo(), &CancelToken::new()).await.unwrap_err();
    match err {
        GradeError::MalformedOutput { role, detail } => {
            assert_eq!(role, ModelRole::Defect);
            assert!(detail.contains("3.7"), "{detail}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_stops_before_any_model_runs() {
    let orchestrator = InferenceOrchestrator::new(standard_config(), standard_handles(RIPE, vec![])).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = orchestrator.analyze(&photo(), &cancel).await.unwrap_err();
    assert!(matches!(err, GradeError::Cancelled));
}

#[tokio::test]
async fn cancellation_abandons_the_fan_out() {
    let handles = ModelHandles::new()
        .with_detection(colour_detector())
        .with_ripeness(slow(Duration::from_millis(500), classifier_favouring(RIPE, 6)))
        .with_defect(fixed_detector(3, vec![]));
    let config = standard_config().with_model_timeout(None);
    let orchestrator = InferenceOrchestrator::new(config, handles).unwrap();

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_millis(400), orchestrator.analyze(&photo(), &cancel))
        .await
        .expect("cancellation should end the analysis early")
        .unwrap_err();
    assert!(matches!(err, GradeError::Cancelled));
}

#[tokio::test]
async fn batch_reports_each_image() {
    let orchestrator = InferenceOrchestrator::new(standard_config(), standard_handles(RIPE, vec![])).unwrap();
    let images = vec![photo(), empty_photo(0, 0), photo()];

    let report = orchestrator.analyze_batch(&images, &CancelToken::new()).await;
    assert!(!report.cancelled);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.graded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.results[1], Err(GradeError::InvalidInput(_))));
}

#[tokio::test]
async fn cancelled_batch_stops_between_images() {
    let orchestrator = InferenceOrchestrator::new(standard_config(), standard_handles(RIPE, vec![])).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = orchestrator.analyze_batch(&[photo(), photo()], &cancel).await;
    assert!(report.cancelled);
    assert!(report.results.is_empty());
}
