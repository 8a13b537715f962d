//! End-to-end tests for the capture -> feedback -> retraining flow

use std::path::Path;

use tirelearn::config::{Config, StorageConfig};
use tirelearn::learning::RetrainTrigger;
use tirelearn::samples::{LabelCorrections, SampleMetadata, TireCondition};
use tirelearn::server::{build_state, ServerState};

fn test_state(root: &Path, min_samples: usize) -> ServerState {
    let mut config = Config::default();
    config.storage = StorageConfig {
        data_dir: Some(root.to_path_buf()),
    };
    config.retraining.min_samples = min_samples;
    config.training.epochs = 1;
    config.training.synthetic_samples = 2;
    build_state(config).expect("state wiring")
}

fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(48, 48, image::Rgb([110, 80, 50]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

async fn capture(state: &ServerState, tire: &str) -> tirelearn::TrainingSample {
    state
        .coordinator
        .on_photo_captured(tire, None, &jpeg_bytes(), SampleMetadata::default())
        .await
        .expect("capture")
}

#[tokio::test]
async fn retraining_fires_exactly_once_at_the_volume_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 50);

    for i in 0..49 {
        capture(&state, &format!("tire-{i}")).await;
    }
    assert!(
        state.coordinator.jobs().list().unwrap().is_empty(),
        "49 samples are below a 50-sample threshold"
    );

    capture(&state, "tire-49").await;
    let jobs = state.coordinator.jobs().list().unwrap();
    assert_eq!(jobs.len(), 1, "the 50th sample triggers exactly once");
    assert_eq!(jobs[0].trigger, RetrainTrigger::Scheduled);
    assert_eq!(jobs[0].sample_count, 50);

    // The cooldown keeps the 51st capture from triggering again.
    capture(&state, "tire-50").await;
    assert_eq!(state.coordinator.jobs().list().unwrap().len(), 1);
}

#[tokio::test]
async fn forced_feedback_below_the_volume_floor_updates_stats_but_never_trains() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 50);

    let mut sample_ids = Vec::new();
    for i in 0..12 {
        sample_ids.push(capture(&state, &format!("tire-{i}")).await.id);
    }

    state
        .coordinator
        .on_user_feedback("tire-9", &sample_ids[9], 5, None)
        .await
        .expect("feedback");

    let stats = state.coordinator.get_learning_stats().unwrap();
    assert_eq!(stats.total_samples, 12);
    assert_eq!(stats.user_feedback_count, 1);
    assert!((stats.average_user_rating - 5.0).abs() < f64::EPSILON);
    assert!(
        state.coordinator.jobs().list().unwrap().is_empty(),
        "rating 5 forces the cooldown away, not the volume floor"
    );
}

#[tokio::test]
async fn corrections_overwrite_labels_and_mark_expert_validation() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 50);
    let sample = capture(&state, "tire-1").await;

    let corrections = LabelCorrections {
        tread_depth: Some(2.8),
        condition: Some(TireCondition::Poor),
        wear_pattern: Some("edge".to_string()),
    };
    let updated = state
        .coordinator
        .on_user_feedback("tire-1", &sample.id, 2, Some(corrections))
        .await
        .expect("feedback");

    assert!(updated.expert_validation);
    assert_eq!(updated.labels.tread_depth, Some(2.8));
    assert_eq!(updated.labels.condition, Some(TireCondition::Poor));
    assert_eq!(updated.labels.wear_pattern.as_deref(), Some("edge"));

    let reread = state.coordinator.store().read(&sample.id).unwrap();
    assert_eq!(reread, updated);
}

#[tokio::test]
async fn unreachable_model_endpoint_still_yields_valid_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage = StorageConfig {
        data_dir: Some(dir.path().to_path_buf()),
    };
    // TEST-NET address, nothing listens there
    config.inference.endpoint = Some("http://192.0.2.1:9".to_string());
    config.inference.probe_timeout_secs = 1;
    let state = build_state(config).unwrap();

    let analysis = state
        .inference
        .analyze("tire.jpg", &jpeg_bytes())
        .await
        .expect("analysis");

    assert_eq!(analysis.source, tirelearn::inference::AnalysisSource::Mock);
    assert!(analysis.tread_depth.value_mm >= 0.0 && analysis.tread_depth.value_mm <= 10.0);
    let score_sum: f64 = analysis.condition.scores.values().sum();
    assert!((score_sum - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn full_pipeline_produces_artifacts_reports_and_event_log() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 50);

    let results = state.pipeline.run_full_pipeline().await;
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.is_ok()), "empty store trains synthetically");

    // One artifact directory per task.
    for name in [
        "tread-depth-model",
        "condition-classifier-model",
        "wear-pattern-model",
    ] {
        let model_dir = dir.path().join("models").join(name);
        assert!(model_dir.join("model.json").exists(), "{name} manifest");
        assert!(model_dir.join("weights.bin").exists(), "{name} weights");
    }

    // A timestamped evaluation report plus the latest pointer.
    let results_dir = dir.path().join("results");
    assert!(results_dir.join("latest-evaluation-summary.json").exists());
    let reports = std::fs::read_dir(&results_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("evaluation-")
        })
        .count();
    assert_eq!(reports, 1);

    // The event log recorded the run.
    let events = state.pipeline.event_log().read_all().unwrap();
    assert!(events.iter().any(|e| e.event == "pipeline_started"));
    assert!(events.iter().any(|e| e.event == "pipeline_finished"));

    // Deployment made the models visible to the inference service.
    let names = state.inference.loaded_model_names().await;
    assert_eq!(names.len(), 3);
}
