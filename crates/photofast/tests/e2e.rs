//! End-to-end flows over the in-memory collaborators.

mod common;

use std::time::Duration;

use common::{Harness, PhotoBuilder, MODIFIED_AT};
use photofast::{load_config_from_str, BatchReport, CompressionMarker, SkipReason};

#[tokio::test]
async fn selection_of_mixed_items_yields_one_aggregate_report() {
    let mut harness = Harness::new();

    let fresh = PhotoBuilder::new("fresh").register(&harness);
    let small = PhotoBuilder::new("small").size(50 * 1024).register(&harness);
    let screenshot = PhotoBuilder::new("shot")
        .name("Screenshot_2026-08-01.png")
        .screenshot()
        .register(&harness);
    let marked = PhotoBuilder::new("marked").register(&harness);
    harness
        .markers
        .set_marker(&marked, CompressionMarker::new(80, MODIFIED_AT + 5_000));
    let failing = PhotoBuilder::new("failing").register(&harness);
    harness.compressor.fail_for(&failing);

    let batch_id = harness
        .pipeline
        .process_selection(vec![fresh, small, screenshot, marked, failing], "selection")
        .await;

    assert!(!harness.pipeline.aggregator().is_live(&batch_id));

    match harness.reports.try_recv().unwrap() {
        BatchReport::Aggregate {
            bounded, summary, ..
        } => {
            assert!(bounded);
            assert_eq!(summary.total, 5);
            assert_eq!(summary.succeeded, 1);
            assert_eq!(summary.skipped, 3);
            assert_eq!(summary.failed, 1);
            assert_eq!(summary.skip_reasons["already_small"], 1);
            assert_eq!(summary.skip_reasons["basic_check_failed"], 1);
            assert_eq!(summary.skip_reasons["already_compressed"], 1);
            assert_eq!(summary.original_size_total, 2_000_000);
            assert_eq!(summary.compressed_size_total, 1_200_000);
        }
        other => panic!("Expected aggregate report, got {:?}", other),
    }
    assert!(harness.reports.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn detection_burst_collapses_into_one_report() {
    let mut harness = Harness::new();

    for key in ["a", "b", "c"] {
        let item = PhotoBuilder::new(key).register(&harness);
        harness.pipeline.process_detected(item, "change-events").await;
        tokio::time::advance(Duration::from_secs(2)).await;
    }

    assert!(harness.reports.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(9)).await;
    tokio::task::yield_now().await;

    match harness.reports.try_recv().unwrap() {
        BatchReport::Aggregate {
            bounded, summary, ..
        } => {
            assert!(!bounded);
            assert_eq!(summary.succeeded, 3);
        }
        other => panic!("Expected aggregate report, got {:?}", other),
    }
    assert!(harness.reports.try_recv().is_err());
}

#[tokio::test]
async fn modified_item_is_recompressed_despite_marker() {
    let mut harness = Harness::new();

    // Marked long ago, then edited: the marker no longer covers the file.
    let item = PhotoBuilder::new("edited")
        .modified_at(MODIFIED_AT)
        .register(&harness);
    harness.markers.set_marker(
        &item,
        CompressionMarker::new(80, MODIFIED_AT - 3600 * 1000),
    );

    let batch_id = harness
        .pipeline
        .process_selection(vec![item], "selection")
        .await;
    assert!(!harness.pipeline.aggregator().is_live(&batch_id));

    match harness.reports.try_recv().unwrap() {
        BatchReport::Individual { record, .. } => {
            assert!(record.succeeded());
        }
        other => panic!("Expected individual report, got {:?}", other),
    }
}

#[tokio::test]
async fn repeated_checks_on_unchanged_item_hit_the_cache() {
    let harness = Harness::new();
    let item = PhotoBuilder::new("cached").register(&harness);
    harness
        .markers
        .set_marker(&item, CompressionMarker::new(80, MODIFIED_AT + 1_000));

    for _ in 0..3 {
        let decision = harness.pipeline.engine().evaluate(&item, false).await;
        assert_eq!(decision.reason, SkipReason::AlreadyCompressed);
    }

    let stats = harness.pipeline.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn settings_changes_apply_to_in_flight_pipeline() {
    let mut harness = Harness::new();
    let wa_first = PhotoBuilder::new("wa1")
        .path("/storage/WhatsApp/Media/IMG_wa1.jpg")
        .register(&harness);
    let wa_second = PhotoBuilder::new("wa2")
        .path("/storage/WhatsApp/Media/IMG_wa2.jpg")
        .register(&harness);

    harness
        .pipeline
        .process_selection(vec![wa_first], "selection")
        .await;
    match harness.reports.try_recv().unwrap() {
        BatchReport::Aggregate { summary, .. } => {
            assert_eq!(summary.skip_reasons["messenger_photo"], 1);
        }
        other => panic!("Expected aggregate report, got {:?}", other),
    }

    let mut settings = harness.settings.snapshot();
    settings.ignore_messenger_photos = false;
    harness.settings.update(settings);

    harness
        .pipeline
        .process_selection(vec![wa_second], "selection")
        .await;
    match harness.reports.try_recv().unwrap() {
        BatchReport::Individual { record, .. } => assert!(record.succeeded()),
        other => panic!("Expected individual report, got {:?}", other),
    }
}

#[tokio::test]
async fn config_file_drives_pipeline_policy() {
    let config = load_config_from_str(
        r#"{
            "settings": {"quality": 70, "ignoreMessengerPhotos": true},
            "policy": {"optimumFileSize": 1000000, "appDirectoryName": "PhotoFast"}
        }"#,
    )
    .unwrap();

    let mut harness = Harness::with(config.settings, config.policy);

    // 900 KB sits under the raised optimum size: nothing to do.
    let item = PhotoBuilder::new("mid").size(900_000).register(&harness);
    harness
        .pipeline
        .process_selection(vec![item], "selection")
        .await;

    match harness.reports.try_recv().unwrap() {
        BatchReport::Aggregate { summary, .. } => {
            assert_eq!(summary.skip_reasons["already_small"], 1);
        }
        other => panic!("Expected aggregate report, got {:?}", other),
    }
}
