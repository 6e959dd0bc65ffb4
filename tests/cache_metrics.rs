use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebuggingRecorder, Snapshotter};
use tempfile::TempDir;
use time::macros::datetime;

use daoctl::cache::{CacheConfig, CacheLoader};
use daoctl::config::PrefetchSettings;
use daoctl::graph::{Navigator, PageBuilder};
use daoctl::infra::telemetry;
use daoctl::testing::{MemorySource, document, edge, hash_for};

fn metric_names(snapshotter: &Snapshotter) -> HashSet<String> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect()
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let dir = TempDir::new().expect("tmp dir");
    let a = document(1, "a", "dho");
    let b = document(2, "b", "member");
    let remote = MemorySource::new(
        vec![a.clone(), b.clone()],
        vec![edge(1, &a, &b, "member", datetime!(2021-01-01 00:00 UTC))],
    );
    remote.fail_edges(&b.hash);

    let config = CacheConfig {
        snapshot_path: dir.path().join(".graph.cache"),
        ..Default::default()
    };
    let loader = Arc::new(CacheLoader::new(remote, config));

    // Rebuild, then a hit and a miss.
    loader.resolve(a.hash.as_str()).await.expect("cached document");
    assert!(loader.resolve(hash_for("missing").as_str()).await.is_err());

    // Page miss, then hit; the neighbor prefetch fails.
    let navigator = Navigator::new(
        Arc::new(PageBuilder::new(Arc::clone(&loader))),
        &PrefetchSettings {
            enabled: true,
            concurrency: NonZeroU32::new(1).expect("non zero"),
        },
    );
    navigator.step(a.hash.as_str()).await.expect("page miss");
    navigator.step(a.hash.as_str()).await.expect("page hit");

    let mut names = metric_names(&snapshotter);
    for _ in 0..100 {
        if names.contains(telemetry::PREFETCH_FAILED_TOTAL) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        names = metric_names(&snapshotter);
    }
    navigator.shutdown();

    for expected in [
        telemetry::DOCUMENT_HIT_TOTAL,
        telemetry::DOCUMENT_MISS_TOTAL,
        telemetry::PAGE_HIT_TOTAL,
        telemetry::PAGE_MISS_TOTAL,
        telemetry::REBUILD_TOTAL,
        telemetry::REBUILD_MS,
        telemetry::PREFETCH_FAILED_TOTAL,
    ] {
        assert!(names.contains(expected), "missing metric `{expected}`: {names:?}");
    }
}
