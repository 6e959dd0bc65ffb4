//! End-to-end walks over a small in-memory document graph.

use std::num::NonZeroU32;
use std::sync::Arc;

use tempfile::TempDir;
use time::macros::datetime;

use daoctl::cache::{CacheConfig, CacheLoader};
use daoctl::config::PrefetchSettings;
use daoctl::graph::{Direction, Navigator, PageBuilder};
use daoctl::prompt::{self, Selection};
use daoctl::testing::{MemorySource, document, edge};

fn loader(remote: Arc<MemorySource>, dir: &TempDir) -> Arc<CacheLoader> {
    let config = CacheConfig {
        snapshot_path: dir.path().join(".graph.cache"),
        ..Default::default()
    };
    Arc::new(CacheLoader::new(remote, config))
}

fn chain() -> Arc<MemorySource> {
    let a = document(1, "a", "dho");
    let b = document(2, "b", "period");
    let c = document(3, "c", "period");
    MemorySource::new(
        vec![a.clone(), b.clone(), c.clone()],
        vec![
            edge(1, &a, &b, "next", datetime!(2021-01-01 00:00 UTC)),
            edge(2, &b, &c, "next", datetime!(2021-01-02 00:00 UTC)),
        ],
    )
}

#[tokio::test]
async fn middle_of_chain_has_one_choice_each_way() {
    let dir = TempDir::new().expect("tmp dir");
    let remote = chain();
    let (a, b, c) = (
        document(1, "a", "dho"),
        document(2, "b", "period"),
        document(3, "c", "period"),
    );
    let loader = loader(remote, &dir);
    let builder = PageBuilder::new(Arc::clone(&loader));

    let page = builder.build(b.hash.as_str()).await.expect("page b");
    assert_eq!(page.primary.hash, b.hash);
    assert_eq!(page.choices.len(), 2);

    let inbound: Vec<_> = page
        .choices
        .iter()
        .filter(|choice| choice.direction == Direction::Inbound)
        .collect();
    let outbound: Vec<_> = page
        .choices
        .iter()
        .filter(|choice| choice.direction == Direction::Outbound)
        .collect();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].neighbor, a.hash);
    assert_eq!(inbound[0].edge_name, "next");
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].neighbor, c.hash);

    let cache = loader.rebuild().await.expect("rebuild");
    assert!(cache.documents_of_type("dho").contains(&a.hash));
}

#[tokio::test]
async fn walk_from_prefix_to_the_end() {
    let dir = TempDir::new().expect("tmp dir");
    let remote = chain();
    let a = document(1, "a", "dho");
    let c = document(3, "c", "period");
    let navigator = Navigator::new(
        Arc::new(PageBuilder::new(loader(remote, &dir))),
        &PrefetchSettings {
            enabled: true,
            concurrency: NonZeroU32::new(2).expect("non zero"),
        },
    );

    let mut page = navigator.step(a.hash.prefix(5)).await.expect("page a");
    assert_eq!(page.primary.hash, a.hash);

    for _ in 0..2 {
        let hits = prompt::matching(&page.choices, Some("NEXT"));
        let outbound = hits
            .iter()
            .find(|(_, choice)| choice.direction == Direction::Outbound)
            .map(|(index, _)| *index)
            .expect("outbound choice");
        let Selection::Pick(index) =
            Selection::parse(&(outbound + 1).to_string(), page.choices.len())
        else {
            panic!("numbered selection should pick a choice");
        };
        let next = page.choices[index].neighbor.to_string();
        page = navigator.step(&next).await.expect("next page");
    }

    assert_eq!(page.primary.hash, c.hash);
    assert!(page.is_terminal());
    navigator.shutdown();
}

#[tokio::test]
async fn second_run_reuses_snapshot() {
    let dir = TempDir::new().expect("tmp dir");
    let b = document(2, "b", "period");

    let first = chain();
    let page = PageBuilder::new(loader(first.clone(), &dir))
        .build(b.hash.as_str())
        .await
        .expect("first run");
    assert_eq!(page.choices.len(), 2);
    assert_eq!(MemorySource::count(&first.calls().fetch_all_documents), 1);

    let second = chain();
    let loader = loader(second.clone(), &dir);
    let document = loader.resolve(b.hash.prefix(5)).await.expect("resolved");
    assert_eq!(document.hash, b.hash);
    assert_eq!(MemorySource::count(&second.calls().fetch_all_documents), 0);
    assert_eq!(MemorySource::count(&second.calls().fetch_document), 0);
}
