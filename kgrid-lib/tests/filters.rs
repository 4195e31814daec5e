//! Debounced, case-insensitive column filters over the merged rows.

mod common;

use std::time::Duration;

use common::*;
use kgrid_lib::model::ColumnConfig;
use kgrid_lib::model::Row;
use kgrid_lib::store::MemoryBackend;
use kgrid_lib::store::OverlayStore;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_filter_applies_after_quiet_period() {
    let remote = seeded_remote(25);
    let grid = grid_with(
        config().with_page_size(100),
        &remote,
        OverlayStore::new(MemoryBackend::new()),
    );
    grid.mount().await.unwrap();

    let started = Instant::now();
    assert!(grid.set_filter("Name", "company 1"));
    assert!(grid.is_filter_pending());
    assert_eq!(grid.display_rows().len(), 25);

    let active = grid.settle_filters().await;

    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(active.get("Name"), Some("company 1"));
    assert!(!grid.is_filter_pending());
    // Company 1 and Company 10 to Company 19.
    assert_eq!(grid.display_rows().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_typing_restarts_the_quiet_period() {
    let remote = seeded_remote(5);
    let grid = grid(&remote);
    grid.mount().await.unwrap();

    let started = Instant::now();
    grid.set_filter("Name", "comp");
    tokio::time::sleep(Duration::from_millis(200)).await;
    grid.set_filter("Name", "company 3");

    grid.settle_filters().await;

    assert!(started.elapsed() >= Duration::from_millis(450));
    assert_eq!(ids(&grid.display_rows()), vec!["q-3"]);
}

#[tokio::test]
async fn test_filters_combine_with_and() {
    let remote = seeded_remote(20);
    let grid = grid(&remote);
    grid.mount().await.unwrap();

    grid.set_filter("Name", "company 1");
    grid.set_filter("City", "BERLIN");
    grid.apply_filters_now();

    // Company 10, 12, 14, 16, 18.
    let rows = grid.display_rows();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.text("City") == "Berlin"));
}

#[tokio::test]
async fn test_filters_cover_added_rows() {
    let remote = seeded_remote(3);
    let grid = grid(&remote);
    grid.mount().await.unwrap();
    grid.insert_row(Row::new("tmp-1").set("Name", "Acme").set("City", "Oslo"))
        .await
        .unwrap();

    grid.set_filter("City", "osl");
    grid.apply_filters_now();

    assert_eq!(ids(&grid.display_rows()), vec!["tmp-1"]);
}

#[tokio::test]
async fn test_empty_query_removes_filter() {
    let remote = seeded_remote(4);
    let grid = grid(&remote);
    grid.mount().await.unwrap();

    grid.set_filter("City", "paris");
    assert_eq!(grid.apply_filters_now().len(), 1);
    assert_eq!(grid.display_rows().len(), 2);

    grid.set_filter("City", "paris");
    assert_eq!(grid.apply_filters_now().len(), 1);
    assert_eq!(grid.display_rows().len(), 2);

    grid.set_filter("City", "   ");
    assert!(grid.apply_filters_now().is_empty());
    assert_eq!(grid.display_rows().len(), 4);
}

#[tokio::test]
async fn test_non_filterable_column_is_ignored() {
    let remote = seeded_remote(4);
    let config = config().with_columns(vec![
        ColumnConfig::new("Name", "company_name"),
        ColumnConfig::new("City", "city").with_filterable(false),
    ]);
    let grid = grid_with(config, &remote, OverlayStore::new(MemoryBackend::new()));
    grid.mount().await.unwrap();

    assert!(!grid.set_filter("City", "paris"));
    assert!(grid.apply_filters_now().is_empty());
    assert_eq!(grid.display_rows().len(), 4);
}

#[tokio::test]
async fn test_clear_filters() {
    let remote = seeded_remote(4);
    let grid = grid(&remote);
    grid.mount().await.unwrap();
    grid.set_filter("Name", "company 2");
    grid.apply_filters_now();
    assert_eq!(grid.display_rows().len(), 1);

    grid.clear_filters();
    grid.apply_filters_now();

    assert!(grid.active_filters().is_empty());
    assert_eq!(grid.display_rows().len(), 4);
}
