//! Cursor pagination, the page cache and load failures.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use kgrid_lib::Error;
use kgrid_lib::error::ApiError;
use kgrid_lib::grid::OperationKind;
use kgrid_lib::model::TableMetadata;
use kgrid_lib::page::Cursor;
use kgrid_lib::remote::RemoteCall;
use kgrid_lib::store::MemoryBackend;
use kgrid_lib::store::OverlayStore;

#[tokio::test]
async fn test_twenty_five_rows_in_pages_of_twenty() {
    let remote = seeded_remote(25);
    let grid = grid(&remote);

    let first = grid.mount().await.unwrap();
    assert!(first.is_fresh());
    assert_eq!(first.data().len(), 20);
    assert_eq!(first.data().next_cursor(), Some(&Cursor::new("20")));
    assert!(grid.has_more());

    let second = grid.next_page().await.unwrap().unwrap();
    assert_eq!(second.data().len(), 5);
    assert!(!second.data().has_more());
    assert!(!grid.has_more());
    assert_eq!(grid.page_index(), 1);
    assert_eq!(grid.display_rows().len(), 5);

    assert!(grid.next_page().await.unwrap().is_none());
    assert_eq!(grid.page_index(), 1);
    assert_eq!(remote.scroll_calls(), 2);
}

#[tokio::test]
async fn test_repeated_fetch_returns_cached_page() {
    let remote = seeded_remote(25);
    let grid = grid(&remote);

    let first = grid.fetch_page(None, 5).await.unwrap();
    let second = grid.fetch_page(None, 5).await.unwrap();

    assert!(first.cache.is_miss());
    assert!(second.is_cached());
    assert!(Arc::ptr_eq(first.data(), second.data()));
    assert_eq!(first.cached_at(), second.cached_at());
    assert_eq!(remote.scroll_calls(), 1);
}

#[tokio::test]
async fn test_backward_navigation_never_fetches() {
    let remote = seeded_remote(25);
    let grid = grid(&remote);
    grid.mount().await.unwrap();
    grid.next_page().await.unwrap();

    let back = grid.prev_page().unwrap();
    assert!(back.is_cached());
    assert_eq!(grid.page_index(), 0);
    assert!(grid.prev_page().is_none());

    let forward = grid.next_page().await.unwrap().unwrap();
    assert!(forward.is_cached());
    assert_eq!(grid.page_index(), 1);
    assert_eq!(remote.scroll_calls(), 2);
}

#[tokio::test]
async fn test_zero_page_size_is_rejected() {
    let remote = seeded_remote(3);
    let grid = grid(&remote);

    let result = grid.fetch_page(None, 0).await;
    assert!(matches!(result, Err(Error::InvalidPageSize)));
    assert!(grid.take_notices().is_empty());
    assert_eq!(remote.scroll_calls(), 0);
}

#[tokio::test]
async fn test_failed_fetch_keeps_cache_and_can_be_retried() {
    let remote = seeded_remote(25);
    let grid = grid(&remote);
    grid.mount().await.unwrap();

    remote.fail_next(RemoteCall::Scroll);
    assert!(grid.next_page().await.is_err());

    assert!(!grid.is_loading());
    assert_eq!(grid.page_index(), 0);
    assert_eq!(grid.display_rows().len(), 20);
    let notices = grid.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, OperationKind::Load);

    assert!(grid.retry().await.unwrap());
    assert_eq!(grid.page_index(), 1);
    assert!(!grid.retry().await.unwrap());
}

#[tokio::test]
async fn test_show_all_uses_metadata_count_until_reload() {
    let remote = seeded_remote(25);
    remote.set_metadata(TABLE, TableMetadata::new(25));
    let grid = grid(&remote);
    grid.mount().await.unwrap();
    assert_eq!(grid.row_count(), 25);

    let all = grid.show_all().await.unwrap();
    assert_eq!(all.data().len(), 25);
    assert!(grid.is_full_dataset());
    assert!(!grid.has_more());
    assert!(grid.prev_page().is_none());

    let first = grid.reload().await.unwrap();
    assert_eq!(first.data().len(), 20);
    assert!(!grid.is_full_dataset());
    assert_eq!(grid.page_index(), 0);
}

#[tokio::test]
async fn test_show_all_falls_back_without_metadata() {
    let remote = seeded_remote(25);
    let grid = grid_with(
        config().with_show_all_fallback_limit(100),
        &remote,
        OverlayStore::new(MemoryBackend::new()),
    );
    grid.mount().await.unwrap();

    assert_eq!(grid.show_all().await.unwrap().data().len(), 25);
}

#[tokio::test]
async fn test_show_all_with_stale_count_warns() {
    let remote = seeded_remote(25);
    remote.set_metadata(TABLE, TableMetadata::new(10));
    let grid = grid(&remote);
    grid.mount().await.unwrap();
    assert!(grid.take_notices().is_empty());

    let all = grid.show_all().await.unwrap();

    assert_eq!(all.data().len(), 10);
    let notices = grid.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, OperationKind::Load);
    assert!(notices[0].message.contains("first 10 rows"));
}

#[tokio::test]
async fn test_display_columns_follow_column_config() {
    let remote = seeded_remote(2);
    let grid = grid(&remote);
    assert_eq!(grid.display_columns(), vec!["Name", "City"]);

    grid.mount().await.unwrap();
    assert_eq!(grid.display_columns(), vec!["City", "Name"]);
    assert_eq!(grid.display_rows()[0].text("Name"), "Company 0");
}

#[tokio::test(start_paused = true)]
async fn test_hung_scroll_times_out() {
    let remote = seeded_remote(3);
    remote.set_latency(Some(Duration::from_secs(60)));
    let grid = grid_with(
        config().with_request_timeout(Duration::from_secs(1)),
        &remote,
        OverlayStore::new(MemoryBackend::new()),
    );

    let result = grid.mount().await;
    assert!(matches!(result, Err(Error::Api(ApiError::Timeout(_)))));
    assert!(!grid.is_loading());
    assert!(result.unwrap_err().is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_of_one_page_share_a_call() {
    let remote = seeded_remote(10);
    remote.set_latency(Some(Duration::from_millis(10)));
    let grid = grid(&remote);

    let (a, b) = tokio::join!(grid.fetch_page(None, 7), grid.fetch_page(None, 7));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(a.data(), b.data()));
    assert_eq!(remote.scroll_calls(), 1);
    assert!(a.is_cached() != b.is_cached());
}
