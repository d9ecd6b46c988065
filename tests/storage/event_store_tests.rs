//! EventStore interface tests.
//!
//! These tests verify the contract of the EventStore trait.
//! Each storage implementation should run these tests.
//!
//! Stores are shared across the tests in one run, so every test works in its
//! own project and with its own event ids.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use turret::event::{self, EventKey, NewEvent};
use turret::query::{EventFilter, ListQuery, PageRequest};
use turret::storage::{EventStore, StorageError};

/// Base instant for test timestamps.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Build a normalized event the way ingestion would.
pub fn make_event(project_id: i64, event_id: &str, ts: DateTime<Utc>, message: &str) -> NewEvent {
    let payload = json!({
        "event_id": event_id,
        "timestamp": ts.to_rfc3339(),
        "message": message,
        "exception": {"type": "ValueError", "values": [1, 2.5, null]},
    });
    let payload = payload.as_object().cloned().unwrap();
    event::normalize(project_id, payload).expect("test payload should normalize")
}

fn project_query(project_id: i64, page: u32, page_size: u32) -> ListQuery {
    ListQuery {
        filter: EventFilter {
            project_id: Some(project_id),
            ..Default::default()
        },
        page: PageRequest { page, page_size },
    }
}

// =============================================================================
// EventStore::insert tests
// =============================================================================

pub async fn test_insert_and_get_by_id<S: EventStore>(store: &S) {
    let new_event = make_event(1001, "insert-get-1", base_time(), "boom");
    let expected = new_event.clone();

    let id = store.insert(new_event).await.expect("insert should succeed");
    assert!(id > 0, "ids are positive");

    let record = store.get(&EventKey::Id(id)).await.expect("get should succeed");
    assert_eq!(record, expected.into_record(id));
    assert!(record.is_consistent());
}

pub async fn test_insert_assigns_increasing_ids<S: EventStore>(store: &S) {
    let first = store
        .insert(make_event(1002, "ids-1", base_time(), "a"))
        .await
        .unwrap();
    let second = store
        .insert(make_event(1002, "ids-2", base_time(), "b"))
        .await
        .unwrap();
    assert!(second > first, "ids should increase: {} then {}", first, second);
}

pub async fn test_insert_duplicate_event_id_conflicts<S: EventStore>(store: &S) {
    store
        .insert(make_event(1003, "dup-1", base_time(), "first"))
        .await
        .expect("first insert should succeed");

    let result = store
        .insert(make_event(1004, "dup-1", base_time(), "second"))
        .await;
    match result {
        Err(StorageError::Conflict { event_id }) => assert_eq!(event_id, "dup-1"),
        other => panic!("expected Conflict, got {:?}", other),
    }

    let page = store.list(&project_query(1004, 1, 10)).await.unwrap();
    assert_eq!(page.total, 0, "rejected duplicate must not be stored");
}

pub async fn test_insert_preserves_payload<S: EventStore>(store: &S) {
    let mut new_event = make_event(1005, "payload-1", base_time(), "ünïcode ✓");
    new_event
        .event
        .insert("extra".into(), json!({"z": 1, "a": [true, {"n": 1e-7}]}));
    let expected = new_event.event.clone();

    let id = store.insert(new_event).await.unwrap();
    let record = store.get(&EventKey::Id(id)).await.unwrap();
    assert_eq!(record.event, expected);
    let keys: Vec<_> = record.event.keys().cloned().collect();
    assert_eq!(keys, vec!["event_id", "timestamp", "message", "exception", "extra"]);
}

pub async fn test_insert_preserves_subsecond_timestamp<S: EventStore>(store: &S) {
    let ts = base_time() + Duration::nanoseconds(123_456_789);
    let id = store
        .insert(make_event(1006, "nanos-1", ts, "precise"))
        .await
        .unwrap();
    let record = store.get(&EventKey::Id(id)).await.unwrap();
    assert_eq!(record.timestamp, ts);
}

pub async fn test_insert_storable_year_bounds_list_in_order<S: EventStore>(store: &S) {
    let earliest = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap();
    let latest = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()
        + Duration::nanoseconds(999_999_999);

    let early_id = store
        .insert(make_event(1008, "bounds-earliest", earliest, "b"))
        .await
        .unwrap();
    let late_id = store
        .insert(make_event(1008, "bounds-latest", latest, "b"))
        .await
        .unwrap();
    store
        .insert(make_event(1008, "bounds-middle", base_time(), "b"))
        .await
        .unwrap();

    let page = store.list(&project_query(1008, 1, 10)).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["bounds-latest", "bounds-middle", "bounds-earliest"]);

    assert_eq!(store.get(&EventKey::Id(early_id)).await.unwrap().timestamp, earliest);
    assert_eq!(store.get(&EventKey::Id(late_id)).await.unwrap().timestamp, latest);
}

// =============================================================================
// EventStore::get tests
// =============================================================================

pub async fn test_get_by_event_id<S: EventStore>(store: &S) {
    let id = store
        .insert(make_event(1007, "lookup-by-event-id", base_time(), "x"))
        .await
        .unwrap();
    let record = store
        .get(&EventKey::EventId("lookup-by-event-id".into()))
        .await
        .unwrap();
    assert_eq!(record.id, id);
}

pub async fn test_get_missing_is_not_found<S: EventStore>(store: &S) {
    match store.get(&EventKey::Id(i64::MAX)).await {
        Err(StorageError::NotFound(EventKey::Id(id))) => assert_eq!(id, i64::MAX),
        other => panic!("expected NotFound, got {:?}", other),
    }
    let key = EventKey::EventId("no-such-event".into());
    match store.get(&key).await {
        Err(StorageError::NotFound(k)) => assert_eq!(k, key),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

// =============================================================================
// EventStore::list tests
// =============================================================================

pub async fn test_list_filters_by_project<S: EventStore>(store: &S) {
    store
        .insert(make_event(1010, "proj-a-1", base_time(), "a"))
        .await
        .unwrap();
    store
        .insert(make_event(1010, "proj-a-2", base_time(), "a"))
        .await
        .unwrap();
    store
        .insert(make_event(1011, "proj-b-1", base_time(), "b"))
        .await
        .unwrap();

    let page = store.list(&project_query(1010, 1, 10)).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|e| e.project_id == 1010));
}

pub async fn test_list_time_range_is_inclusive<S: EventStore>(store: &S) {
    for hour in 0..5 {
        let ts = base_time() + Duration::hours(hour);
        store
            .insert(make_event(1012, &format!("range-{}", hour), ts, "r"))
            .await
            .unwrap();
    }

    let query = ListQuery {
        filter: EventFilter {
            project_id: Some(1012),
            start: Some(base_time() + Duration::hours(1)),
            end: Some(base_time() + Duration::hours(3)),
            search: None,
        },
        page: PageRequest {
            page: 1,
            page_size: 10,
        },
    };
    let page = store.list(&query).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["range-3", "range-2", "range-1"]);
    assert_eq!(page.total, 3);
}

pub async fn test_list_search_substring<S: EventStore>(store: &S) {
    store
        .insert(make_event(1013, "search-1", base_time(), "disk full"))
        .await
        .unwrap();
    store
        .insert(make_event(1013, "search-2", base_time(), "timeout"))
        .await
        .unwrap();

    let mut query = project_query(1013, 1, 10);
    query.filter.search = Some("disk".into());
    let page = store.list(&query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].event_id, "search-1");

    // Matches inside the serialized exception, too.
    query.filter.search = Some("ValueError".into());
    assert_eq!(store.list(&query).await.unwrap().total, 2);

    query.filter.search = Some("DISK".into());
    assert_eq!(store.list(&query).await.unwrap().total, 0, "search is case-sensitive");
}

pub async fn test_list_search_treats_wildcards_literally<S: EventStore>(store: &S) {
    store
        .insert(make_event(1014, "wild-1", base_time(), "cpu at 100% load"))
        .await
        .unwrap();
    store
        .insert(make_event(1014, "wild-2", base_time(), "cpu at 1000 load"))
        .await
        .unwrap();
    store
        .insert(make_event(1014, "wild-3", base_time(), "snake_case name"))
        .await
        .unwrap();
    store
        .insert(make_event(1014, "wild-4", base_time(), "snakeXcase name"))
        .await
        .unwrap();

    let mut query = project_query(1014, 1, 10);
    query.filter.search = Some("100%".into());
    let page = store.list(&query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].event_id, "wild-1");

    query.filter.search = Some("snake_case".into());
    let page = store.list(&query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].event_id, "wild-3");
}

pub async fn test_list_orders_most_recent_first<S: EventStore>(store: &S) {
    let early = store
        .insert(make_event(1015, "order-early", base_time(), "o"))
        .await
        .unwrap();
    let late = store
        .insert(make_event(1015, "order-late", base_time() + Duration::hours(1), "o"))
        .await
        .unwrap();
    // Same timestamp as `early`, inserted later: higher id sorts first.
    let tie = store
        .insert(make_event(1015, "order-tie", base_time(), "o"))
        .await
        .unwrap();

    let page = store.list(&project_query(1015, 1, 10)).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![late, tie, early]);
}

pub async fn test_list_pages_cover_all_matches<S: EventStore>(store: &S) {
    for i in 0..7 {
        let ts = base_time() + Duration::minutes(i);
        store
            .insert(make_event(1016, &format!("pages-{}", i), ts, "p"))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    for page_no in 1..=3 {
        let page = store.list(&project_query(1016, page_no, 3)).await.unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.page, page_no);
        assert_eq!(page.page_size, 3);
        assert_eq!(page.total_pages(), 3);
        seen.extend(page.items.into_iter().map(|e| e.event_id));
    }

    let expected: Vec<_> = (0..7).rev().map(|i| format!("pages-{}", i)).collect();
    assert_eq!(seen, expected, "pages are disjoint and in order");
}

pub async fn test_list_page_beyond_end_is_empty<S: EventStore>(store: &S) {
    store
        .insert(make_event(1017, "beyond-1", base_time(), "x"))
        .await
        .unwrap();

    let page = store.list(&project_query(1017, 5, 10)).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 1);
}

pub async fn test_list_no_matches<S: EventStore>(store: &S) {
    let page = store.list(&project_query(1999, 1, 10)).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages(), 0);
}

// =============================================================================
// Concurrency tests (need a store shared across tasks)
// =============================================================================

/// Count and page of one listing agree while inserts land concurrently.
pub async fn test_list_count_matches_page_under_writes<S: EventStore + 'static>(store: Arc<S>) {
    const PROJECT: i64 = 4;
    const WRITES: usize = 120;
    const PAGE_SIZE: u32 = 50;

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..WRITES {
                store
                    .insert(make_event(PROJECT, &format!("snapshot-{}", i), base_time(), "s"))
                    .await
                    .expect("insert should succeed");
            }
        })
    };

    let mut last_total = 0;
    while !writer.is_finished() {
        let page = store
            .list(&project_query(PROJECT, 1, PAGE_SIZE))
            .await
            .expect("list should succeed");
        assert_eq!(
            page.items.len() as u64,
            page.total.min(u64::from(PAGE_SIZE)),
            "items and total come from one snapshot"
        );
        assert!(page.total >= last_total, "total never goes backwards");
        last_total = page.total;
        tokio::task::yield_now().await;
    }
    writer.await.expect("writer should not panic");

    let page = store.list(&project_query(PROJECT, 1, PAGE_SIZE)).await.unwrap();
    assert_eq!(page.total, WRITES as u64);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all EventStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_event_store_tests {
    ($store:expr) => {
        use $crate::storage::event_store_tests::*;

        // insert tests
        test_insert_and_get_by_id($store).await;
        println!("  test_insert_and_get_by_id: PASSED");

        test_insert_assigns_increasing_ids($store).await;
        println!("  test_insert_assigns_increasing_ids: PASSED");

        test_insert_duplicate_event_id_conflicts($store).await;
        println!("  test_insert_duplicate_event_id_conflicts: PASSED");

        test_insert_preserves_payload($store).await;
        println!("  test_insert_preserves_payload: PASSED");

        test_insert_preserves_subsecond_timestamp($store).await;
        println!("  test_insert_preserves_subsecond_timestamp: PASSED");

        test_insert_storable_year_bounds_list_in_order($store).await;
        println!("  test_insert_storable_year_bounds_list_in_order: PASSED");

        // get tests
        test_get_by_event_id($store).await;
        println!("  test_get_by_event_id: PASSED");

        test_get_missing_is_not_found($store).await;
        println!("  test_get_missing_is_not_found: PASSED");

        // list tests
        test_list_filters_by_project($store).await;
        println!("  test_list_filters_by_project: PASSED");

        test_list_time_range_is_inclusive($store).await;
        println!("  test_list_time_range_is_inclusive: PASSED");

        test_list_search_substring($store).await;
        println!("  test_list_search_substring: PASSED");

        test_list_search_treats_wildcards_literally($store).await;
        println!("  test_list_search_treats_wildcards_literally: PASSED");

        test_list_orders_most_recent_first($store).await;
        println!("  test_list_orders_most_recent_first: PASSED");

        test_list_pages_cover_all_matches($store).await;
        println!("  test_list_pages_cover_all_matches: PASSED");

        test_list_page_beyond_end_is_empty($store).await;
        println!("  test_list_page_beyond_end_is_empty: PASSED");

        test_list_no_matches($store).await;
        println!("  test_list_no_matches: PASSED");
    };
}
