//! Indexer status storage tests.

use super::test_db;
use crate::health;

#[tokio::test]
async fn admission_increments_and_stops_at_the_limit() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    for i in 0..3 {
        assert!(
            db.admit_query("idx1", Some(3), now).await.unwrap(),
            "query {i} should be admitted under a limit of 3"
        );
    }
    assert!(
        !db.admit_query("idx1", Some(3), now).await.unwrap(),
        "exactly queryLimit queries this hour: the next one is refused"
    );

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.queries_this_hour, 3, "refusal must not overshoot the counter");
}

#[tokio::test]
async fn admission_resumes_after_the_hour_window_lapses() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    assert!(db.admit_query("idx1", Some(1), now).await.unwrap());
    assert!(!db.admit_query("idx1", Some(1), now).await.unwrap());

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    let reset_at = status.hour_reset_at.unwrap();
    assert_eq!(reset_at, now + 3600);

    // at hour_reset_at the counter resets and admission resumes
    assert!(db.admit_query("idx1", Some(1), reset_at).await.unwrap());
    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.queries_this_hour, 1);
    assert_eq!(status.hour_reset_at.unwrap(), reset_at + 3600);
}

#[tokio::test]
async fn grabs_are_counted_separately_from_queries() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    assert!(db.admit_query("idx1", Some(1), now).await.unwrap());
    assert!(
        db.admit_grab("idx1", Some(1), now).await.unwrap(),
        "grab quota is independent of the query quota"
    );
    assert!(!db.admit_grab("idx1", Some(1), now).await.unwrap());

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.queries_this_hour, 1);
    assert_eq!(status.grabs_this_hour, 1);
}

#[tokio::test]
async fn unlimited_indexers_always_admit() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    for _ in 0..50 {
        assert!(db.admit_query("idx1", None, now).await.unwrap());
    }
}

#[tokio::test]
async fn failure_ladder_matches_the_backoff_table() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    // after k consecutive failures, disabled_until = lastFailure + backoff[min(k-1, 9)]
    for k in 1..=12i64 {
        let disabled_until = db
            .record_indexer_failure("idx1", "connection refused", now)
            .await
            .unwrap();
        assert_eq!(
            disabled_until,
            now + health::backoff_seconds(k),
            "failure {k} must land on the right backoff rung"
        );
    }

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.consecutive_failures, 12);
    assert_eq!(
        status.disabled_until.unwrap(),
        now + 24 * 3600,
        "the ladder caps at 24 hours"
    );
}

#[tokio::test]
async fn success_clears_the_failure_state() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    db.record_indexer_failure("idx1", "boom", now).await.unwrap();
    db.record_indexer_success("idx1", now + 10).await.unwrap();

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.disabled_until.is_none());
    assert!(status.last_failure_reason.is_none());
    assert_eq!(status.last_success_at, Some(now + 10));
}

#[tokio::test]
async fn rate_limit_does_not_touch_the_failure_counter() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    db.record_indexer_rate_limited("idx1", now + 300).await.unwrap();

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.rate_limited_until, Some(now + 300));
    assert_eq!(
        status.consecutive_failures, 0,
        "a 429 is not a failure — no backoff rung is consumed"
    );
}

#[tokio::test]
async fn manual_reset_clears_everything() {
    let (db, _dir) = test_db().await;
    let now = chrono::Utc::now().timestamp();

    db.record_indexer_failure("idx1", "boom", now).await.unwrap();
    db.record_indexer_rate_limited("idx1", now + 300).await.unwrap();
    db.admit_query("idx1", Some(10), now).await.unwrap();

    db.reset_indexer_status("idx1").await.unwrap();

    let status = db.get_indexer_status("idx1").await.unwrap().unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.disabled_until.is_none());
    assert!(status.rate_limited_until.is_none());
    assert_eq!(status.queries_this_hour, 0);
    assert_eq!(status.grabs_this_hour, 0);
}
