//! Database tests, organized by domain.

mod indexers;

use super::Database;
use tempfile::TempDir;

/// Open a fresh database in a scratch directory.
///
/// Returns the TempDir alongside the handle so the directory outlives the test.
pub(crate) async fn test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::new(&dir.path().join("test.db"))
        .await
        .expect("open test database");
    (db, dir)
}

/// Insert a minimal monitored event and return its id
pub(crate) async fn seed_event(db: &Database, title: &str) -> crate::types::EventId {
    db.insert_event(&super::NewEvent {
        title: title.to_string(),
        sport: "mma".to_string(),
        league: Some("UFC".to_string()),
        home_team: None,
        away_team: None,
        event_date: chrono::Utc::now().timestamp() + 86_400,
        broadcast_time: None,
        external_id: None,
        monitored: true,
        quality_profile_id: None,
    })
    .await
    .expect("insert event")
}
