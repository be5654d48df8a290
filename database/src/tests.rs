use crate::Database;
use repostbot_core::CycleStats;
use std::env;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_repostbot_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

#[tokio::test]
async fn test_connection_and_migrations() {
    let db = setup_test_db().await;
    // A fresh store knows nothing.
    assert!(!db.is_posted("-1_1").await.unwrap());
    assert!(!db.is_blacklisted(-1).await.unwrap());
}

#[tokio::test]
async fn test_posted_roundtrip() {
    let db = setup_test_db().await;

    assert!(!db.is_posted("-100_42").await.unwrap());
    db.mark_posted("-100_42").await.unwrap();
    assert!(db.is_posted("-100_42").await.unwrap());

    // Other keys stay unaffected.
    assert!(!db.is_posted("-100_43").await.unwrap());
}

#[tokio::test]
async fn test_mark_posted_is_idempotent() {
    let db = setup_test_db().await;

    db.mark_posted("-5_9").await.unwrap();
    // Recording the same key again must not fail.
    db.mark_posted("-5_9").await.unwrap();
    assert!(db.is_posted("-5_9").await.unwrap());
}

#[tokio::test]
async fn test_blacklist() {
    let db = setup_test_db().await;

    assert!(!db.is_blacklisted(-777).await.unwrap());
    db.add_to_blacklist(-777, "spam farm").await.unwrap();
    assert!(db.is_blacklisted(-777).await.unwrap());

    // Upsert keeps the entry and replaces the reason.
    db.add_to_blacklist(-777, "still a spam farm").await.unwrap();
    assert!(db.is_blacklisted(-777).await.unwrap());
}

#[tokio::test]
async fn test_stats_accumulate_per_day() {
    let db = setup_test_db().await;

    let cycle = CycleStats {
        total_posts: 10,
        published_posts: 3,
        errors: 1,
    };
    db.record_cycle_stats(&cycle).await.unwrap();
    db.record_cycle_stats(&cycle).await.unwrap();

    let today = db.stats_for_today().await.unwrap();
    assert_eq!(today.total_posts, 20);
    assert_eq!(today.published_posts, 6);
    assert_eq!(today.errors, 2);
}
