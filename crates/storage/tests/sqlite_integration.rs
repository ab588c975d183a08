use chrono::Duration;
use quiz_core::model::{OptionId, QuestionId, QuizId, QuizSession, UserId};
use quiz_core::time::fixed_now;
use storage::repository::{SessionRecord, SessionRepository, Storage};
use storage::sqlite::SqliteRepository;

fn build_session(user: u64, slug: &str) -> QuizSession {
    let mut session =
        QuizSession::new(UserId::new(user), QuizId::new(5), slug, 300, fixed_now()).unwrap();
    let later = fixed_now() + Duration::seconds(30);
    session.record_answer(QuestionId::new(1), OptionId::new(10), later);
    session.record_answer(QuestionId::new(2), OptionId::new(21), later);
    session.set_current_question_index(2, later);
    session
}

#[tokio::test]
async fn sqlite_round_trips_the_session_slot() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.load().await.unwrap().is_none());

    let session = build_session(1, "traits");
    repo.save(&SessionRecord::from_session(&session))
        .await
        .unwrap();

    let loaded = repo
        .load()
        .await
        .unwrap()
        .expect("record stored")
        .into_session()
        .unwrap();
    assert_eq!(loaded, session);
    assert_eq!(loaded.answers().len(), 2);
    assert_eq!(loaded.current_question_index(), 2);
}

#[tokio::test]
async fn sqlite_keeps_a_single_slot() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot_single?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.save(&SessionRecord::from_session(&build_session(1, "first")))
        .await
        .unwrap();
    repo.save(&SessionRecord::from_session(&build_session(2, "second")))
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_session")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let loaded = repo.load().await.unwrap().unwrap();
    assert_eq!(loaded.user_id, 2);
    assert_eq!(loaded.slug, "second");

    repo.clear().await.unwrap();
    assert!(repo.load().await.unwrap().is_none());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn storage_sqlite_wires_the_session_repository() {
    let storage = Storage::sqlite("sqlite:file:memdb_slot_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    let session = build_session(3, "closures");
    storage
        .sessions
        .save(&SessionRecord::from_session(&session))
        .await
        .unwrap();

    let loaded = storage.sessions.load().await.unwrap().unwrap();
    assert_eq!(loaded.slug, "closures");
}
