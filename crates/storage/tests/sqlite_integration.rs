use chauffeur_core::model::{ConsentPreferences, PersistedSession, Role, User, UserId, VideoId};
use chauffeur_core::time::fixed_now;
use chauffeur_core::training::CompletionSet;
use storage::repository::{
    CompletionRepository, ConsentRepository, CredentialRepository, SessionRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn user(id: u64) -> User {
    User {
        id: UserId::new(id),
        first_name: "Grace".into(),
        last_name: "Chauffeur".into(),
        email: "grace@example.com".into(),
        phone: Some("+44 20 0000 0000".into()),
        role: Role::Driver,
        is_exam_completed: false,
        created_at: Some(fixed_now()),
    }
}

fn set(ids: &[u64]) -> CompletionSet {
    ids.iter().copied().map(VideoId::new).collect()
}

#[tokio::test]
async fn sqlite_completions_replace_and_scope_by_user() {
    let repo = connect("memdb_completions").await;

    repo.put_completions(UserId::new(1), &set(&[3, 5])).await.unwrap();
    repo.put_completions(UserId::new(2), &set(&[9])).await.unwrap();
    assert_eq!(
        repo.get_completions(UserId::new(1)).await.unwrap(),
        set(&[3, 5])
    );

    // a put replaces the whole set
    repo.put_completions(UserId::new(1), &set(&[5])).await.unwrap();
    assert_eq!(repo.get_completions(UserId::new(1)).await.unwrap(), set(&[5]));
    assert_eq!(repo.get_completions(UserId::new(2)).await.unwrap(), set(&[9]));
    assert!(repo.get_completions(UserId::new(3)).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_session_slice_round_trips() {
    let repo = connect("memdb_session").await;
    assert_eq!(repo.load_session().await.unwrap(), None);

    let session = PersistedSession {
        user: user(7),
        session_started_at: fixed_now(),
    };
    repo.save_session(&session).await.unwrap();

    let mut updated = session.clone();
    updated.user.is_exam_completed = true;
    repo.save_session(&updated).await.unwrap();
    assert_eq!(repo.load_session().await.unwrap(), Some(updated));

    repo.clear_session().await.unwrap();
    assert_eq!(repo.load_session().await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_refresh_token_rotates() {
    let repo = connect("memdb_credentials").await;
    assert_eq!(repo.load_refresh_token().await.unwrap(), None);

    repo.save_refresh_token("first").await.unwrap();
    repo.save_refresh_token("second").await.unwrap();
    assert_eq!(
        repo.load_refresh_token().await.unwrap().as_deref(),
        Some("second")
    );

    repo.clear_refresh_token().await.unwrap();
    assert_eq!(repo.load_refresh_token().await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_consent_round_trips() {
    let repo = connect("memdb_consent").await;
    let prefs = ConsentPreferences::new(true, false, fixed_now());
    repo.save_consent(&prefs).await.unwrap();

    let loaded = repo.get_consent().await.unwrap().expect("stored");
    assert!(loaded.necessary());
    assert!(loaded.analytics);
    assert!(!loaded.marketing);
    assert_eq!(loaded.decided_at, fixed_now());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    repo.put_completions(UserId::new(1), &set(&[1])).await.unwrap();
}
