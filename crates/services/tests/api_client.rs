use std::sync::Arc;

use chauffeur_core::model::{
    PersistedSession, Registration, Role, TokenPair, User, UserId, VideoId,
};
use chauffeur_core::time::{fixed_clock, fixed_now};
use mockito::{Matcher, Server};
use serde_json::json;
use services::{
    ApiClient, ApiConfig, ApiError, ApiRequest, AuthError, AuthService, Clock, Portal,
    SessionEvent, SessionPolicy, SessionStore, TrainingBackend,
};
use storage::repository::{CredentialRepository, InMemoryRepository, SessionRepository};

fn user_json(id: u64, role: &str) -> serde_json::Value {
    json!({
        "id": id,
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "role": role,
        "isExamCompleted": false
    })
}

fn user(id: u64, role: Role) -> User {
    User {
        id: UserId::new(id),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        phone: None,
        role,
        is_exam_completed: false,
        created_at: None,
    }
}

fn client_for(server: &Server, repo: &InMemoryRepository, clock: Clock) -> ApiClient {
    let session = SessionStore::new(clock, Arc::new(repo.clone()), Arc::new(repo.clone()));
    ApiClient::new(ApiConfig::new(&format!("{}/api", server.url())).unwrap(), session).unwrap()
}

async fn signed_in(server: &Server, repo: &InMemoryRepository, role: Role) -> ApiClient {
    let client = client_for(server, repo, fixed_clock());
    client
        .session()
        .sign_in(
            user(1, role),
            &TokenPair {
                access_token: "stale".into(),
                refresh_token: "r1".into(),
            },
        )
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn login_stores_session_and_refresh_token() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(
            json!({"email": "ada@example.com", "password": "correct horse"}),
        ))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "accessToken": "a1",
                "refreshToken": "r1",
                "userDto": user_json(1, "DRIVER")
            })
            .to_string(),
        )
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = client_for(&server, &repo, fixed_clock());
    let auth = AuthService::new(client.clone(), SessionPolicy::default());

    let signed_in = auth
        .login(" ada@example.com ", "correct horse", Portal::Driver)
        .await
        .unwrap();
    login.assert_async().await;

    assert_eq!(signed_in.id, UserId::new(1));
    assert!(client.session().is_authenticated());
    assert_eq!(
        repo.load_refresh_token().await.unwrap().as_deref(),
        Some("r1")
    );
    let persisted = repo.load_session().await.unwrap().expect("persisted");
    assert_eq!(persisted.session_started_at, fixed_now());
}

#[tokio::test]
async fn drivers_cannot_sign_in_to_the_admin_portal() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/auth/login")
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "accessToken": "a1",
                "refreshToken": "r1",
                "userDto": user_json(1, "DRIVER")
            })
            .to_string(),
        )
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = client_for(&server, &repo, fixed_clock());
    let auth = AuthService::new(client.clone(), SessionPolicy::default());

    let err = auth
        .login("ada@example.com", "correct horse", Portal::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotAdmin));
    assert!(!client.session().is_authenticated());
    assert_eq!(repo.load_session().await.unwrap(), None);
    assert_eq!(repo.load_refresh_token().await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let mut server = Server::new_async().await;
    let rejected = server
        .mock("GET", "/api/users/me")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .expect_at_least(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/api/users/me")
        .match_header("authorization", "Bearer fresh")
        .with_header("content-type", "application/json")
        .with_body(user_json(1, "DRIVER").to_string())
        .expect(3)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/auth/refresh")
        .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
        .with_header("content-type", "application/json")
        .with_body(json!({"accessToken": "fresh", "refreshToken": "r2"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = signed_in(&server, &repo, Role::Driver).await;

    let me = || client.send_json::<User>(ApiRequest::get("users/me").authenticated());
    let (a, b, c) = tokio::join!(me(), me(), me());
    for result in [a, b, c] {
        assert_eq!(result.unwrap().id, UserId::new(1));
    }

    refresh.assert_async().await;
    accepted.assert_async().await;
    rejected.assert_async().await;
    assert!(client.refresh_idle());
    assert_eq!(
        client.session().access_token().map(|(token, _)| token).as_deref(),
        Some("fresh")
    );
    assert_eq!(
        repo.load_refresh_token().await.unwrap().as_deref(),
        Some("r2")
    );
}

#[tokio::test]
async fn failed_refresh_expires_the_session() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/users")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/api/auth/refresh")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"refresh token revoked"}"#)
        .expect(1)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = signed_in(&server, &repo, Role::Admin).await;
    let mut events = client.session().subscribe();

    let err = client
        .send(ApiRequest::get("users").authenticated())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::SessionExpired {
            login_route: "/admin/login"
        }
    ));
    assert_eq!(client.session().user(), None);
    assert_eq!(repo.load_session().await.unwrap(), None);
    assert_eq!(repo.load_refresh_token().await.unwrap(), None);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Expired {
            login_route: "/admin/login"
        }
    );
}

#[tokio::test]
async fn a_second_401_is_not_retried_again() {
    let mut server = Server::new_async().await;
    let me = server
        .mock("GET", "/api/users/me")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/api/auth/refresh")
        .with_header("content-type", "application/json")
        .with_body(json!({"accessToken": "fresh", "refreshToken": "r2"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = signed_in(&server, &repo, Role::Driver).await;
    let err = client
        .send(ApiRequest::get("users/me").authenticated())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    me.assert_async().await;
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn backend_messages_are_surfaced() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/auth/login")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Invalid email or password"}"#)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = client_for(&server, &repo, fixed_clock());
    let err = client
        .send(
            ApiRequest::post("auth/login")
                .json(&json!({"email": "x@example.com", "password": "nope"}))
                .unwrap(),
        )
        .await
        .unwrap_err();

    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn authenticated_requests_need_a_session() {
    let server = Server::new_async().await;
    let repo = InMemoryRepository::new();
    let client = client_for(&server, &repo, fixed_clock());

    let err = client
        .send(ApiRequest::get("users/me").authenticated())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotSignedIn));
}

#[tokio::test]
async fn resume_refreshes_then_resyncs_the_user() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/auth/refresh")
        .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
        .with_header("content-type", "application/json")
        .with_body(json!({"accessToken": "a2", "refreshToken": "r2"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let mut synced = user_json(1, "DRIVER");
    synced["isExamCompleted"] = json!(true);
    let me = server
        .mock("GET", "/api/users/me")
        .match_header("authorization", "Bearer a2")
        .with_header("content-type", "application/json")
        .with_body(synced.to_string())
        .expect(1)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    repo.save_session(&PersistedSession {
        user: user(1, Role::Driver),
        session_started_at: fixed_now(),
    })
    .await
    .unwrap();
    repo.save_refresh_token("r1").await.unwrap();

    // two hours into an eight hour session
    let clock = Clock::fixed(fixed_now() + chrono::Duration::hours(2));
    let client = client_for(&server, &repo, clock);
    let auth = AuthService::new(client.clone(), SessionPolicy::default());

    let resumed = auth.resume().await.unwrap().expect("session resumed");
    assert!(resumed.is_exam_completed);
    refresh.assert_async().await;
    me.assert_async().await;
    assert!(client.session().is_authenticated());
    assert_eq!(client.session().started_at(), Some(fixed_now()));
}

#[tokio::test]
async fn resume_past_the_ceiling_expires_without_network() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    repo.save_session(&PersistedSession {
        user: user(1, Role::Admin),
        session_started_at: fixed_now(),
    })
    .await
    .unwrap();
    repo.save_refresh_token("r1").await.unwrap();

    let clock = Clock::fixed(fixed_now() + chrono::Duration::hours(9));
    let client = client_for(&server, &repo, clock);
    let auth = AuthService::new(client.clone(), SessionPolicy::default());

    let err = auth.resume().await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Api(ApiError::SessionExpired {
            login_route: "/admin/login"
        })
    ));
    refresh.assert_async().await;
    assert_eq!(repo.load_refresh_token().await.unwrap(), None);
}

#[tokio::test]
async fn invalid_registration_is_rejected_locally() {
    let mut server = Server::new_async().await;
    let register = server
        .mock("POST", "/api/auth/register")
        .expect(0)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let auth = AuthService::new(
        client_for(&server, &repo, fixed_clock()),
        SessionPolicy::default(),
    );
    let err = auth
        .register(&Registration {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: None,
            password: "short".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Validation(_)));
    register.assert_async().await;
}

#[tokio::test]
async fn logout_notifies_backend_and_clears_locally() {
    let mut server = Server::new_async().await;
    let logout = server
        .mock("POST", "/api/auth/logout")
        .match_header("authorization", "Bearer stale")
        .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = signed_in(&server, &repo, Role::Driver).await;
    let auth = AuthService::new(client.clone(), SessionPolicy::default());

    // a failing backend does not keep the user signed in
    auth.logout().await;
    logout.assert_async().await;
    assert_eq!(client.session().user(), None);
    assert_eq!(repo.load_refresh_token().await.unwrap(), None);
}

#[tokio::test]
async fn video_paging_stops_when_the_backend_does_not_advance() {
    let mut server = Server::new_async().await;
    // ignores ?page and keeps serving the first page
    let list = server
        .mock("GET", "/api/videos")
        .match_query(Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": [{"id": 3, "title": "Greeting guests", "videoOrder": 1, "duration": 95.0}],
                "currentPage": 1,
                "totalPages": 2
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = signed_in(&server, &repo, Role::Driver).await;

    let videos = tokio::time::timeout(std::time::Duration::from_secs(3), client.list_videos())
        .await
        .expect("paging loop must terminate")
        .unwrap();

    assert_eq!(videos.len(), 1);
    list.assert_async().await;
}

#[tokio::test]
async fn video_paging_is_capped_by_the_first_page_count() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/api/videos")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": [{"id": 3, "title": "A", "duration": 1.0}], "currentPage": 1, "totalPages": 2})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    // a backend that keeps growing its page count
    let second = server
        .mock("GET", "/api/videos")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": [{"id": 5, "title": "B", "duration": 1.0}], "currentPage": 2, "totalPages": 9})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let beyond = server
        .mock("GET", "/api/videos")
        .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
        .expect(0)
        .create_async()
        .await;

    let repo = InMemoryRepository::new();
    let client = signed_in(&server, &repo, Role::Driver).await;

    let videos = client.list_videos().await.unwrap();
    assert_eq!(
        videos.iter().map(|v| v.id).collect::<Vec<_>>(),
        vec![VideoId::new(3), VideoId::new(5)]
    );
    first.assert_async().await;
    second.assert_async().await;
    beyond.assert_async().await;
}
