//! HTTP client for the chauffeur-service backend.
//!
//! Requests flagged with `requires_auth` carry the bearer token and take part
//! in refresh-on-401; everything else goes out as-is.

mod keeper;
mod refresh;

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use chauffeur_core::model::TokenPair;

use crate::error::ApiError;
use crate::session_store::SessionStore;

pub use keeper::{KeeperExit, SessionKeeper, SessionPolicy};
pub use refresh::RefreshFailure;
use refresh::RefreshGate;

pub mod paths {
    pub const LOGIN: &str = "auth/login";
    pub const REGISTER: &str = "auth/register";
    pub const REFRESH: &str = "auth/refresh";
    pub const LOGOUT: &str = "auth/logout";
    pub const ME: &str = "users/me";
    pub const EXAM_STATUS: &str = "users/me/exam-status";
    pub const USERS: &str = "users";
    pub const VIDEOS: &str = "videos";

    #[must_use]
    pub fn user(id: impl std::fmt::Display) -> String {
        format!("{USERS}/{id}")
    }

    #[must_use]
    pub fn video(id: impl std::fmt::Display) -> String {
        format!("{VIDEOS}/{id}")
    }

    #[must_use]
    pub fn video_order(id: impl std::fmt::Display) -> String {
        format!("{VIDEOS}/{id}/order")
    }

    #[must_use]
    pub fn assessment(id: impl std::fmt::Display) -> String {
        format!("{VIDEOS}/{id}/assessment")
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: Url,
    timeout: Duration,
}

impl ApiConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url.trim())?;
        // keep the last path segment when joining relative endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

/// A backend call, rebuilt for every attempt so it can be retried.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    requires_auth: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            requires_auth: false,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach the bearer token and refresh on 401.
    #[must_use]
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    #[must_use]
    pub fn query<K: Into<String>, V: Into<String>>(
        mut self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// # Errors
    ///
    /// Returns `ApiError::Encode` if the body cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    config: ApiConfig,
    session: SessionStore,
    refresh: RefreshGate,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, session: SessionStore) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                session,
                refresh: RefreshGate::default(),
            }),
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Send a request and decode the JSON response body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures, non-2xx statuses, decode
    /// failures, or an expired session.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(&request).await?;
        Ok(response.json::<T>().await?)
    }

    /// Send a request and discard the response body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport failures, non-2xx statuses, or an
    /// expired session.
    pub async fn send(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(&request).await?;
        Ok(())
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        if !request.requires_auth {
            let response = self.dispatch(request, None).await?;
            return ensure_success(response).await;
        }

        let session = &self.inner.session;
        let (token, generation) = match session.access_token() {
            Some(current) => current,
            None if session.user().is_some() => {
                // restored session: no access token until the first refresh
                let generation = session.token_generation();
                (self.refreshed_token(generation).await?, generation)
            }
            None => return Err(ApiError::NotSignedIn),
        };

        let response = self.dispatch(request, Some(&token)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response).await;
        }

        tracing::debug!(path = %request.path, "access token rejected, refreshing");
        self.retry_unauthorized(request, generation).await
    }

    /// Second and last attempt after a 401 seen with token generation `seen`.
    async fn retry_unauthorized(
        &self,
        request: &ApiRequest,
        seen: u64,
    ) -> Result<Response, ApiError> {
        let token = self.refreshed_token(seen).await?;
        let response = self.dispatch(request, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        ensure_success(response).await
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.inner.config.endpoint(&request.path)?;
        let mut builder = self.inner.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Refresh the access token now, joining any refresh already in flight.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if the refresh fails; the session
    /// has been cleared by then.
    pub async fn refresh_now(&self) -> Result<String, ApiError> {
        let generation = self.inner.session.token_generation();
        self.refreshed_token(generation).await
    }

    /// A token newer than generation `seen`, refreshing at most once for it.
    async fn refreshed_token(&self, seen: u64) -> Result<String, ApiError> {
        let session = &self.inner.session;
        if session.token_generation() != seen {
            // someone else already rotated (or cleared) the token
            return session
                .access_token()
                .map(|(token, _)| token)
                .ok_or(ApiError::SessionExpired {
                    login_route: session.login_route(),
                });
        }

        let client = self.clone();
        let refresh = self
            .inner
            .refresh
            .join_or_start(seen, move || async move { client.perform_refresh().await }.boxed());
        let outcome = refresh.await;
        self.inner.refresh.finish(seen);

        outcome.map_err(|failure| {
            tracing::warn!(error = %failure, "token refresh failed");
            ApiError::SessionExpired {
                login_route: session.login_route(),
            }
        })
    }

    async fn perform_refresh(&self) -> Result<String, RefreshFailure> {
        let session = &self.inner.session;
        tracing::debug!("refreshing access token");

        let refresh_token = match session.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return self.fail_refresh(RefreshFailure::MissingToken).await,
            Err(err) => return self.fail_refresh(RefreshFailure::Storage(err.to_string())).await,
        };

        let url = match self.inner.config.endpoint(paths::REFRESH) {
            Ok(url) => url,
            Err(err) => return self.fail_refresh(RefreshFailure::Transport(err.to_string())).await,
        };
        let response = match self
            .inner
            .http
            .post(url)
            .json(&RefreshBody {
                refresh_token: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return self.fail_refresh(RefreshFailure::Transport(err.to_string())).await,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return self.fail_refresh(RefreshFailure::Rejected(status)).await;
        }

        let tokens: TokenPair = match response.json().await {
            Ok(tokens) => tokens,
            Err(err) => return self.fail_refresh(RefreshFailure::Transport(err.to_string())).await,
        };
        match session.rotate_tokens(&tokens).await {
            Ok(generation) => {
                tracing::debug!(generation, "access token refreshed");
                Ok(tokens.access_token)
            }
            Err(err) => self.fail_refresh(RefreshFailure::Storage(err.to_string())).await,
        }
    }

    async fn fail_refresh(&self, failure: RefreshFailure) -> Result<String, RefreshFailure> {
        self.inner.session.expire().await;
        Err(failure)
    }

    /// True while no refresh is in flight.
    #[must_use]
    pub fn refresh_idle(&self) -> bool {
        self.inner.refresh.is_idle()
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(ApiError::Status { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_the_base_path() {
        let config = ApiConfig::new("https://api.example.com/api").unwrap();
        assert_eq!(
            config.endpoint(paths::LOGIN).unwrap().as_str(),
            "https://api.example.com/api/auth/login"
        );
        assert_eq!(
            config.endpoint(&paths::assessment(5)).unwrap().as_str(),
            "https://api.example.com/api/videos/5/assessment"
        );
    }

    #[test]
    fn leading_slash_does_not_escape_the_base_path() {
        let config = ApiConfig::new("https://api.example.com/api/").unwrap();
        assert_eq!(
            config.endpoint("/users/me").unwrap().as_str(),
            "https://api.example.com/api/users/me"
        );
    }

    #[tokio::test]
    async fn late_401_reuses_a_token_rotated_meanwhile() {
        use chauffeur_core::model::{Role, User, UserId};
        use chauffeur_core::time::fixed_clock;
        use mockito::{Matcher, Server};
        use storage::repository::InMemoryRepository;

        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/api/users/me")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/api/auth/refresh")
            .match_body(Matcher::Json(serde_json::json!({"refreshToken": "r1"})))
            .with_header("content-type", "application/json")
            .with_body(r#"{"accessToken":"fresh","refreshToken":"r2"}"#)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", "/api/users/me")
            .match_header("authorization", "Bearer fresh")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let repo = InMemoryRepository::new();
        let session = SessionStore::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo));
        session
            .sign_in(
                User {
                    id: UserId::new(1),
                    first_name: "Ada".into(),
                    last_name: "Lovelace".into(),
                    email: "ada@example.com".into(),
                    phone: None,
                    role: Role::Driver,
                    is_exam_completed: false,
                    created_at: None,
                },
                &TokenPair {
                    access_token: "stale".into(),
                    refresh_token: "r1".into(),
                },
            )
            .await
            .unwrap();
        let client =
            ApiClient::new(ApiConfig::new(&format!("{}/api", server.url())).unwrap(), session)
                .unwrap();

        // first caller gets its 401 back with the token it started with
        let request = ApiRequest::get(paths::ME).authenticated();
        let (token, seen) = client.session().access_token().unwrap();
        let response = client.dispatch(&request, Some(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // a second caller refreshes and finishes before the first one reacts
        assert_eq!(client.refresh_now().await.unwrap(), "fresh");
        assert!(client.refresh_idle());
        assert_ne!(client.session().token_generation(), seen);

        let retried = client.retry_unauthorized(&request, seen).await.unwrap();
        assert_eq!(retried.status(), StatusCode::NO_CONTENT);

        rejected.assert_async().await;
        refresh.assert_async().await;
        accepted.assert_async().await;
    }

    #[test]
    fn requests_are_public_unless_flagged() {
        let req = ApiRequest::get(paths::VIDEOS);
        assert!(!req.requires_auth());
        assert!(req.authenticated().requires_auth());
    }
}
