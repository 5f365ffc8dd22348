use chauffeur_core::model::{LoginResponse, Registration, User};
use serde::Serialize;

use crate::api::{ApiClient, ApiRequest, SessionPolicy, paths};
use crate::error::{ApiError, AuthError};

/// Which login page the credentials were entered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portal {
    Admin,
    Driver,
}

impl Portal {
    #[must_use]
    pub fn login_route(self) -> &'static str {
        match self {
            Portal::Admin => "/admin/login",
            Portal::Driver => "/login",
        }
    }
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutBody {
    refresh_token: String,
}

/// Login, logout, registration and session resumption.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    policy: SessionPolicy,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient, policy: SessionPolicy) -> Self {
        Self { client, policy }
    }

    /// Sign in and start a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAdmin` when a driver signs in to the admin
    /// portal; nothing is stored in that case.
    /// Returns `AuthError::Api` or `AuthError::Storage` otherwise.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        portal: Portal,
    ) -> Result<User, AuthError> {
        let request = ApiRequest::post(paths::LOGIN).json(&Credentials {
            email: email.trim(),
            password,
        })?;
        let response: LoginResponse = self.client.send_json(request).await?;

        if portal == Portal::Admin && !response.user_dto.role.is_admin() {
            tracing::info!(user_id = %response.user_dto.id, "non-admin rejected at admin portal");
            return Err(AuthError::NotAdmin);
        }

        self.client
            .session()
            .sign_in(response.user_dto.clone(), &response.tokens)
            .await?;
        tracing::info!(user_id = %response.user_dto.id, role = response.user_dto.role.as_str(), "signed in");
        Ok(response.user_dto)
    }

    /// Create a driver account. The new account still has to sign in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` before any request when a field is invalid.
    /// Returns `AuthError::Api` if the backend rejects the registration.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        registration
            .validate()
            .map_err(chauffeur_core::Error::from)?;
        let request = ApiRequest::post(paths::REGISTER).json(registration)?;
        let user: User = self.client.send_json(request).await?;
        tracing::info!(user_id = %user.id, "registered driver account");
        Ok(user)
    }

    /// Tell the backend (best effort), then clear the local session.
    pub async fn logout(&self) {
        let session = self.client.session();
        if session.user().is_some() {
            match session.refresh_token().await {
                Ok(Some(refresh_token)) => {
                    let notify = ApiRequest::post(paths::LOGOUT)
                        .json(&LogoutBody { refresh_token })
                        .map(ApiRequest::authenticated);
                    let result = match notify {
                        Ok(request) => self.client.send(request).await,
                        Err(err) => Err(err),
                    };
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "backend logout failed");
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "refresh token unreadable during logout"),
            }
        }
        session.sign_out().await;
    }

    /// Re-fetch the signed-in user and store the result in the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` if the profile cannot be fetched.
    pub async fn current_user(&self) -> Result<User, AuthError> {
        let user: User = self
            .client
            .send_json(ApiRequest::get(paths::ME).authenticated())
            .await?;
        self.client.session().update_user(user.clone()).await?;
        Ok(user)
    }

    /// Restore the persisted session after a restart.
    ///
    /// Returns `Ok(None)` if nothing was persisted. A restored session past
    /// its ceiling is expired without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` with `ApiError::SessionExpired` when the
    /// ceiling has passed or the refresh token is no longer accepted.
    pub async fn resume(&self) -> Result<Option<User>, AuthError> {
        let session = self.client.session();
        if session.restore().await?.is_none() {
            return Ok(None);
        }

        let ceiling = chrono::Duration::from_std(self.policy.session_ceiling)
            .unwrap_or(chrono::Duration::MAX);
        let past_ceiling = session
            .persisted()
            .is_some_and(|p| p.is_past_ceiling(session.clock().now(), ceiling));
        if past_ceiling {
            let login_route = session.expire().await;
            return Err(AuthError::Api(ApiError::SessionExpired { login_route }));
        }

        self.client.refresh_now().await?;
        self.current_user().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_routes() {
        assert_eq!(Portal::Admin.login_route(), "/admin/login");
        assert_eq!(Portal::Driver.login_route(), "/login");
    }
}
