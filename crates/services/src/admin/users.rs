use chauffeur_core::model::{Page, PageRequest, User, UserDraft, UserId};

use crate::api::{ApiClient, ApiRequest, paths};
use crate::error::AdminError;

use super::cache::{LIST_STALE_AFTER, QueryCache, list_key};
use super::{ConfirmedDelete, DeleteRequest, EntityKind};

/// Admin CRUD for user accounts.
#[derive(Clone)]
pub struct UserAdmin {
    client: ApiClient,
    lists: QueryCache<Page<User>>,
}

impl UserAdmin {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            lists: QueryCache::new(LIST_STALE_AFTER),
        }
    }

    fn ensure_admin(&self) -> Result<(), AdminError> {
        match self.client.session().role() {
            Some(role) if role.is_admin() => Ok(()),
            _ => Err(AdminError::Forbidden),
        }
    }

    fn invalidate_lists(&self) {
        let dropped = self
            .lists
            .invalidate_prefix(&EntityKind::User.list_prefix());
        tracing::debug!(dropped, "user lists invalidated");
    }

    /// One page of users, served from cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn list(&self, request: &PageRequest) -> Result<Page<User>, AdminError> {
        self.ensure_admin()?;
        let key = list_key(EntityKind::User, request);
        let page = self
            .lists
            .get_or_fetch(&key, || {
                self.client.send_json::<Page<User>>(
                    ApiRequest::get(paths::USERS)
                        .query(request.query_pairs())
                        .authenticated(),
                )
            })
            .await?;
        Ok(page)
    }

    /// Fetch one user, bypassing the list cache.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn detail(&self, id: UserId) -> Result<User, AdminError> {
        self.ensure_admin()?;
        let user = self
            .client
            .send_json(ApiRequest::get(paths::user(id)).authenticated())
            .await?;
        Ok(user)
    }

    /// Open the editor for a user from its freshly fetched detail.
    ///
    /// # Errors
    ///
    /// See [`UserAdmin::detail`].
    pub async fn edit(&self, id: UserId) -> Result<(User, UserDraft), AdminError> {
        let user = self.detail(id).await?;
        let draft = UserDraft::from_user(&user);
        Ok((user, draft))
    }

    /// # Errors
    ///
    /// Returns `AdminError::Validation` before any request when the draft is
    /// invalid, and `AdminError::Api` if the backend rejects it.
    pub async fn create(&self, draft: &UserDraft) -> Result<User, AdminError> {
        self.ensure_admin()?;
        draft
            .validate_for_create()
            .map_err(chauffeur_core::Error::from)?;
        let user: User = self
            .client
            .send_json(ApiRequest::post(paths::USERS).json(draft)?.authenticated())
            .await?;
        self.invalidate_lists();
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Validation` before any request when the draft is
    /// invalid, and `AdminError::Api` if the backend rejects it.
    pub async fn update(&self, id: UserId, draft: &UserDraft) -> Result<User, AdminError> {
        self.ensure_admin()?;
        draft
            .validate_for_update()
            .map_err(chauffeur_core::Error::from)?;
        let user: User = self
            .client
            .send_json(ApiRequest::put(paths::user(id)).json(draft)?.authenticated())
            .await?;
        self.invalidate_lists();
        tracing::info!(user_id = %id, "user updated");
        Ok(user)
    }

    #[must_use]
    pub fn delete_request(&self, user: &User) -> DeleteRequest<UserId> {
        DeleteRequest::new(EntityKind::User, user.id, user.full_name())
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn delete(&self, confirmed: ConfirmedDelete<UserId>) -> Result<(), AdminError> {
        self.ensure_admin()?;
        self.client
            .send(ApiRequest::delete(paths::user(confirmed.id())).authenticated())
            .await?;
        self.invalidate_lists();
        tracing::info!(user_id = %confirmed.id(), "user deleted");
        Ok(())
    }
}
