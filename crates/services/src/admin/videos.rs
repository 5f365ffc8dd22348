use chauffeur_core::model::{Page, PageRequest, Video, VideoDraft, VideoId, VideoSummary, playable_video_url};
use serde::Serialize;

use crate::api::{ApiClient, ApiRequest, paths};
use crate::error::AdminError;

use super::cache::{LIST_STALE_AFTER, QueryCache, list_key};
use super::{ConfirmedDelete, DeleteRequest, EntityKind};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    video_order: i64,
}

/// Admin CRUD for training videos and their quizzes.
#[derive(Clone)]
pub struct VideoAdmin {
    client: ApiClient,
    lists: QueryCache<Page<VideoSummary>>,
}

impl VideoAdmin {
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
            .invalidate_prefix(&EntityKind::Video.list_prefix());
        tracing::debug!(dropped, "video lists invalidated");
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn list(&self, request: &PageRequest) -> Result<Page<VideoSummary>, AdminError> {
        self.ensure_admin()?;
        let key = list_key(EntityKind::Video, request);
        let page = self
            .lists
            .get_or_fetch(&key, || {
                self.client.send_json::<Page<VideoSummary>>(
                    ApiRequest::get(paths::VIDEOS)
                        .query(request.query_pairs())
                        .authenticated(),
                )
            })
            .await?;
        Ok(page)
    }

    /// Fetch one video with its quiz, bypassing the list cache. The media
    /// URL is rewritten to its playable form.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn detail(&self, id: VideoId) -> Result<Video, AdminError> {
        self.ensure_admin()?;
        let mut video: Video = self
            .client
            .send_json(ApiRequest::get(paths::video(id)).authenticated())
            .await?;
        if let Err(err) = video.fix_media_url() {
            tracing::warn!(video_id = %id, error = %err, "video url left as served");
        }
        Ok(video)
    }

    /// Open the editor for a video from its freshly fetched detail.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` if the stored URL cannot be parsed,
    /// otherwise see [`VideoAdmin::detail`].
    pub async fn edit(&self, id: VideoId) -> Result<(Video, VideoDraft), AdminError> {
        let video = self.detail(id).await?;
        let draft = VideoDraft::from_video(&video).map_err(chauffeur_core::Error::from)?;
        Ok((video, draft))
    }

    fn prepared(draft: &VideoDraft) -> Result<VideoDraft, AdminError> {
        draft.validate().map_err(chauffeur_core::Error::from)?;
        let mut draft = draft.clone();
        draft.video_url = playable_video_url(&draft.video_url)
            .map_err(chauffeur_core::Error::from)?
            .to_string();
        Ok(draft)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Validation` before any request when the draft is
    /// invalid, and `AdminError::Api` if the backend rejects it.
    pub async fn create(&self, draft: &VideoDraft) -> Result<Video, AdminError> {
        self.ensure_admin()?;
        let draft = Self::prepared(draft)?;
        let video: Video = self
            .client
            .send_json(ApiRequest::post(paths::VIDEOS).json(&draft)?.authenticated())
            .await?;
        self.invalidate_lists();
        tracing::info!(video_id = %video.id, "video created");
        Ok(video)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Validation` before any request when the draft is
    /// invalid, and `AdminError::Api` if the backend rejects it.
    pub async fn update(&self, id: VideoId, draft: &VideoDraft) -> Result<Video, AdminError> {
        self.ensure_admin()?;
        let draft = Self::prepared(draft)?;
        let video: Video = self
            .client
            .send_json(ApiRequest::put(paths::video(id)).json(&draft)?.authenticated())
            .await?;
        self.invalidate_lists();
        tracing::info!(video_id = %id, "video updated");
        Ok(video)
    }

    /// Move a video to a new position in training order.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn set_order(&self, id: VideoId, video_order: i64) -> Result<(), AdminError> {
        self.ensure_admin()?;
        self.client
            .send(
                ApiRequest::patch(paths::video_order(id))
                    .json(&OrderBody { video_order })?
                    .authenticated(),
            )
            .await?;
        self.invalidate_lists();
        tracing::info!(video_id = %id, video_order, "video reordered");
        Ok(())
    }

    #[must_use]
    pub fn delete_request(&self, video: &VideoSummary) -> DeleteRequest<VideoId> {
        DeleteRequest::new(EntityKind::Video, video.id, video.title.clone())
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` for non-admin sessions and
    /// `AdminError::Api` if the request fails.
    pub async fn delete(&self, confirmed: ConfirmedDelete<VideoId>) -> Result<(), AdminError> {
        self.ensure_admin()?;
        self.client
            .send(ApiRequest::delete(paths::video(confirmed.id())).authenticated())
            .await?;
        self.invalidate_lists();
        tracing::info!(video_id = %confirmed.id(), "video deleted");
        Ok(())
    }
}
