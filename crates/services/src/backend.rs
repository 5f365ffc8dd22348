use async_trait::async_trait;

use chauffeur_core::model::{
    AssessmentResult, Page, PageRequest, Submission, User, Video, VideoId, VideoSummary,
};

use crate::api::{ApiClient, ApiRequest, paths};
use crate::error::ApiError;

/// Backend calls the training flow depends on.
#[async_trait]
pub trait TrainingBackend: Send + Sync {
    /// Every live video, across all pages.
    async fn list_videos(&self) -> Result<Vec<VideoSummary>, ApiError>;

    async fn video_detail(&self, id: VideoId) -> Result<Video, ApiError>;

    async fn submit_assessment(
        &self,
        id: VideoId,
        submission: &Submission,
    ) -> Result<AssessmentResult, ApiError>;

    async fn mark_exam_completed(&self) -> Result<(), ApiError>;

    async fn current_user(&self) -> Result<User, ApiError>;
}

#[async_trait]
impl TrainingBackend for ApiClient {
    async fn list_videos(&self) -> Result<Vec<VideoSummary>, ApiError> {
        let mut request = PageRequest::new(1, PageRequest::MAX_LIMIT);
        let mut videos = Vec::new();
        let mut last_page = 0;
        // the first response bounds how many pages are requested
        let mut page_count = None;
        loop {
            let page: Page<VideoSummary> = self
                .send_json(
                    ApiRequest::get(paths::VIDEOS)
                        .query(request.query_pairs())
                        .authenticated(),
                )
                .await?;
            if page.current_page <= last_page {
                tracing::warn!(
                    requested = request.page(),
                    served = page.current_page,
                    "video list did not advance, stopping pagination"
                );
                return Ok(videos);
            }
            last_page = page.current_page;
            let page_count = *page_count.get_or_insert(page.total_pages);

            let more = page.has_next() && !page.is_empty() && request.page() < page_count;
            videos.extend(page.data);
            if !more {
                return Ok(videos);
            }
            request = request.next();
        }
    }

    async fn video_detail(&self, id: VideoId) -> Result<Video, ApiError> {
        self.send_json(ApiRequest::get(paths::video(id)).authenticated())
            .await
    }

    async fn submit_assessment(
        &self,
        id: VideoId,
        submission: &Submission,
    ) -> Result<AssessmentResult, ApiError> {
        self.send_json(
            ApiRequest::post(paths::assessment(id))
                .json(submission)?
                .authenticated(),
        )
        .await
    }

    async fn mark_exam_completed(&self) -> Result<(), ApiError> {
        self.send(
            ApiRequest::patch(paths::EXAM_STATUS)
                .json(&serde_json::json!({ "isExamCompleted": true }))?
                .authenticated(),
        )
        .await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        self.send_json(ApiRequest::get(paths::ME).authenticated())
            .await
    }
}
