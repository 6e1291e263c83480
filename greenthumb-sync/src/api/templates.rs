//! Client for the `/templates` endpoints.
//!
//! Applying a template creates calendar tasks on the server without any push
//! event, so callers that keep a cache must refresh it afterwards;
//! [`TaskSyncClient::apply_template`](crate::client::TaskSyncClient::apply_template)
//! does that.

use chrono::NaiveDate;
use reqwest::Client;
use url::Url;

use greenthumb_proto::template::{TaskTemplate, TemplateApplied, TemplateCategories};

use super::http::{HttpTaskApi, endpoint, execute, read_json};
use super::{ApiError, Operation};

/// REST client for crop task templates.
#[derive(Debug, Clone)]
pub struct TemplatesApi {
    client: Client,
    base_url: Url,
}

impl TemplatesApi {
    /// Share the HTTP client (and its timeout) of an existing task client.
    #[must_use]
    pub fn from_task_api(api: &HttpTaskApi) -> Self {
        Self {
            client: api.client().clone(),
            base_url: api.base_url().clone(),
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut all = Vec::with_capacity(segments.len() + 1);
        all.push("templates");
        all.extend_from_slice(segments);
        endpoint(&self.base_url, &all)
    }

    async fn fetch_list(&self, segments: &[&str]) -> Result<Vec<TaskTemplate>, ApiError> {
        let response = execute(Operation::List, self.client.get(self.url(segments))).await?;
        read_json(Operation::List, response).await
    }

    /// Every available template.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn list(&self) -> Result<Vec<TaskTemplate>, ApiError> {
        self.fetch_list(&[]).await
    }

    /// Templates grouped by season.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn categories(&self) -> Result<TemplateCategories, ApiError> {
        let response = execute(Operation::List, self.client.get(self.url(&["categories"]))).await?;
        read_json(Operation::List, response).await
    }

    /// One template by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown id, else
    /// [`ApiError::Request`].
    pub async fn get(&self, id: &str) -> Result<TaskTemplate, ApiError> {
        let response = execute(Operation::Get, self.client.get(self.url(&[id]))).await?;
        read_json(Operation::Get, response).await
    }

    /// Templates for one crop; matching is case-insensitive on the server.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn by_crop(&self, crop: &str) -> Result<Vec<TaskTemplate>, ApiError> {
        self.fetch_list(&["crop", crop]).await
    }

    /// Templates for one season.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] on transport failure or non-2xx status.
    pub async fn by_season(&self, season: &str) -> Result<Vec<TaskTemplate>, ApiError> {
        self.fetch_list(&["season", season]).await
    }

    /// Create calendar tasks from a template, starting on `start_date`
    /// (server's today when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown template, else
    /// [`ApiError::Request`].
    pub async fn apply(
        &self,
        id: &str,
        start_date: Option<NaiveDate>,
    ) -> Result<TemplateApplied, ApiError> {
        let mut request = self.client.post(self.url(&["apply", id]));
        if let Some(start) = start_date {
            request = request.query(&[("start_date", start.to_string())]);
        }
        let response = execute(Operation::ApplyTemplate, request).await?;
        read_json(Operation::ApplyTemplate, response).await
    }
}
