//! The task sync client: REST CRUD kept in step with a local cache and a
//! real-time push channel.
//!
//! The cache only changes after the server confirms a mutation. The one
//! exception is [`TaskSyncClient::toggle_completed`], which flips the flag
//! first and reverts it if the server rejects the update.

use chrono::NaiveDate;
use tokio::sync::broadcast;

use greenthumb_proto::event::OutboundMessage;
use greenthumb_proto::task::{NewTask, Task, TaskId, TaskPatch};
use greenthumb_proto::template::TemplateApplied;

use crate::api::http::HttpTaskApi;
use crate::api::notifications::NotificationsApi;
use crate::api::templates::TemplatesApi;
use crate::api::{ApiError, TaskApi};
use crate::cache::{SharedCache, TaskCache};
use crate::channel::{ChannelError, ChannelEvent, ConnectionState, EventChannel};
use crate::config::{ClientConfig, RealtimeConfig};

/// Lookahead used by callers that do not pick their own window.
pub const DEFAULT_UPCOMING_DAYS: u32 = 7;

/// REST access to calendar tasks plus a cache fed by the push channel.
pub struct TaskSyncClient<A = HttpTaskApi> {
    api: A,
    cache: SharedCache,
    channel: EventChannel,
}

impl TaskSyncClient<HttpTaskApi> {
    /// Build an HTTP client from resolved configuration. The push channel is
    /// created idle.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let api = HttpTaskApi::new(config.base_url.clone(), config.request_timeout)?;
        Ok(Self::with_api(
            api,
            config.ws_url.as_str(),
            config.realtime.clone(),
        ))
    }

    /// Companion client for the `/notifications` endpoints, sharing this
    /// client's connection pool and base URL.
    #[must_use]
    pub fn notifications(&self) -> NotificationsApi {
        NotificationsApi::from_task_api(&self.api)
    }

    /// Companion client for the `/templates` endpoints.
    #[must_use]
    pub fn templates(&self) -> TemplatesApi {
        TemplatesApi::from_task_api(&self.api)
    }

    /// Apply a crop template, then reload the task list.
    ///
    /// The server announces template tasks on no channel, so the cache is
    /// refreshed with a full [`list`](Self::list).
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown template. If the apply succeeds
    /// but the reload fails, the reload error is returned and the cache keeps
    /// its previous contents.
    pub async fn apply_template(
        &self,
        template_id: &str,
        start_date: Option<NaiveDate>,
    ) -> Result<TemplateApplied, ApiError> {
        let applied = self.templates().apply(template_id, start_date).await?;
        tracing::info!(
            template = %template_id,
            created = applied.tasks_created,
            start = %applied.start_date,
            "template applied"
        );
        self.list().await?;
        Ok(applied)
    }
}

impl<A: TaskApi> TaskSyncClient<A> {
    /// Wrap any [`TaskApi`] backend.
    pub fn with_api(api: A, ws_url: impl Into<String>, realtime: RealtimeConfig) -> Self {
        let cache = TaskCache::shared();
        let channel = EventChannel::new(ws_url, realtime, cache.clone());
        Self {
            api,
            cache,
            channel,
        }
    }

    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Handle to the shared cache, for readers that hold on to it.
    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    /// Snapshot of the cached tasks in order.
    pub fn tasks(&self) -> Vec<Task> {
        self.cache.lock().tasks().to_vec()
    }

    /// Cached copy of one task, without a request.
    pub fn cached(&self, id: &TaskId) -> Option<Task> {
        self.cache.lock().get(id).cloned()
    }

    /// Fetch every task and replace the cache with the result.
    ///
    /// # Errors
    ///
    /// Propagates the [`ApiError`]; the cache is untouched on failure.
    pub async fn list(&self) -> Result<Vec<Task>, ApiError> {
        let tasks = self.api.list().await?;
        self.cache.lock().replace_all(tasks.clone());
        tracing::debug!(count = tasks.len(), "task list refreshed");
        Ok(tasks)
    }

    /// Fetch one task and refresh its cache entry.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for an unknown id, else [`ApiError::Request`].
    pub async fn get(&self, id: &TaskId) -> Result<Task, ApiError> {
        let task = self.api.get(id).await?;
        self.cache.lock().upsert(task.clone());
        Ok(task)
    }

    /// Create a task and cache the server's copy.
    ///
    /// # Errors
    ///
    /// A blank title fails with [`ApiError::Validation`] before any request.
    /// Server rejections are `Validation`; transport failures are `Request`.
    pub async fn create(&self, new: &NewTask) -> Result<Task, ApiError> {
        new.validate()?;
        let task = self.api.create(new).await?;
        self.cache.lock().upsert(task.clone());
        tracing::info!(task_id = %task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Apply a partial update and cache the merged result.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, or `Request`; the cache is untouched on
    /// failure.
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        patch.validate()?;
        let task = self.api.update(id, patch).await?;
        self.cache.lock().upsert(task.clone());
        tracing::debug!(task_id = %task.id, "task updated");
        Ok(task)
    }

    /// Delete a task, dropping it from the cache once the server confirms.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Request`. A `NotFound` after a concurrent delete means
    /// the task is already gone; see [`ApiError::is_not_found`].
    pub async fn delete(&self, id: &TaskId) -> Result<(), ApiError> {
        self.api.delete(id).await?;
        self.cache.lock().remove(id);
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Tasks dated within `[today, today + within_days]`, as filtered by the
    /// server. Results are merged into the cache; nothing is removed.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub async fn list_upcoming(&self, within_days: u32) -> Result<Vec<Task>, ApiError> {
        let tasks = self.api.list_upcoming(within_days).await?;
        let mut cache = self.cache.lock();
        for task in &tasks {
            cache.upsert(task.clone());
        }
        Ok(tasks)
    }

    /// Flip `completed` in the cache immediately, then confirm with the
    /// server.
    ///
    /// On success the server's copy replaces the cached one. On failure the
    /// flag is restored to its pre-toggle value, unless a push event
    /// replaced the entry while the request was in flight.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] without a request if the task is not cached;
    /// otherwise whatever the update returned.
    pub async fn toggle_completed(&self, id: &TaskId) -> Result<Task, ApiError> {
        let (previous, optimistic) = {
            let mut cache = self.cache.lock();
            let current = cache
                .get(id)
                .map(|t| t.completed)
                .ok_or_else(|| ApiError::NotFound {
                    message: format!("task {id} is not cached"),
                })?;
            cache.set_completed(id, !current);
            (current, cache.get(id).cloned())
        };
        let patch = TaskPatch::new().completed(!previous);

        match self.api.update(id, &patch).await {
            Ok(task) => {
                self.cache.lock().upsert(task.clone());
                Ok(task)
            }
            Err(err) => {
                let mut cache = self.cache.lock();
                if cache.get(id) == optimistic.as_ref() {
                    cache.set_completed(id, previous);
                }
                tracing::warn!(task_id = %id, err = %err, "toggle rejected by server");
                Err(err)
            }
        }
    }

    /// Start the push channel. See [`EventChannel::connect`].
    pub fn connect(&self) {
        self.channel.connect();
    }

    /// Stop the push channel and cancel any pending retry.
    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Typed stream of channel events. Task events arrive after the cache has
    /// been updated.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.channel.subscribe()
    }

    /// Send a message over the push channel.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotConnected`] unless the channel is open.
    pub fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        self.channel.send(msg)
    }

    pub const fn channel(&self) -> &EventChannel {
        &self.channel
    }
}
