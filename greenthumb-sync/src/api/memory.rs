//! In-process task backend.
//!
//! Behaves like the calendar server (sequential integer ids, `upcoming`
//! excludes completed tasks, 404/422 on bad input) without any I/O. Failures
//! and latency can be injected, which makes it the backend of choice for
//! exercising [`crate::client::TaskSyncClient`] in tests.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;

use greenthumb_proto::task::{NewTask, Task, TaskId, TaskPatch};

use super::{ApiError, TaskApi};

/// Server-side state guarded by one lock.
#[derive(Debug)]
struct MemoryState {
    tasks: Vec<Task>,
    next_id: i64,
    today: NaiveDate,
    failures: VecDeque<ApiError>,
    latency: Duration,
}

/// In-memory implementation of [`TaskApi`].
#[derive(Debug)]
pub struct InMemoryTaskApi {
    state: Mutex<MemoryState>,
}

impl InMemoryTaskApi {
    /// An empty backend whose notion of "today" is `today`.
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self::with_tasks(Vec::new(), today)
    }

    /// A backend pre-seeded with `tasks`. New ids continue after the largest
    /// integer id present.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>, today: NaiveDate) -> Self {
        let next_id = tasks
            .iter()
            .filter_map(|t| t.id.as_int())
            .max()
            .map_or(1, |max| max + 1);
        Self {
            state: Mutex::new(MemoryState {
                tasks,
                next_id,
                today,
                failures: VecDeque::new(),
                latency: Duration::ZERO,
            }),
        }
    }

    /// Make the next call (of any kind) fail with `err`. Calls queue up.
    pub fn fail_next(&self, err: ApiError) {
        self.state.lock().failures.push_back(err);
    }

    /// Delay every call by `latency` before it touches state.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Remove a task behind the client's back, as another user would.
    pub fn remove_on_server(&self, id: &TaskId) -> Option<Task> {
        let mut state = self.state.lock();
        let index = state.tasks.iter().position(|t| &t.id == id)?;
        Some(state.tasks.remove(index))
    }

    /// Current server-side task list.
    #[must_use]
    pub fn server_tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    async fn pause(&self) {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound {
        message: "Task not found".to_string(),
    }
}

fn unprocessable(message: String) -> ApiError {
    ApiError::Validation {
        status: Some(422),
        message,
    }
}

impl TaskApi for InMemoryTaskApi {
    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        Ok(state.tasks.clone())
    }

    async fn get(&self, id: &TaskId) -> Result<Task, ApiError> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        state
            .tasks
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create(&self, new: &NewTask) -> Result<Task, ApiError> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        new.validate().map_err(|e| unprocessable(e.to_string()))?;

        let id = TaskId::from_int(state.next_id);
        state.next_id += 1;
        let task = new.clone().into_task(id);
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(not_found)?;
        patch.validate().map_err(|e| unprocessable(e.to_string()))?;
        patch.apply(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), ApiError> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        let index = state
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(not_found)?;
        state.tasks.remove(index);
        Ok(())
    }

    async fn list_upcoming(&self, within_days: u32) -> Result<Vec<Task>, ApiError> {
        self.pause().await;
        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        let today = state.today;
        Ok(state
            .tasks
            .iter()
            .filter(|t| !t.completed && t.falls_within(today, within_days))
            .cloned()
            .collect())
    }
}
