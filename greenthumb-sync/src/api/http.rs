//! `reqwest` implementation of [`TaskApi`] for the `/calendar/tasks` endpoints.
//!
//! Every request carries the client-wide timeout configured at construction,
//! so a stalled server surfaces as [`ApiError::Request`] instead of hanging
//! the caller.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use greenthumb_proto::task::{NewTask, Task, TaskId, TaskPatch};

use super::{ApiError, Operation, TaskApi};

/// Best-effort shape of an error body: `{ "detail": "..." }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// REST client for the calendar task collection.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: Url,
}

impl HttpTaskApi {
    /// Build a client rooted at `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] if `base_url` cannot carry a path or the
    /// HTTP client cannot be constructed.
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Request {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Self::with_client(client, base_url)
    }

    /// Wrap an existing `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] if `base_url` cannot carry a path.
    pub fn with_client(client: Client, base_url: Url) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Request {
                status: None,
                message: format!("base URL {base_url} cannot carry a path"),
            });
        }
        Ok(Self { client, base_url })
    }

    /// Return the base URL all endpoints hang off.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.client
    }

    fn task_url(&self, id: &TaskId) -> Url {
        endpoint(&self.base_url, &["calendar", "tasks", &id.to_string()])
    }
}

impl TaskApi for HttpTaskApi {
    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        let url = endpoint(&self.base_url, &["calendar", "tasks"]);
        let response = execute(Operation::List, self.client.get(url)).await?;
        read_json(Operation::List, response).await
    }

    async fn get(&self, id: &TaskId) -> Result<Task, ApiError> {
        let response = execute(Operation::Get, self.client.get(self.task_url(id))).await?;
        read_json(Operation::Get, response).await
    }

    async fn create(&self, new: &NewTask) -> Result<Task, ApiError> {
        let url = endpoint(&self.base_url, &["calendar", "tasks"]);
        let response = execute(Operation::Create, self.client.post(url).json(new)).await?;
        read_json(Operation::Create, response).await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        let request = self.client.put(self.task_url(id)).json(patch);
        let response = execute(Operation::Update, request).await?;
        read_json(Operation::Update, response).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), ApiError> {
        // The body is a courtesy message; only the status matters.
        execute(Operation::Delete, self.client.delete(self.task_url(id))).await?;
        Ok(())
    }

    async fn list_upcoming(&self, within_days: u32) -> Result<Vec<Task>, ApiError> {
        let url = endpoint(&self.base_url, &["calendar", "tasks", "upcoming"]);
        let request = self.client.get(url).query(&[("days", within_days)]);
        let response = execute(Operation::ListUpcoming, request).await?;
        read_json(Operation::ListUpcoming, response).await
    }
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Send a request and turn any non-2xx status into an [`ApiError`].
pub(crate) async fn execute(op: Operation, request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await.map_err(|e| transport_error(op, &e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| match body.detail {
            Some(Value::String(detail)) => Some(detail),
            _ => None,
        });
    tracing::warn!(op = %op, status = status.as_u16(), detail = ?detail, "request rejected");
    Err(ApiError::from_status(op, status.as_u16(), detail))
}

/// Decode a successful response body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    op: Operation,
    response: Response,
) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|e| {
        tracing::warn!(op = %op, err = %e, "undecodable response body");
        ApiError::Request {
            status: None,
            message: format!("invalid {op} response body: {e}"),
        }
    })
}

fn transport_error(op: Operation, err: &reqwest::Error) -> ApiError {
    let message = if err.is_timeout() {
        format!("{op} request timed out")
    } else {
        format!("{op} request failed: {err}")
    };
    tracing::warn!(op = %op, err = %err, "request did not complete");
    ApiError::Request {
        status: None,
        message,
    }
}
