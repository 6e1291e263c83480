//! In-process fake of the GreenThumb backend for integration tests.
//!
//! Serves the `/calendar/tasks` REST routes, the `/calendar/ws` push
//! channel, and small `/notifications` and `/templates` surfaces on an
//! OS-assigned port. Mutations through `/calendar/tasks` broadcast the
//! matching push event to every open socket, like the real server; applying
//! a template does not. Tests can inject failures, push arbitrary
//! frames, and drop every socket to simulate a server-side close.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use chrono::{NaiveDate, NaiveDateTime};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use greenthumb_proto::codec;
use greenthumb_proto::event::TaskEvent;
use greenthumb_proto::notification::{NotificationList, NotificationRecord, NotificationSettings};
use greenthumb_proto::task::{NewTask, Task, TaskId, TaskPatch};
use greenthumb_proto::template::{
    TaskTemplate, TemplateApplied, TemplateCategories, TemplateCategory, TemplateTask,
};

/// An injected response for the next REST request.
#[derive(Debug, Clone)]
pub struct Failure {
    pub status: StatusCode,
    /// `Some` sends `{"detail": ...}`; `None` sends a non-JSON body.
    pub detail: Option<String>,
}

#[derive(Debug)]
struct Store {
    tasks: Vec<Task>,
    next_id: i64,
}

pub struct BackendState {
    store: Mutex<Store>,
    today: NaiveDate,
    failures: Mutex<Vec<Failure>>,
    sockets: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
    accepted: AtomicUsize,
    open: AtomicUsize,
    received: Mutex<Vec<String>>,
    notifications: Mutex<Vec<NotificationRecord>>,
    settings: Mutex<NotificationSettings>,
    templates: Vec<TaskTemplate>,
}

impl BackendState {
    fn take_failure(&self) -> Option<Response> {
        let mut failures = self.failures.lock();
        if failures.is_empty() {
            return None;
        }
        let failure = failures.remove(0);
        Some(match failure.detail {
            Some(detail) => (failure.status, Json(json!({ "detail": detail }))).into_response(),
            None => (failure.status, "upstream exploded").into_response(),
        })
    }

    fn broadcast(&self, text: &str) {
        let sockets = self.sockets.lock();
        for socket in sockets.iter() {
            let _ = socket.send(Message::Text(text.to_owned().into()));
        }
    }

    fn broadcast_event(&self, event: &TaskEvent) {
        let text = codec::encode_event(event).expect("encode push event");
        self.broadcast(&text);
    }
}

/// Running fake backend. Aborts the server when dropped.
pub struct FakeBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    /// Start an empty backend whose "today" is 2024-06-01.
    pub async fn start() -> Self {
        Self::start_with(Vec::new()).await
    }

    /// Start a backend seeded with `tasks`.
    pub async fn start_with(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().filter_map(|t| t.id.as_int()).max().unwrap_or(0) + 1;
        let state = Arc::new(BackendState {
            store: Mutex::new(Store { tasks, next_id }),
            today: date("2024-06-01"),
            failures: Mutex::new(Vec::new()),
            sockets: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            notifications: Mutex::new(vec![sample_notification()]),
            settings: Mutex::new(NotificationSettings::default()),
            templates: sample_templates(),
        });

        let app = Router::new()
            .route("/calendar/tasks", get(list_tasks).post(create_task))
            .route("/calendar/tasks/upcoming", get(upcoming_tasks))
            .route(
                "/calendar/tasks/{id}",
                get(get_task).put(update_task).delete(delete_task),
            )
            .route("/calendar/ws", get(ws_handler))
            .route("/notifications", get(list_notifications))
            .route("/notifications/mark-all-read", put(mark_all_read))
            .route("/notifications/check", post(check_notifications))
            .route("/notifications/settings", get(get_settings).put(put_settings))
            .route("/notifications/{id}", delete(delete_notification))
            .route("/notifications/{id}/read", put(mark_read))
            .route("/templates", get(list_templates))
            .route("/templates/categories", get(template_categories))
            .route("/templates/{id}", get(get_template))
            .route("/templates/crop/{crop}", get(templates_by_crop))
            .route("/templates/season/{season}", get(templates_by_season))
            .route("/templates/apply/{id}", post(apply_template))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend server");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).expect("base url")
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/calendar/ws", self.addr)
    }

    /// Make the next REST request answer with `status`.
    pub fn fail_next(&self, status: u16, detail: Option<&str>) {
        self.state.failures.lock().push(Failure {
            status: StatusCode::from_u16(status).expect("status code"),
            detail: detail.map(str::to_owned),
        });
    }

    /// Push a task event to every open socket.
    pub fn push(&self, event: &TaskEvent) {
        self.state.broadcast_event(event);
    }

    /// Push an arbitrary text frame to every open socket.
    pub fn push_raw(&self, text: &str) {
        self.state.broadcast(text);
    }

    /// Send a Close frame on every open socket.
    pub fn close_all(&self) {
        let sockets: Vec<_> = self.state.sockets.lock().drain(..).collect();
        for socket in sockets {
            let _ = socket.send(Message::Close(None));
        }
    }

    /// WebSocket connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// WebSocket connections currently open.
    pub fn open_sockets(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Text frames received from clients.
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.store.lock().tasks.clone()
    }

    /// Wait until `pred` holds, polling every 10 ms, for up to 5 s.
    pub async fn wait_until(&self, what: &str, pred: impl Fn(&Self) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !pred(self) {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.close_all();
        self.handle.abort();
    }
}

pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("date literal")
}

/// A task as the backend would store it.
pub fn task(id: i64, title: &str, kind: &str, day: &str) -> Task {
    NewTask::new(title, kind, date(day)).into_task(TaskId::from_int(id))
}

/// The three tasks used across the suite: today, +4 days, +9 days.
pub fn garden_tasks() -> Vec<Task> {
    vec![
        task(1, "Water tomato beds", "watering", "2024-06-01"),
        task(2, "Feed peppers", "fertilizing", "2024-06-05"),
        task(3, "Harvest garlic", "harvesting", "2024-06-10"),
    ]
}

fn sample_notification() -> NotificationRecord {
    NotificationRecord {
        id: "notif_1".into(),
        kind: "task_reminder".into(),
        title: "Upcoming Task: Feed peppers".into(),
        message: "'Feed peppers' is due on 2024-06-05".into(),
        task_id: Some(TaskId::from_int(2)),
        priority: "medium".into(),
        created_at: NaiveDateTime::parse_from_str("2024-06-01 08:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("timestamp"),
        read: false,
    }
}

fn template_task(title: &str, kind: &str, days_from_start: u32, priority: &str) -> TemplateTask {
    TemplateTask {
        title: title.into(),
        kind: kind.into(),
        description: None,
        days_from_start,
        priority: priority.into(),
    }
}

/// Two short templates: rice in the monsoon, tomato in summer.
pub fn sample_templates() -> Vec<TaskTemplate> {
    let created_at = NaiveDateTime::parse_from_str("2024-05-01 00:00:00", "%Y-%m-%d %H:%M:%S")
        .expect("timestamp");
    vec![
        TaskTemplate {
            id: "rice_monsoon".into(),
            name: "Rice Monsoon Cultivation".into(),
            description: "Complete rice cultivation cycle for monsoon season".into(),
            crop_type: "rice".into(),
            season: "monsoon".into(),
            tasks: vec![
                template_task("Land Preparation", "general", 0, "high"),
                template_task("Water Management", "watering", 14, "medium"),
                template_task("Harvest Rice", "harvesting", 120, "high"),
            ],
            created_at,
        },
        TaskTemplate {
            id: "tomato_summer".into(),
            name: "Tomato Summer Cultivation".into(),
            description: "Complete tomato cultivation cycle for summer season".into(),
            crop_type: "tomato".into(),
            season: "summer".into(),
            tasks: vec![
                template_task("Nursery Preparation", "general", 0, "high"),
                template_task("Pruning", "pruning", 45, "medium"),
            ],
            created_at,
        },
    ]
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Task not found" })),
    )
        .into_response()
}

fn unprocessable(detail: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "detail": detail })),
    )
        .into_response()
}

async fn list_tasks(State(state): State<Arc<BackendState>>) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    Json(state.store.lock().tasks.clone()).into_response()
}

async fn get_task(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    let id: TaskId = id.parse().expect("infallible");
    let store = state.store.lock();
    match store.tasks.iter().find(|t| t.id == id) {
        Some(task) => Json(task.clone()).into_response(),
        None => not_found(),
    }
}

async fn create_task(State(state): State<Arc<BackendState>>, Json(new): Json<NewTask>) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    if new.validate().is_err() {
        return unprocessable("Title must not be empty");
    }
    let task = {
        let mut store = state.store.lock();
        let task = new.into_task(TaskId::from_int(store.next_id));
        store.next_id += 1;
        store.tasks.push(task.clone());
        task
    };
    state.broadcast_event(&TaskEvent::TaskCreated { task: task.clone() });
    Json(task).into_response()
}

async fn update_task(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    let id: TaskId = id.parse().expect("infallible");
    if patch.validate().is_err() {
        return unprocessable("Title must not be empty");
    }
    let task = {
        let mut store = state.store.lock();
        let Some(task) = store.tasks.iter_mut().find(|t| t.id == id) else {
            return not_found();
        };
        patch.apply(task);
        task.clone()
    };
    state.broadcast_event(&TaskEvent::TaskUpdated { task: task.clone() });
    Json(task).into_response()
}

async fn delete_task(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    let id: TaskId = id.parse().expect("infallible");
    {
        let mut store = state.store.lock();
        let Some(index) = store.tasks.iter().position(|t| t.id == id) else {
            return not_found();
        };
        store.tasks.remove(index);
    }
    state.broadcast_event(&TaskEvent::TaskDeleted { task_id: id });
    Json(json!({ "message": "Task deleted successfully" })).into_response()
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    days: Option<u32>,
}

async fn upcoming_tasks(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<UpcomingQuery>,
) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    let days = query.days.unwrap_or(7);
    let store = state.store.lock();
    let upcoming: Vec<Task> = store
        .tasks
        .iter()
        .filter(|t| !t.completed && t.falls_within(state.today, days))
        .cloned()
        .collect();
    Json(upcoming).into_response()
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<BackendState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<BackendState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.sockets.lock().push(tx.clone());
    state.accepted.fetch_add(1, Ordering::SeqCst);
    state.open.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(msg) => {
                    let closing = matches!(msg, Message::Close(_));
                    if sink.send(msg).await.is_err() || closing {
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_owned();
                    state.received.lock().push(text.clone());
                    // The real server echoes client text verbatim.
                    let _ = tx.send(Message::Text(format!("Echo: {text}").into()));
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.open.fetch_sub(1, Ordering::SeqCst);
}

async fn list_notifications(State(state): State<Arc<BackendState>>) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    let notifications = state.notifications.lock().clone();
    let unread_count = notifications.iter().filter(|n| !n.read).count();
    Json(NotificationList {
        notifications,
        unread_count,
    })
    .into_response()
}

async fn mark_read(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    let mut notifications = state.notifications.lock();
    match notifications.iter_mut().find(|n| n.id == id) {
        Some(n) => {
            n.read = true;
            Json(json!({ "message": "Notification marked as read" })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Notification not found" })),
        )
            .into_response(),
    }
}

async fn mark_all_read(State(state): State<Arc<BackendState>>) -> Response {
    for n in state.notifications.lock().iter_mut() {
        n.read = true;
    }
    Json(json!({ "message": "All notifications marked as read" })).into_response()
}

async fn check_notifications() -> Response {
    Json(json!({ "message": "Notification check completed" })).into_response()
}

async fn get_settings(State(state): State<Arc<BackendState>>) -> Response {
    Json(state.settings.lock().clone()).into_response()
}

async fn put_settings(
    State(state): State<Arc<BackendState>>,
    Json(settings): Json<NotificationSettings>,
) -> Response {
    *state.settings.lock() = settings;
    Json(json!({ "message": "Settings updated successfully" })).into_response()
}

async fn delete_notification(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Response {
    let mut notifications = state.notifications.lock();
    match notifications.iter().position(|n| n.id == id) {
        Some(index) => {
            notifications.remove(index);
            Json(json!({ "message": "Notification deleted" })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Notification not found" })),
        )
            .into_response(),
    }
}

fn template_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Template not found" })),
    )
        .into_response()
}

async fn list_templates(State(state): State<Arc<BackendState>>) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    Json(state.templates.clone()).into_response()
}

async fn template_categories(State(state): State<Arc<BackendState>>) -> Response {
    let seasons = [
        ("monsoon", "Monsoon Season", "Crops suitable for monsoon/rainy season"),
        ("winter", "Winter Season", "Crops suitable for winter season"),
        ("summer", "Summer Season", "Crops suitable for summer season"),
    ];
    let categories: TemplateCategories = seasons
        .into_iter()
        .map(|(season, name, description)| {
            let templates = state
                .templates
                .iter()
                .filter(|t| t.season == season)
                .cloned()
                .collect();
            (
                season.to_string(),
                TemplateCategory {
                    name: name.into(),
                    description: description.into(),
                    templates,
                },
            )
        })
        .collect();
    Json(categories).into_response()
}

async fn get_template(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    match state.templates.iter().find(|t| t.id == id) {
        Some(template) => Json(template.clone()).into_response(),
        None => template_not_found(),
    }
}

async fn templates_by_crop(
    State(state): State<Arc<BackendState>>,
    Path(crop): Path<String>,
) -> Response {
    let matching: Vec<_> = state
        .templates
        .iter()
        .filter(|t| t.crop_type.eq_ignore_ascii_case(&crop))
        .cloned()
        .collect();
    Json(matching).into_response()
}

async fn templates_by_season(
    State(state): State<Arc<BackendState>>,
    Path(season): Path<String>,
) -> Response {
    let matching: Vec<_> = state
        .templates
        .iter()
        .filter(|t| t.season.eq_ignore_ascii_case(&season))
        .cloned()
        .collect();
    Json(matching).into_response()
}

#[derive(Debug, Deserialize)]
struct ApplyQuery {
    start_date: Option<NaiveDate>,
}

/// Creates the template's tasks without broadcasting any push event.
async fn apply_template(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
    Query(query): Query<ApplyQuery>,
) -> Response {
    if let Some(failure) = state.take_failure() {
        return failure;
    }
    let Some(template) = state.templates.iter().find(|t| t.id == id) else {
        return template_not_found();
    };
    let start_date = query.start_date.unwrap_or(state.today);
    let scheduled = template.schedule(start_date);
    let tasks_created = scheduled.len();
    {
        let mut store = state.store.lock();
        for new in scheduled {
            let task = new.into_task(TaskId::from_int(store.next_id));
            store.next_id += 1;
            store.tasks.push(task);
        }
    }
    Json(TemplateApplied {
        message: format!(
            "Created {tasks_created} tasks from template '{}'",
            template.name
        ),
        tasks_created,
        start_date,
        template_name: template.name.clone(),
    })
    .into_response()
}
