use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;
use uuid::Uuid;

#[derive(Default)]
struct Data {
    projects: Vec<Value>,
    prompts: Vec<Value>,
    images: Vec<(String, String)>,
    generate_next: Vec<String>,
}

#[derive(Default)]
struct Shared {
    data: Mutex<Data>,
    offline: AtomicBool,
}

impl Shared {
    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type Reply = Result<Response, Response>;

fn guard(shared: &Shared) -> Result<(), Response> {
    if shared.offline.load(Ordering::SeqCst) {
        Err((StatusCode::SERVICE_UNAVAILABLE, "backend offline").into_response())
    } else {
        Ok(())
    }
}

fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

fn fields(body: &Value) -> Result<Map<String, Value>, Response> {
    let fields = body
        .as_object()
        .cloned()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "expected an object").into_response())?;
    if fields.contains_key("id") {
        return Err((StatusCode::BAD_REQUEST, "unexpected field \"id\"").into_response());
    }
    Ok(fields)
}

fn find<'a>(records: &'a mut [Value], id: &str) -> Option<&'a mut Value> {
    records.iter_mut().find(|r| r["id"] == id)
}

async fn create_project(State(s): State<Arc<Shared>>, Json(body): Json<Value>) -> Reply {
    guard(&s)?;
    let mut record = fields(&body)?;
    record.insert("id".into(), json!(Uuid::now_v7().to_string()));
    let record = Value::Object(record);
    s.data().projects.push(record.clone());
    Ok((StatusCode::ACCEPTED, Json(record)).into_response())
}

async fn list_projects(State(s): State<Arc<Shared>>) -> Reply {
    guard(&s)?;
    Ok(Json(s.data().projects.clone()).into_response())
}

async fn get_project(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    let record = find(&mut data.projects, &id).ok_or_else(not_found)?;
    Ok(Json(record.clone()).into_response())
}

async fn update_project(
    State(s): State<Arc<Shared>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    guard(&s)?;
    let update = fields(&body)?;
    let mut data = s.data();
    let record = find(&mut data.projects, &id).ok_or_else(not_found)?;
    if let Some(record) = record.as_object_mut() {
        record.extend(update);
    }
    Ok(Json(record.clone()).into_response())
}

async fn delete_project(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    let before = data.projects.len();
    data.projects.retain(|r| r["id"] != id);
    if data.projects.len() == before {
        return Err(not_found());
    }
    data.prompts.retain(|r| r["project"] != id);
    Ok(StatusCode::OK.into_response())
}

async fn project_prompts(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    find(&mut data.projects, &id).ok_or_else(not_found)?;
    let prompts: Vec<Value> = data
        .prompts
        .iter()
        .filter(|r| r["project"] == id)
        .cloned()
        .collect();
    Ok(Json(prompts).into_response())
}

async fn create_prompt(
    State(s): State<Arc<Shared>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    guard(&s)?;
    let mut record = fields(&body)?;
    let mut data = s.data();
    find(&mut data.projects, &id).ok_or_else(not_found)?;
    record.insert("id".into(), json!(Uuid::now_v7().to_string()));
    record.insert("project".into(), json!(id));
    let record = Value::Object(record);
    data.prompts.push(record.clone());
    Ok((StatusCode::ACCEPTED, Json(record)).into_response())
}

async fn get_prompt(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    let record = find(&mut data.prompts, &id).ok_or_else(not_found)?;
    Ok(Json(record.clone()).into_response())
}

async fn delete_prompt(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    let before = data.prompts.len();
    data.prompts.retain(|r| r["id"] != id);
    if data.prompts.len() == before {
        return Err(not_found());
    }
    Ok(StatusCode::OK.into_response())
}

async fn prompt_images(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    find(&mut data.prompts, &id).ok_or_else(not_found)?;
    let images: Vec<Value> = data
        .images
        .iter()
        .filter(|(prompt, _)| *prompt == id)
        .map(|(_, image)| json!({"id": image, "prompt": id}))
        .collect();
    Ok(Json(images).into_response())
}

async fn generate_next(State(s): State<Arc<Shared>>, Path(id): Path<String>) -> Reply {
    guard(&s)?;
    let mut data = s.data();
    let record = find(&mut data.prompts, &id).ok_or_else(not_found)?.clone();
    data.generate_next.push(id);
    Ok((StatusCode::ACCEPTED, Json(record)).into_response())
}

/// An in-process stand-in for the generation backend, serving the JSON API
/// under `/api` from memory.
pub struct MockBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub async fn start() -> std::io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let app = Router::new()
            .route("/api/project", get(list_projects).post(create_project))
            .route(
                "/api/project/{id}",
                get(get_project).put(update_project).delete(delete_project),
            )
            .route(
                "/api/project/{id}/prompts",
                get(project_prompts).post(create_prompt),
            )
            .route("/api/prompt/{id}", get(get_prompt).delete(delete_prompt))
            .route("/api/prompt/{id}/images", get(prompt_images))
            .route("/api/prompt/{id}/generate-next", post(generate_next))
            .with_state(Arc::clone(&shared));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                debug!(error = %e, "mock backend stopped");
            }
        });
        debug!(%addr, "mock backend listening");

        Ok(Self {
            addr,
            shared,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// A page location the client can resolve its API root from.
    pub fn page_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}/index.html#overview", self.addr))
    }

    /// Answers every request with 503 while set.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Stops serving; later requests fail at the transport.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Deletes a project behind the client's back.
    pub fn drop_project(&self, id: &str) {
        self.shared.data().projects.retain(|r| r["id"] != id);
    }

    pub fn add_image(&self, prompt: &str, image: &str) {
        self.shared
            .data()
            .images
            .push((prompt.to_string(), image.to_string()));
    }

    /// Prompt ids that generation was continued for, in call order.
    pub fn generate_next_calls(&self) -> Vec<String> {
        self.shared.data().generate_next.clone()
    }

    pub fn prompt(&self, id: &str) -> Option<Value> {
        self.shared
            .data()
            .prompts
            .iter()
            .find(|r| r["id"] == id)
            .cloned()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
