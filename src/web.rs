use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::allocate::ScheduleEntry;
use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::model::{self, Difficulty, Preferences, Subject, Topic};
use crate::review::SubjectSummary;
use crate::service::{self, TopicChanges};
use crate::store::StudyStore;

/// Header carrying the authenticated caller's user id.
pub const USER_HEADER: &str = "x-user-id";

/// Response header on the schedule route counting topics left out for bad data.
pub const SCHEDULE_ISSUES_HEADER: &str = "x-schedule-issues";

// -- App state --

struct ServerState {
    store: Box<dyn StudyStore + Send>,
    engine: EngineConfig,
}

type SharedState = Arc<Mutex<ServerState>>;

// -- Errors --

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> ApiError {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> ApiError {
        match err {
            ServiceError::NotFound { .. } => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            ServiceError::Invalid(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong!")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> ApiError {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// -- Caller identity --

pub struct UserId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Not authorized"))
    }
}

// -- Request bodies --

/// `Json` whose rejections use the API's error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

fn parse_exam_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => model::parse_instant(s).map(Some).ok_or_else(|| {
            ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("invalid exam date: {s}"),
            )
        }),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectForm {
    name: String,
    #[serde(default)]
    exam_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectPatch {
    name: Option<String>,
    /// Absent keeps the exam date; `null` or `""` clears it.
    #[serde(default, deserialize_with = "present")]
    exam_date: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicForm {
    #[serde(alias = "subject")]
    subject_id: String,
    name: String,
    #[serde(default)]
    difficulty: Difficulty,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicPatch {
    name: Option<String>,
    #[serde(alias = "subject")]
    subject_id: Option<String>,
    difficulty: Option<Difficulty>,
}

// -- Route handlers --

async fn health() -> &'static str {
    "Study planner API is running"
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found")
}

async fn schedule(
    State(state): State<SharedState>,
    UserId(user): UserId,
) -> Result<(HeaderMap, Json<Vec<ScheduleEntry>>), ApiError> {
    let st = state.lock().await;
    let plan = service::schedule_for(st.store.as_ref(), &user, &st.engine, Utc::now())?;
    let mut headers = HeaderMap::new();
    if !plan.issues.is_empty() {
        tracing::warn!(
            user = %user,
            issues = plan.issues.len(),
            "schedule built with integrity issues"
        );
        headers.insert(SCHEDULE_ISSUES_HEADER, HeaderValue::from(plan.issues.len()));
    }
    Ok((headers, Json(plan.entries)))
}

async fn summary(
    State(state): State<SharedState>,
    UserId(user): UserId,
) -> ApiResult<Vec<SubjectSummary>> {
    let st = state.lock().await;
    Ok(Json(service::summaries_for(st.store.as_ref(), &user, Utc::now())?))
}

async fn list_subjects(
    State(state): State<SharedState>,
    UserId(user): UserId,
) -> ApiResult<Vec<Subject>> {
    let st = state.lock().await;
    let subjects = st.store.subjects(&user).map_err(ServiceError::from)?;
    Ok(Json(subjects))
}

async fn create_subject(
    State(state): State<SharedState>,
    UserId(user): UserId,
    ApiJson(form): ApiJson<SubjectForm>,
) -> Result<(StatusCode, Json<Subject>), ApiError> {
    let exam_date = parse_exam_date(form.exam_date.as_deref())?;
    let mut st = state.lock().await;
    let subject = service::create_subject(st.store.as_mut(), &user, &form.name, exam_date)?;
    Ok((StatusCode::CREATED, Json(subject)))
}

async fn update_subject(
    State(state): State<SharedState>,
    UserId(user): UserId,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<SubjectPatch>,
) -> ApiResult<Subject> {
    let exam_date = match patch.exam_date {
        Some(raw) => Some(parse_exam_date(raw.as_deref())?),
        None => None,
    };
    let mut st = state.lock().await;
    let subject = service::update_subject(
        st.store.as_mut(),
        &user,
        &id,
        patch.name.as_deref(),
        exam_date,
    )?;
    Ok(Json(subject))
}

async fn delete_subject(
    State(state): State<SharedState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut st = state.lock().await;
    service::delete_subject(st.store.as_mut(), &user, &id)?;
    Ok(Json(json!({ "id": id })))
}

async fn list_topics(
    State(state): State<SharedState>,
    UserId(user): UserId,
) -> ApiResult<Vec<Topic>> {
    let st = state.lock().await;
    let topics = st.store.topics(&user).map_err(ServiceError::from)?;
    Ok(Json(topics))
}

async fn get_topic(
    State(state): State<SharedState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> ApiResult<Topic> {
    let st = state.lock().await;
    Ok(Json(service::find_topic(st.store.as_ref(), &user, &id)?))
}

async fn create_topic(
    State(state): State<SharedState>,
    UserId(user): UserId,
    ApiJson(form): ApiJson<TopicForm>,
) -> Result<(StatusCode, Json<Topic>), ApiError> {
    let mut st = state.lock().await;
    let topic = service::create_topic(
        st.store.as_mut(),
        &user,
        &form.subject_id,
        &form.name,
        form.difficulty,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(topic)))
}

async fn update_topic(
    State(state): State<SharedState>,
    UserId(user): UserId,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TopicPatch>,
) -> ApiResult<Topic> {
    let changes = TopicChanges {
        name: patch.name,
        subject_id: patch.subject_id,
        difficulty: patch.difficulty,
    };
    let mut st = state.lock().await;
    Ok(Json(service::update_topic(st.store.as_mut(), &user, &id, changes)?))
}

async fn delete_topic(
    State(state): State<SharedState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut st = state.lock().await;
    service::delete_topic(st.store.as_mut(), &user, &id)?;
    Ok(Json(json!({ "id": id })))
}

async fn review_topic(
    State(state): State<SharedState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> ApiResult<Topic> {
    let mut guard = state.lock().await;
    let st = &mut *guard;
    let topic = service::review_topic(st.store.as_mut(), &user, &id, &st.engine, Utc::now())?;
    Ok(Json(topic))
}

async fn get_preferences(
    State(state): State<SharedState>,
    UserId(user): UserId,
) -> ApiResult<Preferences> {
    let st = state.lock().await;
    Ok(Json(service::preferences_for(st.store.as_ref(), &user)?))
}

async fn update_preferences(
    State(state): State<SharedState>,
    UserId(user): UserId,
    ApiJson(prefs): ApiJson<Preferences>,
) -> ApiResult<Preferences> {
    let mut st = state.lock().await;
    Ok(Json(service::update_preferences(st.store.as_mut(), &user, prefs)?))
}

// -- Server --

pub fn router(store: impl StudyStore + Send + 'static, engine: EngineConfig) -> Router {
    let state: SharedState = Arc::new(Mutex::new(ServerState {
        store: Box::new(store),
        engine,
    }));

    Router::new()
        .route("/", get(health))
        .route("/api/subjects", get(list_subjects).post(create_subject))
        .route(
            "/api/subjects/{id}",
            put(update_subject).delete(delete_subject),
        )
        .route("/api/topics", get(list_topics).post(create_topic))
        .route(
            "/api/topics/{id}",
            get(get_topic).put(update_topic).delete(delete_topic),
        )
        .route("/api/topics/{id}/review", put(review_topic))
        .route("/api/study/schedule", get(schedule))
        .route("/api/study/summary", get(summary))
        .route(
            "/api/preferences",
            get(get_preferences).put(update_preferences),
        )
        .fallback(not_found)
        .with_state(state)
}

pub async fn serve(
    store: impl StudyStore + Send + 'static,
    engine: EngineConfig,
    addr: SocketAddr,
) -> std::io::Result<()> {
    let app = router(store, engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
