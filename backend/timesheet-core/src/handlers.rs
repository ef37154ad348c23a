// src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use bytes::Bytes;
use chrono::{Datelike, Local};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::{clear_session_cookie, session_cookie, AuthUser, SessionStore, UserStore};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::ingest::{merge_entries, parse_workbook};
use crate::reference;
use crate::spreadsheet::preview_first_sheet;
use crate::statistics::{build_report, Selection, StatisticsReport, DEFAULT_JOB_TYPE};
use crate::store::JsonStore;
use crate::timesheet::{employee_key, TimesheetEntry};

// --- Application State ---

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: JsonStore,
    pub users: Arc<Mutex<UserStore>>,
    pub sessions: Arc<Mutex<SessionStore>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: JsonStore, users: UserStore) -> Self {
        let sessions = SessionStore::new(config.session_lifetime_secs);
        Self {
            config: Arc::new(config),
            store,
            users: Arc::new(Mutex::new(users)),
            sessions: Arc::new(Mutex::new(sessions)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/upload", post(handle_upload))
        .route("/statistics", get(handle_statistics_query).post(handle_statistics_body))
        .route("/dashboard", get(handle_dashboard_query).post(handle_dashboard_body))
        .route("/preview", post(handle_preview))
        .route("/settings", get(handle_settings))
        .route("/add_person", post(handle_add_person))
        .route("/remove_person", post(handle_remove_person))
        .route("/add_customer", post(handle_add_customer))
        .route("/login", post(handle_login))
        .route("/register", post(handle_register))
        .route("/logout", post(handle_logout))
        .layer(cors_layer(&state.config.cors_origin));

    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);
    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!("CORS_ORIGIN '{}' is not a valid header value; cross-origin calls will be refused", origin);
            layer
        }
    }
}

// --- Request Parsing ---

/// JSON or urlencoded form body, chosen by `Content-Type`. A body without a
/// content type reads as the default value.
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match content_type {
            Some(ct) if ct.starts_with("application/json") => {
                let Json(value) = Json::<T>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Payload(value))
            }
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                let Form(value) = Form::<T>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Payload(value))
            }
            Some(ct) => Err(AppError::BadRequest(format!(
                "Unsupported content type '{}'.",
                ct
            ))),
            None => Ok(Payload(T::default())),
        }
    }
}

/// A number that may arrive as a JSON number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    /// `Ok(None)` for an empty string.
    fn to_i64(&self, what: &str) -> Result<Option<i64>, AppError> {
        let invalid = || AppError::BadRequest(format!("{} must be a number.", what));
        match self {
            Numeric::Int(n) => Ok(Some(*n)),
            Numeric::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(Some(*f as i64)),
            Numeric::Float(_) => Err(invalid()),
            Numeric::Text(s) if s.trim().is_empty() => Ok(None),
            Numeric::Text(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        }
    }
}

/// Year and month from the request, falling back to today's local date.
fn resolve_period(year: Option<&Numeric>, month: Option<&Numeric>) -> Result<(i32, u32), AppError> {
    let today = Local::now();

    let year = match year {
        Some(raw) => match raw.to_i64("year")? {
            Some(y) => i32::try_from(y)
                .map_err(|_| AppError::BadRequest(format!("Year {} is out of range.", y)))?,
            None => today.year(),
        },
        None => today.year(),
    };

    let month = match month {
        Some(raw) => match raw.to_i64("month")? {
            Some(m) if (1..=12).contains(&m) => m as u32,
            Some(m) => {
                return Err(AppError::BadRequest(format!(
                    "Month must be between 1 and 12, got {}.",
                    m
                )))
            }
            None => today.month(),
        },
        None => today.month(),
    };

    Ok((year, month))
}

// --- General ---

async fn handle_home() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to the timesheet statistics API!",
        "status": "success",
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// --- Upload & Preview ---

/// Pulls the `file` part out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read uploaded file: {}", e)))?;
        return Ok(Some((file_name, data)));
    }
    Ok(None)
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: &'static str,
    status: &'static str,
    employee: String,
    employee_key: String,
    added: usize,
    skipped: usize,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let invalid = || {
        AppError::InvalidFormat("Invalid file format. Please upload an Excel file.".to_string())
    };
    let (file_name, data) = read_file_field(&mut multipart).await?.ok_or_else(invalid)?;
    if !file_name.ends_with(".xlsx") {
        return Err(invalid());
    }
    info!("Received timesheet upload '{}' ({} bytes)", file_name, data.len());

    let parsed = tokio::task::spawn_blocking(move || parse_workbook(&data))
        .await
        .map_err(|e| AppError::ProcessingFailure(format!("Parser task failed: {}", e)))??;

    let existing = state
        .store
        .load_timesheet(&parsed.employee_key)?
        .unwrap_or_default();
    let outcome = merge_entries(existing, parsed.entries);
    state
        .store
        .save_timesheet(&parsed.employee_key, &outcome.entries)?;

    info!(
        "Stored timesheet for '{}' ({}-{:02}): {} added, {} skipped",
        parsed.employee_name, parsed.year, parsed.month, outcome.added, outcome.skipped
    );

    Ok(Json(UploadResponse {
        message: "Excel file uploaded and tasks added successfully.",
        status: "success",
        employee: parsed.employee_name,
        employee_key: parsed.employee_key,
        added: outcome.added,
        skipped: outcome.skipped,
    }))
}

async fn handle_preview(
    _user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let (_, data) = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest("No file provided.".to_string()))?;

    let records = tokio::task::spawn_blocking(move || preview_first_sheet(&data))
        .await
        .map_err(|e| AppError::ProcessingFailure(format!("Preview task failed: {}", e)))??;

    Ok(Json(json!({ "data": records })))
}

// --- Statistics ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatisticsParams {
    pub year: Option<Numeric>,
    pub month: Option<Numeric>,
    pub job_type: Option<String>,
    pub timesheet_file: Option<String>,
}

fn statistics_for(state: &AppState, params: StatisticsParams) -> Result<StatisticsReport, AppError> {
    let (year, month) = resolve_period(params.year.as_ref(), params.month.as_ref())?;
    let selection = Selection {
        year,
        month,
        job_type: params
            .job_type
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string()),
        timesheet_file: params
            .timesheet_file
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| state.config.team_scope.clone()),
    };
    build_report(&state.store, &state.config.team_scope, selection)
}

async fn handle_statistics_query(
    State(state): State<AppState>,
    Query(params): Query<StatisticsParams>,
) -> Result<Json<StatisticsReport>, AppError> {
    Ok(Json(statistics_for(&state, params)?))
}

async fn handle_statistics_body(
    State(state): State<AppState>,
    Payload(params): Payload<StatisticsParams>,
) -> Result<Json<StatisticsReport>, AppError> {
    Ok(Json(statistics_for(&state, params)?))
}

// --- Dashboard ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DashboardParams {
    pub json_file: Option<String>,
    pub year: Option<Numeric>,
    pub month: Option<Numeric>,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub json_files: Vec<String>,
    pub timesheet: Vec<TimesheetEntry>,
    pub selected_file: Option<String>,
    pub selected_year: i32,
    pub selected_month: u32,
}

fn dashboard_for(store: &JsonStore, params: DashboardParams) -> Result<DashboardView, AppError> {
    let (year, month) = resolve_period(params.year.as_ref(), params.month.as_ref())?;
    let json_files = store
        .list_timesheets()?
        .into_iter()
        .map(|key| format!("{}.json", key))
        .collect();

    let selected_file = params.json_file.filter(|s| !s.trim().is_empty());
    let timesheet = match &selected_file {
        Some(file) => {
            let key = employee_key(file.trim_end_matches(".json"));
            store
                .load_timesheet(&key)?
                .ok_or_else(|| AppError::NotFound(format!("Timesheet '{}' not found.", file)))?
                .into_iter()
                .filter(|entry| entry.is_in_period(year, month))
                .collect()
        }
        None => Vec::new(),
    };

    Ok(DashboardView {
        json_files,
        timesheet,
        selected_file,
        selected_year: year,
        selected_month: month,
    })
}

async fn handle_dashboard_query(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardView>, AppError> {
    Ok(Json(dashboard_for(&state.store, params)?))
}

async fn handle_dashboard_body(
    _user: AuthUser,
    State(state): State<AppState>,
    Payload(params): Payload<DashboardParams>,
) -> Result<Json<DashboardView>, AppError> {
    Ok(Json(dashboard_for(&state.store, params)?))
}

// --- Reference Lists ---

fn success(message: &str) -> Json<Value> {
    Json(json!({ "message": message, "status": "success" }))
}

async fn handle_settings(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<reference::Settings>, AppError> {
    Ok(Json(reference::settings(&state.store)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddPersonRequest {
    pub new_person_name: String,
    pub new_person_staff_number: String,
}

async fn handle_add_person(
    _user: AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<AddPersonRequest>,
) -> Result<Json<Value>, AppError> {
    reference::add_person(&state.store, &req.new_person_name, &req.new_person_staff_number)?;
    Ok(success("Person added successfully!"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemovePersonRequest {
    pub remove_person: String,
}

async fn handle_remove_person(
    _user: AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<RemovePersonRequest>,
) -> Result<Json<Value>, AppError> {
    reference::remove_person(&state.store, &req.remove_person)?;
    Ok(success("Person removed successfully!"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddCustomerRequest {
    pub new_customer_name: String,
    pub new_customer_type: String,
}

async fn handle_add_customer(
    _user: AuthUser,
    State(state): State<AppState>,
    Payload(req): Payload<AddCustomerRequest>,
) -> Result<Json<Value>, AppError> {
    reference::add_customer(&state.store, &req.new_customer_name, &req.new_customer_type)?;
    Ok(success("Customer added successfully!"))
}

// --- Accounts ---

/// Runs `f` against the credential store on a blocking thread. Argon2 stays off the async workers.
async fn with_users<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut UserStore) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let users = state.users.clone();
    tokio::task::spawn_blocking(move || {
        let mut table = users.blocking_lock();
        f(&mut *table)
    })
    .await
    .map_err(|e| AppError::ProcessingFailure(format!("Credential task failed: {}", e)))?
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

async fn handle_login(
    State(state): State<AppState>,
    Payload(req): Payload<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user_id, password) = (req.user_id.clone(), req.password);
    with_users(&state, move |users| {
        users.authenticate(&user_id, &password).map(|_| ())
    })
    .await?;

    let mut sessions = state.sessions.lock().await;
    let session = sessions.create(&req.user_id);
    let cookie = session_cookie(&session.id, sessions.lifetime_secs());
    info!("User '{}' logged in", req.user_id);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "message": "Login successful.",
            "status": "success",
            "user_id": req.user_id,
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub user_id: String,
    pub password: String,
}

async fn handle_register(
    State(state): State<AppState>,
    Payload(req): Payload<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    with_users(&state, move |users| {
        users.register(&req.name, &req.user_id, &req.password)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        success("Registration successful. Please log in."),
    ))
}

async fn handle_logout(
    user: AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    state.sessions.lock().await.remove(&user.session_id);
    info!("User '{}' logged out", user.user_id);
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        success("Logged out successfully."),
    )
}
