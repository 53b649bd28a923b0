/**
 * FLEET HTTP API - REST surface of the shutdown tracker
 *
 * ROLE:
 * Exposes the dashboard model, KPIs and the mutating operations to the
 * web front-end and to scripts. Handlers stay thin: they decode the
 * request, call `Fleet` or a pure read model, and encode the result.
 *
 * ROUTES:
 * - open:       /health, /system/health, /status, /kpi, /inventory,
 *               /export.csv, /login, /logout
 * - privileged: /initiate_shutdown (/shutdown), /check_status,
 *               /trigger_ping, /edit_record, /delete_record, /upload
 *
 * BODIES:
 * Mutations take either a url-encoded form (the dashboard's jQuery posts)
 * or JSON, picked by `Content-Type`.
 *
 * ERRORS:
 * Every `FleetError` becomes `{ "ok": false, "message": ... }` with
 * 404 (unknown record), 409 (conflicting state) or 400 (bad upload).
 */

use crate::auth::{expired_cookie, require_privilege, session_cookie, Auth};
use crate::csv_io::{export_csv, parse_csv, ColumnMapping, ImportError};
use crate::error::{FleetError, FleetResult};
use crate::filter::{FilterQuery, FilterSpec};
use crate::health::{FleetHealth, HealthTracker};
use crate::inventory::Inventory;
use crate::kpi::{calculate_progress, compute_kpi, Kpi};
use crate::lifecycle::Fleet;
use crate::models::{parse_sequence, Pingable, RecordPatch, ServerKey, ServerStatus};
use crate::view::{dashboard, Dashboard};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info};

const UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Fleet,
    pub auth: Auth,
    pub health: HealthTracker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self { ok: true, message: message.into() })
    }

    pub fn failed(message: impl Into<String>) -> Json<Self> {
        Json(Self { ok: false, message: message.into() })
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let status = match &self {
            FleetError::NotFound(_) => StatusCode::NOT_FOUND,
            FleetError::AlreadyShutDown(_)
            | FleetError::DuplicateServer(_)
            | FleetError::SequenceBlocked { .. } => StatusCode::CONFLICT,
            FleetError::Import(ImportError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            FleetError::Import(_) => StatusCode::BAD_REQUEST,
        };
        (status, ActionResponse::failed(self.to_string())).into_response()
    }
}

/// Request body decoded from `application/x-www-form-urlencoded` when the
/// request says so, from JSON otherwise.
pub struct FormOrJson<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct KpiView {
    #[serde(flatten)]
    pub kpi: Kpi,
    pub progress: u8,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    password: String,
}

/// Accepts `"3"` as well as `3`, so JSON and form bodies decode alike.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Number(serde_json::Number),
        Flag(bool),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
        Loose::Text(text) => text,
        Loose::Number(n) => n.to_string(),
        Loose::Flag(true) => "yes".into(),
        Loose::Flag(false) => "no".into(),
    }))
}

#[derive(Debug, Deserialize)]
struct EditRequest {
    orig_owner: String,
    orig_app: String,
    orig_server: String,
    #[serde(default)]
    new_owner: Option<String>,
    #[serde(default)]
    new_app: Option<String>,
    #[serde(default)]
    new_server: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    new_status: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    new_shutdown_sequence: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    new_pingable: Option<String>,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl EditRequest {
    fn origin(&self) -> ServerKey {
        ServerKey::new(&self.orig_owner, &self.orig_app, &self.orig_server)
    }

    fn patch(&self) -> RecordPatch {
        RecordPatch {
            server: given(&self.new_server).map(str::to_string),
            status: given(&self.new_status).map(ServerStatus::parse),
            shutdown_sequence: given(&self.new_shutdown_sequence).map(parse_sequence),
            pingable: given(&self.new_pingable).map(Pingable::parse),
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let privileged = Router::new()
        .route("/initiate_shutdown", post(initiate_shutdown))
        .route("/shutdown", post(initiate_shutdown))
        .route("/check_status", post(check_status))
        .route("/trigger_ping", post(trigger_ping))
        .route("/edit_record", post(edit_record))
        .route("/delete_record", post(delete_record))
        .route("/upload", post(upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)))
        .route_layer(middleware::from_fn_with_state(
            app_state.auth.clone(),
            require_privilege,
        ));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/status", get(get_status))
        .route("/kpi", get(get_kpi))
        .route("/inventory", get(get_inventory))
        .route("/export.csv", get(get_export))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(privileged)
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<FleetHealth> {
    Json(app.health.get_health(app.fleet.inventory()))
}

// GET /status?filterOwner=..&filterSeqMin=..
async fn get_status(State(app): State<AppState>, Query(query): Query<FilterQuery>) -> Json<Dashboard> {
    let spec = FilterSpec::from(query);
    Json(dashboard(&app.fleet.inventory().read(), &spec))
}

// GET /kpi
async fn get_kpi(State(app): State<AppState>) -> Json<KpiView> {
    let inventory = app.fleet.inventory().read();
    Json(KpiView {
        kpi: compute_kpi(&inventory),
        progress: calculate_progress(&inventory),
    })
}

// GET /inventory (owner -> application -> records)
async fn get_inventory(State(app): State<AppState>) -> Json<Inventory> {
    Json(app.fleet.inventory().read().clone())
}

// GET /export.csv
async fn get_export(State(app): State<AppState>) -> FleetResult<impl IntoResponse> {
    let body = export_csv(&app.fleet.inventory().read())?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"inventory.csv\""),
        ],
        body,
    ))
}

// POST /login { password }
async fn login(State(app): State<AppState>, FormOrJson(req): FormOrJson<LoginRequest>) -> Response {
    match app.auth.login(&req.password) {
        Some(token) => (
            [(header::SET_COOKIE, session_cookie(&token, app.auth.ttl()))],
            ActionResponse::ok("Logged in."),
        )
            .into_response(),
        None => (StatusCode::UNAUTHORIZED, ActionResponse::failed("Invalid password.")).into_response(),
    }
}

// POST /logout
async fn logout(State(app): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    app.auth.logout(&headers);
    ([(header::SET_COOKIE, expired_cookie())], ActionResponse::ok("Logged out."))
}

// POST /initiate_shutdown { owner, application, server }
async fn initiate_shutdown(State(app): State<AppState>, FormOrJson(key): FormOrJson<ServerKey>) -> Response {
    match app.fleet.initiate_shutdown(&key) {
        Ok(()) => ActionResponse::ok(format!("Server '{}' has been shut down.", key.server)).into_response(),
        // unknown and already-down records read the same to the dashboard
        Err(FleetError::NotFound(key)) => (
            StatusCode::NOT_FOUND,
            ActionResponse::failed(FleetError::AlreadyShutDown(key).to_string()),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

// POST /check_status { owner, application, server }
async fn check_status(
    State(app): State<AppState>,
    FormOrJson(key): FormOrJson<ServerKey>,
) -> FleetResult<Json<serde_json::Value>> {
    let outcome = app.fleet.probe_and_update(&key).await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("Server '{}' is {}.", key.server, outcome.status),
        "status": outcome.status,
        "error": outcome.error,
    })))
}

// POST /trigger_ping
async fn trigger_ping(State(app): State<AppState>) -> Response {
    // detached so the report is recorded even if the client goes away
    let job = tokio::spawn(async move {
        let report = app.fleet.bulk_probe_and_update().await;
        app.health.record_bulk_probe(&report);
        report
    });

    match job.await {
        Ok(report) => Json(serde_json::json!({
            "ok": true,
            "message": "Ping test triggered and statuses updated.",
            "report": report,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "bulk probe task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, ActionResponse::failed("Error during ping tests.")).into_response()
        }
    }
}

// POST /edit_record { orig_*, new_* }
async fn edit_record(
    State(app): State<AppState>,
    FormOrJson(req): FormOrJson<EditRequest>,
) -> FleetResult<Json<ActionResponse>> {
    let from = req.origin();
    let new_owner = given(&req.new_owner).unwrap_or(&req.orig_owner);
    let new_app = given(&req.new_app).unwrap_or(&req.orig_app);
    app.fleet.edit(&from, new_owner, new_app, &req.patch())?;
    Ok(ActionResponse::ok("Record updated successfully."))
}

// POST /delete_record { owner, application, server }
async fn delete_record(
    State(app): State<AppState>,
    FormOrJson(key): FormOrJson<ServerKey>,
) -> FleetResult<Json<ActionResponse>> {
    app.fleet.delete(&key)?;
    Ok(ActionResponse::ok("Record deleted successfully."))
}

fn upload_error(e: MultipartError) -> FleetError {
    ImportError::Upload(e.to_string()).into()
}

// POST /upload (multipart: csv_file + map_* column names)
async fn upload(State(app): State<AppState>, mut multipart: Multipart) -> FleetResult<Json<ActionResponse>> {
    let mut mapping = ColumnMapping::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "csv_file" {
            let bytes = field.bytes().await.map_err(upload_error)?;
            if !bytes.is_empty() {
                file = Some(bytes);
            }
        } else if name.starts_with("map_") {
            let column = field.text().await.map_err(upload_error)?;
            mapping.set(&name, &column);
        }
    }

    let data = file.ok_or(ImportError::MissingFile)?;
    let rows = parse_csv(&data, &mapping)?;
    let added = app.fleet.import(rows);
    info!(added, "csv upload imported");
    Ok(ActionResponse::ok(format!("CSV imported successfully. {added} records added.")))
}
