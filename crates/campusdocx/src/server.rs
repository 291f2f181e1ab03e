use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use crate::calendar::{self, MonthView};
use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::html;
use crate::types::{
    Entry, LoginRequest, LoginResponse, Section, SpecialKind, Table, ADMIN_USERNAME, SCHOOL,
    SPECIAL, WHATIDID,
};
use crate::validation;

/// Application state shared across requests
pub struct AppState {
    pub db: Mutex<Connection>,
    pub config: Config,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> Self {
        Self {
            db: Mutex::new(conn),
            config,
        }
    }
}

type SharedState = Arc<AppState>;

/// Open the database, seed the admin user and start the web server
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let conn = db::init_db(&config.db_path, &config.migrations_dir)?;
    if db::ensure_admin(&conn, &config.admin_password)? {
        info!(username = ADMIN_USERNAME, "Created admin user");
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let state = Arc::new(AppState::new(conn, config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server running");

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(|| async { "OK" }))
        .route("/view/day/{section}/{date}", get(day_view_handler))
        .route("/view/special/{kind}", get(special_view_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/school", post(save_school_handler))
        .route("/api/school/{date}", get(get_school_handler))
        .route("/api/whatidid", post(save_whatidid_handler))
        .route("/api/whatidid/{date}", get(get_whatidid_handler))
        .route("/api/special", post(save_special_handler))
        .route("/api/special/{kind}", get(get_special_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    section: Option<String>,
    month: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewQuery {
    #[serde(default)]
    edit: bool,
}

/// Serve the calendar page
async fn index_handler(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let section = query
        .section
        .as_deref()
        .and_then(Section::parse)
        .unwrap_or(Section::School);
    let requested = query.month.as_deref().and_then(calendar::parse_month);
    let today = Local::now().date_naive();

    let month = MonthView::new(requested, today, state.config.min_date);
    Html(html::render_page(section, &month).into_string())
}

/// Read the entry for `key`, falling back to the empty default.
///
/// Reads never validate the key: a key that cannot have been written simply
/// has no row.
async fn load_entry(
    state: &AppState,
    table: &'static Table,
    key: &str,
) -> Result<Entry, AppError> {
    let conn = state.db.lock().await;
    let entry = db::get_entry(&conn, table, key)
        .map_err(AppError::storage(format!("Failed to get {}", table.noun)))?;
    Ok(entry.unwrap_or_else(|| Entry::empty(table, key)))
}

/// Validate a JSON body and upsert it into `table`
async fn save_entry(
    state: &AppState,
    table: &'static Table,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entry>, AppError> {
    let Json(body) = payload?;
    let input = validation::validate_entry(table, &body).map_err(AppError::Validation)?;

    let conn = state.db.lock().await;
    let entry = db::upsert_entry(&conn, &input)
        .map_err(AppError::storage(format!("Failed to save {}", table.noun)))?;
    info!(table = table.name, key = %entry.key, fields = input.values.len(), "Saved entry");

    Ok(Json(entry))
}

async fn get_school_handler(
    State(state): State<SharedState>,
    Path(date): Path<String>,
) -> Result<Json<Entry>, AppError> {
    load_entry(&state, &SCHOOL, &date).await.map(Json)
}

async fn save_school_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entry>, AppError> {
    save_entry(&state, &SCHOOL, payload).await
}

async fn get_whatidid_handler(
    State(state): State<SharedState>,
    Path(date): Path<String>,
) -> Result<Json<Entry>, AppError> {
    load_entry(&state, &WHATIDID, &date).await.map(Json)
}

async fn save_whatidid_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entry>, AppError> {
    save_entry(&state, &WHATIDID, payload).await
}

async fn get_special_handler(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> Result<Json<Entry>, AppError> {
    load_entry(&state, &SPECIAL, &kind).await.map(Json)
}

async fn save_special_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entry>, AppError> {
    save_entry(&state, &SPECIAL, payload).await
}

/// Check the admin credentials
async fn login_handler(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;
    let Some((username, password)) = request.credentials() else {
        return Err(AppError::InvalidCredentials);
    };
    if username != ADMIN_USERNAME {
        warn!(%username, "Login attempt for non-admin user");
        return Err(AppError::InvalidCredentials);
    }

    let conn = state.db.lock().await;
    let user = db::get_user_by_username(&conn, username)
        .map_err(AppError::storage("Authentication failed"))?;

    match user {
        Some(user) if user.password == password => {
            info!(username = %user.username, "Admin logged in");
            Ok(Json(LoginResponse {
                success: true,
                user: user.into(),
            }))
        }
        _ => {
            warn!(%username, "Rejected login");
            Err(AppError::InvalidCredentials)
        }
    }
}

/// Day modal fragment, read-only or editable
async fn day_view_handler(
    State(state): State<SharedState>,
    Path((section, date)): Path<(String, String)>,
    Query(query): Query<ViewQuery>,
) -> Result<Html<String>, AppError> {
    let Some(section) = Section::parse(&section) else {
        return Err(AppError::BadRequest(format!("Unknown section: {}", section)));
    };
    let day = validation::parse_date("date", &date)?;
    let entry = load_entry(&state, section.table(), &date).await?;

    let markup = html::render_day_modal(section, day, &entry, query.edit);
    Ok(Html(markup.into_string()))
}

/// Special modal fragment, read-only or editable
async fn special_view_handler(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Html<String>, AppError> {
    let Some(kind) = SpecialKind::parse(&kind) else {
        return Err(AppError::BadRequest(format!("Unknown special entry type: {}", kind)));
    };
    let entry = load_entry(&state, &SPECIAL, kind.as_str()).await?;
    let markup = html::render_special_modal(kind, &entry, query.edit);
    Ok(Html(markup.into_string()))
}
