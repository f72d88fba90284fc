use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::{Header, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, options, post, routes, Build, Request, Response, Rocket, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use common::Config;

use crate::assistant::{self, ReplySettings};
use crate::llm::LlmProvider;
use crate::news::{CategoryFilter, NewsGateway, NewsItem};
use crate::resources::{self, Resource};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub llm_provider: Option<Arc<dyn LlmProvider>>,
    pub reply_settings: ReplySettings,
    pub news: NewsGateway,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    llm_configured: bool,
    news_cache_age_seconds: Option<i64>,
}

#[derive(Deserialize)]
struct ChatRequest {
    // Kept loose so a non-string message is answered with our own 400
    message: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

#[derive(Deserialize)]
struct NewsRequest {
    category: Option<String>,
}

#[derive(Serialize)]
struct NewsResponse {
    news: Vec<NewsItem>,
}

#[derive(Serialize)]
struct ResourcesResponse {
    resources: &'static [Resource],
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = Custom<Json<ErrorBody>>;

fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    Custom(status, Json(ErrorBody { error: message.into() }))
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Uptime, whether a model is configured, and how old the cached news is.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let now = Utc::now();
    let news_cache_age_seconds = match state.news.cache_age(now).await {
        Ok(age) => age.map(|a| a.num_seconds()),
        Err(e) => {
            tracing::warn!("status: failed to read news cache: {}", e);
            None
        }
    };

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: (now - state.started_at).num_seconds(),
        llm_configured: state.llm_provider.is_some(),
        news_cache_age_seconds,
    })
}

#[post("/api/v1/chat", data = "<body>")]
async fn chat(
    state: &State<AppState>,
    body: Option<Json<ChatRequest>>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = body
        .as_ref()
        .and_then(|b| b.message.as_ref())
        .and_then(|m| m.as_str());

    assistant::reply(state.llm_provider.as_deref(), message, state.reply_settings)
        .await
        .map(|response| Json(ChatResponse { response }))
        .map_err(|e| {
            let status = Status::from_code(e.status_code()).unwrap_or(Status::InternalServerError);
            api_error(status, e.to_string())
        })
}

#[post("/api/v1/news", data = "<body>")]
async fn news(
    state: &State<AppState>,
    body: Option<Json<NewsRequest>>,
) -> Result<Json<NewsResponse>, ApiError> {
    let category = body.as_ref().and_then(|b| b.category.as_deref());
    load_news(state, category).await
}

#[get("/api/v1/news?<category>")]
async fn news_query(
    state: &State<AppState>,
    category: Option<String>,
) -> Result<Json<NewsResponse>, ApiError> {
    load_news(state, category.as_deref()).await
}

async fn load_news(state: &AppState, category: Option<&str>) -> Result<Json<NewsResponse>, ApiError> {
    tracing::info!("Fetching news for category: {:?}", category);
    let filter = CategoryFilter::parse(category);

    state
        .news
        .news(filter, Utc::now())
        .await
        .map(|news| Json(NewsResponse { news }))
        .map_err(|e| {
            tracing::error!("Error fetching news: {:#}", e);
            api_error(Status::InternalServerError, e.to_string())
        })
}

#[get("/api/v1/resources")]
async fn list_resources() -> Json<ResourcesResponse> {
    Json(ResourcesResponse {
        resources: resources::all(),
    })
}

/// Answer CORS preflight requests for any path.
#[options("/<_..>")]
async fn preflight() -> Status {
    Status::Ok
}

/// Adds the permissive CORS headers browser clients need
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        res.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "authorization, x-client-info, apikey, content-type",
        ));
    }
}

// ============================================================================
// Database Schema Management
// ============================================================================

/// Ensure the required schema exists. Idempotent and safe to call at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    tracing::info!("server: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news_cache (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            news_data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("failed to ensure schema")?;

    tracing::info!("server: DB schema ensured");
    Ok(())
}

/// Build a Rocket instance with managed state and every route mounted.
pub fn build_rocket(figment: Figment, state: AppState) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .attach(Cors)
        .mount(
            "/",
            routes![
                health,
                status,
                chat,
                news,
                news_query,
                list_resources,
                preflight,
            ],
        )
}

/// Build and launch the Rocket server.
///
/// `[server] bind/port` from the configuration are merged into Rocket's figment. This
/// function blocks until the Rocket server shuts down and returns an error if Rocket
/// fails to start.
pub async fn launch_rocket(config: &Config, state: AppState) -> Result<()> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    tracing::info!("Starting Rocket HTTP server");
    build_rocket(fig, state)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
