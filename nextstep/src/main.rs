/*
nextstep - server main.rs
This binary starts the Rocket HTTP server serving the chat, news and resources endpoints.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use common::{init_db_pool, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use nextstep::assistant::ReplySettings;
use nextstep::llm::remote::RemoteLlmProvider;
use nextstep::llm::LlmProvider;
use nextstep::news::{NewsGateway, RssFeedSource, SqliteNewsCache};
use nextstep::server::{self, AppState};

const DEFAULT_LLM_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Parser, Debug)]
#[command(name = "nextstep", about = "NextStep chat, news and resources server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Refresh the news cache before accepting requests
    #[arg(long)]
    warm_cache: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let db_pool = match init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %config.database.path, "failed to initialize database pool");
            return Err(e);
        }
    };
    server::ensure_schema(&db_pool).await?;

    let (llm_provider, reply_settings) = match &config.llm {
        Some(llm_config) => match create_llm_provider(llm_config) {
            Ok(Some((provider, settings))) => (Some(provider), settings),
            Ok(None) => {
                info!("LLM adapter 'none': chat endpoint will report the service as not configured");
                (None, ReplySettings::default())
            }
            Err(e) => {
                error!("Failed to initialize LLM provider: {:#}", e);
                (None, ReplySettings::default())
            }
        },
        None => {
            warn!("No [llm] section in configuration; chat is disabled");
            (None, ReplySettings::default())
        }
    };

    let news = build_news_gateway(&config, db_pool.clone())?;

    if args.warm_cache {
        info!("Warming news cache");
        if let Err(e) = news.refresh(Utc::now()).await {
            // Requests will refetch on their own
            warn!("news cache warm-up failed: {:#}", e);
        }
    }

    let state = AppState {
        started_at: Utc::now(),
        llm_provider,
        reply_settings,
        news,
    };

    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(&config, state).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Create the LLM provider described by the configuration.
/// Returns `Ok(None)` when the adapter is explicitly `none`.
fn create_llm_provider(
    llm_config: &common::LlmConfig,
) -> Result<Option<(Arc<dyn LlmProvider>, ReplySettings)>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("remote");
    match adapter {
        "remote" => {
            let remote_config = llm_config
                .remote
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Remote adapter selected but no [llm.remote] config found"))?;

            let api_key_env = remote_config
                .api_key_env
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in remote config"))?;

            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
            let api_url = remote_config.api_url.clone().unwrap_or_else(|| DEFAULT_LLM_URL.to_string());
            let settings = ReplySettings {
                max_tokens: remote_config.max_tokens.unwrap_or(200),
                temperature: remote_config.temperature.unwrap_or(0.7),
            };

            let provider = RemoteLlmProvider::new(&api_url, api_key, &model).with_defaults(
                remote_config.timeout_seconds.unwrap_or(30),
                settings.max_tokens,
                settings.temperature,
            );
            info!(model = %model, url = %api_url, "LLM provider initialized: remote");
            Ok(Some((Arc::new(provider), settings)))
        }
        "none" => Ok(None),
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

fn build_news_gateway(config: &Config, pool: sqlx::SqlitePool) -> Result<NewsGateway> {
    let news_cfg = &config.news;
    let source = RssFeedSource::new(
        &news_cfg.feed_url,
        news_cfg.source_name.clone().unwrap_or_else(|| "NextStep News".to_string()),
        news_cfg.fetch_timeout_seconds(),
    )?;
    info!(feed = %source.url(), ttl_hours = news_cfg.cache_ttl_hours(), "news gateway configured");

    Ok(NewsGateway::new(Arc::new(SqliteNewsCache::new(pool)), Arc::new(source)).with_limits(
        chrono::Duration::hours(news_cfg.cache_ttl_hours()),
        news_cfg.max_items(),
    ))
}
