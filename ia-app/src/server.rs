//! Insight Agent HTTP server and one-shot commands.

use crate::agent::AnalyticsAgent;
use crate::config::{ApiKeyStatus, InsightConfig};
use crate::routes;
use crate::tickets::TicketStore;
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use ia_llm::{ChatModel, LlmClient, validate_tool_name};
use ia_tickets::{GithubIssueSink, JiraIssueSink, TicketIntegrations, TrelloCardSink};
use ia_tools::SalesDb;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub agent: AnalyticsAgent,
    pub tickets: TicketStore,
    pub api_key: ApiKeyStatus,
}

impl AppState {
    pub fn new(
        model: Option<Arc<dyn ChatModel>>,
        db: SalesDb,
        system_prompt: &str,
        integrations: TicketIntegrations,
        api_key: ApiKeyStatus,
    ) -> Self {
        Self {
            agent: AnalyticsAgent::new(model, db.clone(), system_prompt),
            tickets: TicketStore::new(db, integrations),
            api_key,
        }
    }
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, path) = InsightConfig::load_with_path(config_path).await?;
    let key = cfg.api_key_status();
    tracing::info!(
        config_path = %path.display(),
        model = %cfg.general.model,
        llm_base_url = %cfg.llm.base_url,
        bind_addr = %cfg.server.bind_addr,
        db_path = %cfg.database.path,
        api_key_configured = key.configured,
        api_key_length = key.length,
        "config ok"
    );
    if let Some(error) = &key.error {
        tracing::warn!(%error, "model credential is not usable; /chat will return configuration errors");
    }
    preflight_validate_tool_names()?;

    let db = SalesDb::new(&cfg.database.path);
    if !db.exists() {
        return Err(anyhow::anyhow!(
            "database {} does not exist; run `insight-agent init-db` first",
            db.path().display()
        ));
    }
    let summary = db.summary().await?;
    tracing::info!(
        db_path = %db.path().display(),
        summary = %summary["summary"],
        "database ok"
    );

    let integrations = build_ticket_integrations(&cfg);
    tracing::info!(
        ticket_integrations = ?integrations.configured(),
        "ticket integrations checked"
    );
    Ok(())
}

pub async fn init_db(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = InsightConfig::load_with_path(config_path).await?.0;
    let db = SalesDb::new(&cfg.database.path);
    db.initialize().await?;
    tracing::info!(db_path = %db.path().display(), "database schema ready");
    println!("insight-agent init-db: schema ready at {}", db.path().display());
    Ok(())
}

pub fn print_tools() -> Result<()> {
    let tools: Vec<serde_json::Value> = ia_tools::catalog()
        .iter()
        .map(|spec| spec.describe())
        .collect();
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, cfg_path) = InsightConfig::load_with_path(config_path).await?;
    let addr = cfg.bind_addr()?;
    let key = cfg.api_key_status();
    tracing::info!(
        config_path = %cfg_path.display(),
        bind_addr = %addr,
        model = %cfg.general.model,
        llm_base_url = %cfg.llm.base_url,
        llm_timeout_seconds = cfg.llm.timeout_seconds,
        db_path = %cfg.database.path,
        http_timeout_seconds = cfg.server.http_timeout_seconds,
        http_max_in_flight = cfg.server.http_max_in_flight,
        cors_allow_any_origin = cfg.server.cors_allow_any_origin,
        api_key_configured = key.configured,
        "server configuration loaded"
    );
    preflight_validate_tool_names()?;
    let listener = preflight_bind_listener(addr).await?;

    let db = SalesDb::new(&cfg.database.path);
    if !db.exists() {
        tracing::warn!(
            db_path = %db.path().display(),
            "database file not found; analytics requests will fail until `insight-agent init-db` is run"
        );
    }

    let model = build_chat_model(&cfg)?;
    let integrations = build_ticket_integrations(&cfg);
    let state = Arc::new(AppState::new(
        model,
        db,
        &cfg.general.system_prompt,
        integrations,
        key,
    ));
    tracing::info!(
        llm_configured = state.agent.is_configured(),
        ticket_integrations = ?state.tickets.integrations().configured(),
        "collaborators initialized"
    );
    let app = build_app(state, &cfg);

    let shutdown = CancellationToken::new();
    tracing::info!(%addr, "insight-agent serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");
    Ok(())
}

pub fn build_app(state: Arc<AppState>, cfg: &InsightConfig) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    let mut app = routes::router().layer(Extension(state));
    if cfg.server.cors_allow_any_origin {
        app = app.layer(CorsLayer::permissive());
    }
    app.layer(GlobalConcurrencyLimitLayer::new(cfg.server.http_max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.server.http_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// `None` when the credential is missing or too short. Requests then get a
/// configuration error instead of a doomed upstream call.
fn build_chat_model(cfg: &InsightConfig) -> Result<Option<Arc<dyn ChatModel>>> {
    let status = cfg.api_key_status();
    let (Some(api_key), None) = (cfg.api_key(), status.error.as_deref()) else {
        tracing::warn!(
            error = ?status.error,
            "language model credential unusable; chat disabled until it is fixed"
        );
        return Ok(None);
    };
    let client = LlmClient::new(
        &cfg.llm.base_url,
        api_key,
        &cfg.general.model,
        Duration::from_secs(cfg.llm.timeout_seconds),
    )?;
    let model: Arc<dyn ChatModel> = Arc::new(client);
    Ok(Some(model))
}

fn build_ticket_integrations(cfg: &InsightConfig) -> TicketIntegrations {
    let mut out = TicketIntegrations::new();
    let ints = &cfg.integrations;

    if ints.github.is_configured() {
        match GithubIssueSink::new(&ints.github.token, &ints.github.repo) {
            Ok(sink) => out.register(Arc::new(sink)),
            Err(e) => tracing::warn!(system = "github", error = %e, "ticket integration disabled"),
        }
    }
    if ints.trello.is_configured() {
        match TrelloCardSink::new(&ints.trello.api_key, &ints.trello.token, &ints.trello.list_id) {
            Ok(sink) => out.register(Arc::new(sink)),
            Err(e) => tracing::warn!(system = "trello", error = %e, "ticket integration disabled"),
        }
    }
    if ints.jira.is_configured() {
        match JiraIssueSink::new(
            &ints.jira.url,
            &ints.jira.email,
            &ints.jira.token,
            &ints.jira.project,
        ) {
            Ok(sink) => out.register(Arc::new(sink)),
            Err(e) => tracing::warn!(system = "jira", error = %e, "ticket integration disabled"),
        }
    }
    out
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn preflight_validate_tool_names() -> Result<()> {
    let tools = ia_tools::tool_definitions();
    for tool in &tools {
        validate_tool_name(&tool.name).map_err(|e| {
            anyhow::anyhow!(
                "preflight tool name validation failed for '{}': {e}",
                tool.name
            )
        })?;
    }
    tracing::info!(tool_count = tools.len(), "preflight tool name validation passed");
    Ok(())
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}
