//! HTTP backend for the stock screening dashboard.
//!
//! Serves the user watchlist and proxies scan requests to the external
//! stock analysis API.

pub mod config;
pub mod identity;
pub mod request_id;
pub mod security_headers;
pub mod stock_routes;
pub mod watchlist_routes;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use scan_client::ScanClient;
use screener_core::WatchlistRepository;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use watchlist_store::{InMemoryWatchlistStore, SqliteWatchlistStore};

use config::{ServerConfig, StorageBackend};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WatchlistRepository>,
    pub scan: ScanClient,
    pub default_user_id: Arc<str>,
    pub storage_name: &'static str,
}

impl AppState {
    pub fn new(
        store: Arc<dyn WatchlistRepository>,
        scan: ScanClient,
        default_user_id: impl Into<Arc<str>>,
        storage_name: &'static str,
    ) -> Self {
        Self {
            store,
            scan,
            default_user_id: default_user_id.into(),
            storage_name,
        }
    }
}

/// Error returned by handlers, rendered as `{"error": ..., "message": ...}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: String,
    source: anyhow::Error,
    details: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, error: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            status,
            error: error.into(),
            source,
            details: None,
        }
    }

    /// Client-side failure where the summary and the message are the same text.
    pub fn client(status: StatusCode, message: &str) -> Self {
        Self::new(status, message, anyhow::anyhow!(message.to_string()))
    }

    /// Unexpected failure with a generic summary and the cause as message.
    pub fn internal(error: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, source.into())
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Keep the rejection's status (400, 415 or 422) and report its text.
    pub fn from_json_rejection(rejection: JsonRejection) -> Self {
        Self::new(
            rejection.status(),
            "Invalid request body",
            anyhow::anyhow!(rejection.body_text()),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {:#}", self.error, self.source);
        } else {
            tracing::debug!("{} ({})", self.error, self.status);
        }

        let mut body = json!({
            "error": self.error,
            "message": self.source.to_string(),
        });
        if let Some(details) = self.details {
            body["details"] = json!(details);
        }

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::internal("Internal server error", err)
    }
}

/// `Json` body extractor whose rejections render like every other [`AppError`].
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ApiJson(value))
            .map_err(AppError::from_json_rejection)
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.storage_name,
        "scan_api": state.scan.base_url(),
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// Assemble every route and middleware around `state`.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(watchlist_routes::watchlist_routes())
        .merge(stock_routes::stock_routes())
        .layer(middleware::from_fn(security_headers::security_headers_middleware))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // try_init: a subscriber may already be installed (tests, embedding)
    let result = if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

async fn open_store(storage: &StorageBackend) -> anyhow::Result<Arc<dyn WatchlistRepository>> {
    Ok(match storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory watchlist storage; items are lost on restart");
            Arc::new(InMemoryWatchlistStore::new())
        }
        StorageBackend::Sqlite(url) => Arc::new(
            SqliteWatchlistStore::connect(url)
                .await
                .with_context(|| format!("Failed to open watchlist database {url}"))?,
        ),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting stock screener API");
    tracing::info!("  Scan API: {} (timeout {:?})", config.scan.base_url, config.scan.timeout);
    tracing::info!("  Storage: {}", config.storage.name());
    tracing::info!("  Default user: {}", config.default_user_id);

    let store = open_store(&config.storage).await?;
    let scan = ScanClient::new(config.scan.clone()).context("Failed to build scan API client")?;
    let state = AppState::new(
        store,
        scan,
        config.default_user_id.as_str(),
        config.storage.name(),
    );

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
