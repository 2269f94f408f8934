use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod error;
pub mod playmat;
pub mod startup_checks;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    pub overlays: OverlayConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

/// Output size of every composed playmat. 2400x1400 is 24"x14" at 100 DPI.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverlayConfig {
    pub directory: PathBuf,
    #[serde(default = "default_overlay")]
    pub default_overlay: String,
    #[serde(default = "default_true")]
    pub preload: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub max_dimension: u32,
    pub processing_timeout_secs: u64,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
}

fn default_overlay() -> String {
    "white".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 2400,
            height: 1400,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            max_dimension: 20_000,
            processing_timeout_secs: 60,
            output_directory: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            app: AppConfig {
                name: "Playmat Builder".to_string(),
                log_level: "info".to_string(),
            },
            canvas: CanvasConfig::default(),
            overlays: OverlayConfig {
                directory: PathBuf::from("templates"),
                default_overlay: default_overlay(),
                preload: true,
            },
            uploads: UploadConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml_edit::de::Error),

    #[error("Invalid PORT value: {0:?}")]
    InvalidPort(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml_edit::de::from_str::<Config>(&content)?)
    }

    /// Apply the `PORT` environment variable on top of the file configuration.
    pub fn apply_port_override(&mut self, port: Option<&str>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.server.port = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(raw.to_string()))?;
            }
        }
        Ok(())
    }

    /// The log filter to use when `RUST_LOG` is unset: the command-line value if given,
    /// otherwise `[app] log_level`.
    pub fn log_level(&self, cli_level: Option<&str>) -> String {
        cli_level.unwrap_or(&self.app.log_level).to_lowercase()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "canvas dimensions must be non-zero, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        if self.uploads.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "uploads.max_bytes must be non-zero".to_string(),
            ));
        }
        if self.uploads.max_dimension == 0 {
            return Err(ConfigError::Invalid(
                "uploads.max_dimension must be non-zero".to_string(),
            ));
        }
        if self.uploads.processing_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "uploads.processing_timeout_secs must be non-zero".to_string(),
            ));
        }
        playmat::validate_selector(&self.overlays.default_overlay)
            .map_err(|e| ConfigError::Invalid(format!("overlays.default_overlay: {}", e)))?;
        Ok(())
    }
}

use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub compositor: Arc<playmat::Compositor>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let compositor = playmat::Compositor::from_config(&config)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            compositor: Arc::new(compositor),
            config,
        })
    }
}

/// Permissive CORS: any origin, method and header, with credentials. Wildcards are
/// not allowed alongside credentials, so the request's own values are mirrored back.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([axum::http::header::CONTENT_DISPOSITION])
}

pub fn create_app(app_state: AppState) -> Router {
    let max_bytes = app_state.config.uploads.max_bytes;

    Router::new()
        .route("/", axum::routing::get(playmat::health_handler))
        .route("/upload/", axum::routing::post(playmat::upload_handler))
        .route("/upload", axum::routing::post(playmat::upload_handler))
        .layer(DefaultBodyLimit::max(max_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &axum::http::Request<_>| {
                            let method = request.method();
                            let uri = request.uri();
                            let matched_path = request
                                .extensions()
                                .get::<axum::extract::MatchedPath>()
                                .map(|matched_path| matched_path.as_str());

                            tracing::info_span!(
                                "http_request",
                                method = %method,
                                uri = %uri,
                                matched_path,
                            )
                        })
                        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                            let origin = request
                                .headers()
                                .get("origin")
                                .and_then(|h: &HeaderValue| h.to_str().ok())
                                .unwrap_or("-");

                            tracing::info!(
                                target: "access_log",
                                method = %request.method(),
                                path = %request.uri().path(),
                                origin = %origin,
                                "request"
                            );
                        })
                        .on_response(
                            |response: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             _span: &tracing::Span| {
                                let size = response
                                    .headers()
                                    .get("content-length")
                                    .and_then(|h| h.to_str().ok())
                                    .unwrap_or("-");

                                tracing::info!(
                                    target: "access_log",
                                    status = %response.status(),
                                    size = %size,
                                    latency_ms = %latency.as_millis(),
                                    "response"
                                );
                            },
                        ),
                )
                .layer(cors_layer()),
        )
        .with_state(app_state)
}
