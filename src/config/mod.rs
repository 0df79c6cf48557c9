//! Configuration module for the storefront backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the admin write routes
    pub admin_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory backing the object storage; `None` leaves storage unconfigured
    pub media_dir: Option<PathBuf>,
    /// Public URL prefix under which stored objects are served
    pub media_base_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// How long an upload may take before the inline fallback is used
    pub upload_timeout: Duration,
    /// Width cap for inline-encoded images
    pub max_image_width: u32,
    /// JPEG quality (1-100) for inline-encoded images
    pub jpeg_quality: u8,
    /// Whether editing a record without any image is rejected
    pub require_image_on_edit: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let admin_key = env::var("STOREFRONT_ADMIN_KEY").ok();

        let db_path = env::var("STOREFRONT_DB_PATH")
            .unwrap_or_else(|_| "./data/storefront.sqlite".to_string())
            .into();

        let media_dir = env::var("STOREFRONT_MEDIA_DIR").ok().map(PathBuf::from);

        let media_base_url =
            env::var("STOREFRONT_MEDIA_BASE_URL").unwrap_or_else(|_| "/media".to_string());

        let bind_addr = env::var("STOREFRONT_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid STOREFRONT_BIND_ADDR format");

        let log_level = env::var("STOREFRONT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("STOREFRONT_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let upload_timeout = Duration::from_millis(parse_or("STOREFRONT_UPLOAD_TIMEOUT_MS", 5000));
        let max_image_width = parse_or("STOREFRONT_MAX_IMAGE_WIDTH", 800);
        let jpeg_quality = parse_or::<u8>("STOREFRONT_JPEG_QUALITY", 70).clamp(1, 100);
        let require_image_on_edit = parse_or("STOREFRONT_REQUIRE_IMAGE_ON_EDIT", false);

        Self {
            admin_key,
            db_path,
            media_dir,
            media_base_url,
            bind_addr,
            log_level,
            log_format,
            upload_timeout,
            max_image_width,
            jpeg_quality,
            require_image_on_edit,
        }
    }
}

/// Read and parse an environment variable, falling back to `default` when unset or malformed.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
