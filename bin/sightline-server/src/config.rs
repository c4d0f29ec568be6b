//! Server configuration, loaded from environment variables at startup.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for sightline-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; only generation calls need `OPENAI_API_KEY`.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://sightline.db"`).
    pub database_url: String,

    /// Directory uploaded photos are written to and served from.
    pub upload_dir: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// Credential for the generation API. Read once here and never logged.
    pub openai_api_key: String,

    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,

    /// Fixed model used for both vision and chat calls.
    pub model: String,

    /// Output budget for every generation call.
    pub max_tokens: u32,

    /// Per-request timeout for outbound HTTP calls.
    pub upstream_timeout: Duration,

    /// Base URL of the real-time detection companion.
    pub realtime_url: String,

    /// Largest accepted upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("SIGHTLINE_BIND", "0.0.0.0:3000"),
            database_url: env_or("SIGHTLINE_DATABASE_URL", "sqlite://sightline.db"),
            upload_dir: PathBuf::from(env_or("SIGHTLINE_UPLOAD_DIR", "public/uploads")),
            log_level: env_or("SIGHTLINE_LOG", "info"),
            log_json: parse_flag("SIGHTLINE_LOG_JSON", false),
            cors_allowed_origins: std::env::var("SIGHTLINE_CORS_ORIGINS").ok(),
            enable_swagger: parse_flag("SIGHTLINE_ENABLE_SWAGGER", true),
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            openai_base_url: env_or("SIGHTLINE_OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("SIGHTLINE_MODEL", "gpt-4o"),
            max_tokens: parse_env("SIGHTLINE_MAX_TOKENS", 500),
            upstream_timeout: Duration::from_secs(parse_env("SIGHTLINE_UPSTREAM_TIMEOUT_SECS", 120)),
            realtime_url: env_or("SIGHTLINE_REALTIME_URL", "http://localhost:5002"),
            max_upload_bytes: parse_env("SIGHTLINE_MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("database_url", &self.database_url)
            .field("upload_dir", &self.upload_dir)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .field("openai_api_key", &if self.openai_api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("realtime_url", &self.realtime_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn debug_output_never_contains_the_key() {
        let mut cfg = Config::from_env();
        cfg.openai_api_key = "sk-very-secret".into();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        assert_eq!(parse_env("SIGHTLINE_TEST_UNSET_NUMBER", 7_u32), 7);
    }
}
