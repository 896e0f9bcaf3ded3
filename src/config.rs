//! Application-level configuration, loaded once at start-up.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUESTNEST_CONFIG_PATH";

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MONGO_DB: &str = "questnest";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-5-mini";
const DEFAULT_QUESTION_TIMEOUT_SECS: u64 = 60;

/// Which storage backend the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Persistent MongoDB store, supervised in the background.
    Mongodb,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Some(Self::Mongodb),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the HTTP server binds to.
    pub port: u16,
    /// Origins allowed by CORS; empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Storage backend selected at start-up.
    pub store_backend: StoreBackend,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// MongoDB database name.
    pub mongo_db: String,
    /// HS256 secret used to verify bearer tokens.
    pub jwt_secret: String,
    /// Key for the completion service; question generation fails without it.
    pub openai_api_key: Option<String>,
    /// Base URL of the chat-completions API.
    pub openai_base_url: String,
    /// Model used for question generation.
    pub openai_model: String,
    /// Upper bound on a single question-generation call.
    pub question_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
            store_backend: StoreBackend::Mongodb,
            mongo_uri: DEFAULT_MONGO_URI.into(),
            mongo_db: DEFAULT_MONGO_DB.into(),
            jwt_secret: String::new(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            question_timeout: Duration::from_secs(DEFAULT_QUESTION_TIMEOUT_SECS),
        }
    }
}

/// JSON representation of the configuration file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
    store_backend: Option<StoreBackend>,
    mongo_uri: Option<String>,
    mongo_db: Option<String>,
    jwt_secret: Option<String>,
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    openai_model: Option<String>,
    question_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load defaults, then the optional JSON file, then environment overrides.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(raw) = read_config_file() {
            config.apply_file(raw);
        }
        config.apply_env(|key| env::var(key).ok());

        if config.jwt_secret.is_empty() {
            warn!("JWT_SECRET is not set; every authenticated request will be rejected");
        }
        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; question generation will fail");
        }
        config
    }

    fn apply_file(&mut self, raw: RawConfig) {
        if let Some(port) = raw.port {
            self.port = port;
        }
        if let Some(origins) = raw.allowed_origins {
            self.allowed_origins = origins;
        }
        if let Some(backend) = raw.store_backend {
            self.store_backend = backend;
        }
        if let Some(uri) = raw.mongo_uri {
            self.mongo_uri = uri;
        }
        if let Some(db) = raw.mongo_db {
            self.mongo_db = db;
        }
        if let Some(secret) = raw.jwt_secret {
            self.jwt_secret = secret;
        }
        if raw.openai_api_key.is_some() {
            self.openai_api_key = raw.openai_api_key;
        }
        if let Some(url) = raw.openai_base_url {
            self.openai_base_url = url;
        }
        if let Some(model) = raw.openai_model {
            self.openai_model = model;
        }
        if let Some(secs) = raw.question_timeout_secs {
            self.question_timeout = Duration::from_secs(secs);
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT").and_then(|value| value.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = parse_origins(&origins);
        }
        if let Some(value) = lookup("STORE_BACKEND") {
            match StoreBackend::parse(&value) {
                Some(backend) => self.store_backend = backend,
                None => warn!(value = %value, "unknown STORE_BACKEND; keeping {:?}", self.store_backend),
            }
        }
        if let Some(uri) = lookup("MONGO_URI") {
            self.mongo_uri = uri;
        }
        if let Some(db) = lookup("MONGO_DB") {
            self.mongo_db = db;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()) {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.openai_model = model;
        }
        if let Some(secs) =
            lookup("QUESTION_TIMEOUT_SECS").and_then(|value| value.parse::<u64>().ok())
        {
            self.question_timeout = Duration::from_secs(secs);
        }
    }
}

/// Split a comma separated origin list; `*` alone means any origin.
fn parse_origins(value: &str) -> Vec<String> {
    if value.trim() == "*" {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_config_file() -> Option<RawConfig> {
    let path = resolve_config_path();
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
            Ok(raw) => {
                info!(path = %path.display(), "loaded configuration file");
                Some(raw)
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse config; falling back to defaults"
                );
                None
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(
                path = %path.display(),
                "config file not found; using environment and built-in defaults"
            );
            None
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to read config; falling back to defaults"
            );
            None
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.apply_file(RawConfig {
            port: Some(7000),
            mongo_db: Some("from_file".into()),
            ..RawConfig::default()
        });

        let env: HashMap<&str, &str> = [
            ("PORT", "8081"),
            ("STORE_BACKEND", "memory"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("QUESTION_TIMEOUT_SECS", "15"),
        ]
        .into_iter()
        .collect();
        config.apply_env(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.port, 8081);
        assert_eq!(config.mongo_db, "from_file");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.question_timeout, Duration::from_secs(15));
    }

    #[test]
    fn wildcard_origin_means_any() {
        assert!(parse_origins("*").is_empty());
        assert_eq!(parse_origins("http://x"), vec!["http://x"]);
    }

    #[test]
    fn invalid_numbers_keep_defaults() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "PORT" => Some("not-a-port".into()),
            "STORE_BACKEND" => Some("sqlite".into()),
            _ => None,
        });
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.store_backend, StoreBackend::Mongodb);
    }
}
