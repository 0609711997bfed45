use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub bitbucket: BitbucketSettings,
    #[serde(default)]
    pub github: GithubSettings,
    #[serde(default)]
    pub auth_cache: AuthCacheSettings,
    #[serde(default)]
    pub token_exchange: TokenExchangeSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    /// Per-request timeout applied to every remote call (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("dockhand/{}", env!("CARGO_PKG_VERSION"))
}

/// Quay.io API endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct RegistrySettings {
    #[serde(default = "default_quay_api_url")]
    pub api_url: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            api_url: default_quay_api_url(),
        }
    }
}

fn default_quay_api_url() -> String {
    "https://quay.io/api/v1/".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BitbucketSettings {
    /// Site root hosting the OAuth endpoints
    #[serde(default = "default_bitbucket_site_url")]
    pub site_url: String,
    /// REST API root for branch and raw file lookups
    #[serde(default = "default_bitbucket_api_url")]
    pub api_url: String,
    /// Endpoint returning the authenticated caller's own account
    #[serde(default = "default_bitbucket_identity_url")]
    pub identity_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Default for BitbucketSettings {
    fn default() -> Self {
        Self {
            site_url: default_bitbucket_site_url(),
            api_url: default_bitbucket_api_url(),
            identity_url: default_bitbucket_identity_url(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

fn default_bitbucket_site_url() -> String {
    "https://bitbucket.org/".to_string()
}

fn default_bitbucket_api_url() -> String {
    "https://bitbucket.org/api/1.0/".to_string()
}

fn default_bitbucket_identity_url() -> String {
    "https://api.bitbucket.org/2.0/user".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubSettings {
    #[serde(default = "default_github_site_url")]
    pub site_url: String,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            site_url: default_github_site_url(),
            api_url: default_github_api_url(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

fn default_github_site_url() -> String {
    "https://github.com/".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com/".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthCacheSettings {
    /// How long an authenticated token stays cached (default: 600)
    #[serde(default = "default_auth_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_auth_cache_max_capacity")]
    pub max_capacity: u64,
}

impl Default for AuthCacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_auth_cache_ttl_secs(),
            max_capacity: default_auth_cache_max_capacity(),
        }
    }
}

fn default_auth_cache_ttl_secs() -> u64 {
    600
}

fn default_auth_cache_max_capacity() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenExchangeSettings {
    /// Attempts allowed when GitHub reports `bad_verification_code` (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds (default: 0)
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl Default for TokenExchangeSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

/// Extensions tried, in order, for each configuration layer
const CONFIG_EXTENSIONS: [&str; 3] = ["toml", "yaml", "yml"];

lazy_static::lazy_static! {
    /// `${NAME}` or `${NAME:-fallback}`
    static ref ENV_REFERENCE: regex::Regex =
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex");
}

/// Expand `${NAME}` and `${NAME:-fallback}` references from the process environment.
///
/// An unset variable without a fallback expands to the empty string.
fn expand_env(raw: &str) -> String {
    ENV_REFERENCE
        .replace_all(raw, |caps: &regex::Captures| {
            let name = &caps[1];
            env::var(name).unwrap_or_else(|_| match caps.get(2) {
                Some(fallback) => fallback.as_str().to_string(),
                None => {
                    tracing::warn!(variable = name, "Referenced environment variable is not set");
                    String::new()
                }
            })
        })
        .into_owned()
}

/// Turn the merged config tree into JSON with environment references expanded
/// in every string leaf
fn expanded_json(value: config::Value) -> serde_json::Value {
    use config::ValueKind;
    use serde_json::Value;

    match value.kind {
        ValueKind::Nil => Value::Null,
        ValueKind::Boolean(b) => Value::Bool(b),
        ValueKind::I64(i) => Value::from(i),
        ValueKind::I128(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        ValueKind::U64(u) => Value::from(u),
        ValueKind::U128(u) => u64::try_from(u)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(u.to_string())),
        ValueKind::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueKind::String(s) => Value::String(expand_env(&s)),
        ValueKind::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, expanded_json(value)))
                .collect(),
        ),
        ValueKind::Array(items) => Value::Array(items.into_iter().map(expanded_json).collect()),
    }
}

/// First existing `<dir>/<name>.<ext>` among the supported extensions
fn find_layer(dir: &Path, name: &str) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file())
}

impl Settings {
    /// Load from `DOCKHAND_CONFIG_DIR` (default `config`) using the run mode
    /// in `DOCKHAND_CONFIG_RUN_MODE` (default `development`)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = env::var("DOCKHAND_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        let run_mode =
            env::var("DOCKHAND_CONFIG_RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::load(Path::new(&config_dir), &run_mode)
    }

    /// Layers `default` (required), `<run_mode>` and `local` from `config_dir`;
    /// later layers win
    pub fn load(config_dir: &Path, run_mode: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for (layer, required) in [("default", true), (run_mode, false), ("local", false)] {
            match find_layer(config_dir, layer) {
                Some(path) => {
                    tracing::info!(path = %path.display(), "Loading config layer");
                    builder = builder.add_source(config::File::from(path));
                }
                None if required => {
                    return Err(ConfigError::Message(format!(
                        "Missing config layer {}/{}.{{{}}}",
                        config_dir.display(),
                        layer,
                        CONFIG_EXTENSIONS.join(",")
                    )));
                }
                None => tracing::debug!(layer, "No config layer found"),
            }
        }

        let merged = builder.build()?.cache;
        let mut ignored = Vec::new();
        let settings: Settings = serde_ignored::deserialize(expanded_json(merged), |path| {
            ignored.push(path.to_string())
        })
        .map_err(|e| ConfigError::Message(format!("Invalid settings: {}", e)))?;

        for field in &ignored {
            tracing::warn!(field = %field, "Ignoring unknown configuration field");
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_exchange.max_attempts == 0 {
            return Err(ConfigError::Message(
                "token_exchange.max_attempts must be at least 1".to_string(),
            ));
        }

        let urls = [
            ("registry.api_url", &self.registry.api_url),
            ("bitbucket.site_url", &self.bitbucket.site_url),
            ("bitbucket.api_url", &self.bitbucket.api_url),
            ("bitbucket.identity_url", &self.bitbucket.identity_url),
            ("github.site_url", &self.github.site_url),
            ("github.api_url", &self.github.api_url),
        ];
        for (field, value) in urls {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", field)));
            }
        }

        Ok(())
    }
}
