use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform::{NativePlatform, Platform};

const DEFAULT_CALLBACK_TOKEN: &str = "dev-token";
const DEFAULT_APP_ID: &str = "agent_relay";
const DEFAULT_EVENT_API: &str = "https://inn.gs";
const DEV_EVENT_API: &str = "http://127.0.0.1:8288";
const DEV_EVENT_KEY: &str = "local";
const CLUSTER_EXECUTION_ENDPOINT: &str = "http://ollama.ollama.svc.cluster.local:11434/v1";
const LOCAL_EXECUTION_ENDPOINT: &str = "http://localhost:11434/v1";

// --- TOML file layout ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub execution: ExecutionSection,
    pub callback: CallbackSection,
    pub storage: StorageSection,
    pub broker: BrokerSection,
    pub lifecycle: LifecycleSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSection {
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallbackSection {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerSection {
    pub app_id: Option<String>,
    pub event_api: Option<String>,
    pub event_key: Option<String>,
    pub signing_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub dev: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSection {
    pub strict_transitions: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub file: Option<PathBuf>,
}

impl FileConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

// --- Resolved configuration ---

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub app_id: String,
    pub event_api: String,
    pub event_key: String,
    pub signing_key: Option<String>,
    pub timeout: Duration,
    pub dev: bool,
}

/// Process configuration, resolved once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub execution_endpoint: String,
    pub callback_token: String,
    pub storage_path: PathBuf,
    pub broker: BrokerConfig,
    pub strict_transitions: bool,
    pub log_file: Option<PathBuf>,
    pub containerised: bool,
    /// TOML file the settings were read from, if any.
    pub config_file: Option<PathBuf>,
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", key, other),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a number, got '{}'", key, value))
}

fn validate_http_url(key: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).with_context(|| format!("{} is not a valid URL", key))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("{} must use http or https, got '{}'", key, parsed.scheme());
    }
    if parsed.host_str().is_none() {
        bail!("{} must include a host", key);
    }
    Ok(())
}

fn redact(secret: &str) -> String {
    if secret.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &secret[..secret.char_indices().nth(2).map_or(0, |(i, _)| i)])
}

impl AppConfig {
    /// Resolve from the optional config file, the process environment and
    /// CLI overrides, then validate.
    pub async fn load(overrides: &CliOverrides) -> Result<Self> {
        let file = match &overrides.config_path {
            Some(path) => FileConfig::load(path).await?,
            None => FileConfig::default(),
        };
        let env = |key: &str| std::env::var(key).ok();
        let config = Self::resolve(file, env, NativePlatform::is_containerised(), overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Precedence: defaults < file < environment < CLI.
    pub fn resolve<F>(
        file: FileConfig,
        env: F,
        containerised: bool,
        overrides: &CliOverrides,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let first_var = |keys: &[&'static str]| keys.iter().find_map(|k| var(k).map(|v| (*k, v)));

        let host = overrides
            .host
            .clone()
            .or_else(|| var("AGENT_HOST"))
            .or(file.server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match (overrides.port, first_var(&["AGENT_PORT", "FLASK_RUN_PORT"])) {
            (Some(port), _) => port,
            (None, Some((key, value))) => parse_number(key, &value)?,
            (None, None) => file
                .server
                .port
                .unwrap_or(if containerised { 80 } else { 5000 }),
        };

        let execution_endpoint = first_var(&["EXECUTION_ENDPOINT", "OLLAMA_BASE_URL"])
            .map(|(_, v)| v)
            .or(file.execution.endpoint)
            .unwrap_or_else(|| {
                if containerised {
                    CLUSTER_EXECUTION_ENDPOINT.to_string()
                } else {
                    LOCAL_EXECUTION_ENDPOINT.to_string()
                }
            });

        let callback_token = var("AGENT_RESULT_TOKEN")
            .or(file.callback.token)
            .unwrap_or_else(|| DEFAULT_CALLBACK_TOKEN.to_string());

        let storage_path = var("AGENT_DB_PATH")
            .map(PathBuf::from)
            .or(file.storage.path)
            .unwrap_or_else(|| std::env::temp_dir().join("agent_requests.db"));

        // INNGEST_DEV is either a flag or the dev server URL.
        let dev_var = var("INNGEST_DEV");
        let dev_url = dev_var.clone().filter(|v| v.starts_with("http"));
        let dev = match dev_var {
            Some(v) => parse_bool("INNGEST_DEV", &v).unwrap_or(true),
            None => file.broker.dev.unwrap_or(false),
        };

        let timeout_secs = match var("INNGEST_TIMEOUT_SECS") {
            Some(v) => parse_number("INNGEST_TIMEOUT_SECS", &v)?,
            None => file.broker.timeout_secs.unwrap_or(10),
        };

        let broker = BrokerConfig {
            app_id: var("INNGEST_APP_ID")
                .or(file.broker.app_id)
                .unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            event_api: var("INNGEST_EVENT_API_BASE_URL")
                .or(dev_url)
                .or(file.broker.event_api)
                .unwrap_or_else(|| {
                    let base = if dev { DEV_EVENT_API } else { DEFAULT_EVENT_API };
                    base.to_string()
                }),
            event_key: var("INNGEST_EVENT_KEY")
                .or(file.broker.event_key)
                .or_else(|| dev.then(|| DEV_EVENT_KEY.to_string()))
                .unwrap_or_default(),
            signing_key: var("INNGEST_SIGNING_KEY").or(file.broker.signing_key),
            timeout: Duration::from_secs(timeout_secs),
            dev,
        };

        let strict_transitions = match var("AGENT_STRICT_TRANSITIONS") {
            Some(v) => parse_bool("AGENT_STRICT_TRANSITIONS", &v)?,
            None => file.lifecycle.strict_transitions.unwrap_or(false),
        };

        let log_file = var("AGENT_LOG_FILE").map(PathBuf::from).or(file.logging.file);

        Ok(Self {
            server: ServerConfig { host, port },
            execution_endpoint,
            callback_token,
            storage_path,
            broker,
            strict_transitions,
            log_file,
            containerised,
            config_file: overrides.config_path.clone(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server port must be non-zero");
        }
        validate_http_url("execution endpoint", &self.execution_endpoint)?;
        validate_http_url("broker event API", &self.broker.event_api)?;
        if self.callback_token.trim().is_empty() {
            bail!("callback token must not be empty");
        }
        if self.broker.event_key.is_empty() {
            bail!("INNGEST_EVENT_KEY is required unless INNGEST_DEV is set");
        }
        if self.broker.timeout.is_zero() {
            bail!("broker timeout must be at least one second");
        }
        if self.storage_path.as_os_str().is_empty() {
            bail!("storage path must not be empty");
        }
        Ok(())
    }

    pub fn uses_default_token(&self) -> bool {
        self.callback_token == DEFAULT_CALLBACK_TOKEN
    }

    /// Human-readable settings with secrets redacted.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "Config file",
                self.config_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            ),
            ("Listen", format!("http://{}", self.server.bind_addr())),
            ("Execution endpoint", self.execution_endpoint.clone()),
            ("Database", self.storage_path.display().to_string()),
            ("Broker", self.broker.event_api.clone()),
            ("Broker app", self.broker.app_id.clone()),
            ("Broker event key", redact(&self.broker.event_key)),
            (
                "Signing key",
                self.broker
                    .signing_key
                    .as_deref()
                    .map(redact)
                    .unwrap_or_else(|| "none".to_string()),
            ),
            ("Callback token", redact(&self.callback_token)),
            (
                "Transitions",
                if self.strict_transitions {
                    "strict".to_string()
                } else {
                    "lenient".to_string()
                },
            ),
            ("Container", self.containerised.to_string()),
        ]
    }
}
