//! Settings file management

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::utils::CooldownOptions;

/// deploymark settings, read from `settings.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stderr
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs under the storage layout's log directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory holding per-service configuration
    #[serde(default = "default_soa_dir")]
    pub soa_dir: String,

    /// Default convergence timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub mutator: MutatorSettings,

    #[serde(default)]
    pub fleet: FleetSettings,

    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub slack: SlackSettings,

    #[serde(default)]
    pub interactions: InteractionSettings,
}

fn default_soa_dir() -> String {
    "/etc/soa".to_string()
}

fn default_timeout_secs() -> u64 {
    3600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            soa_dir: default_soa_dir(),
            default_timeout_secs: default_timeout_secs(),
            git: GitSettings::default(),
            mutator: MutatorSettings::default(),
            fleet: FleetSettings::default(),
            registry: RegistrySettings::default(),
            slack: SlackSettings::default(),
            interactions: InteractionSettings::default(),
        }
    }
}

impl Settings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

/// Git settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSettings {
    /// Prefix of the branch that records a deploy group's desired commit
    #[serde(default = "default_ref_prefix")]
    pub ref_prefix: String,

    /// Git URL used when neither the CLI nor deploy.json name one.
    /// `{service}` is replaced by the service name.
    #[serde(default = "default_url_template")]
    pub default_url_template: String,

    /// Local clone used to list commit authors
    #[serde(default)]
    pub local_checkout: Option<String>,
}

fn default_ref_prefix() -> String {
    "paasta-".to_string()
}

fn default_url_template() -> String {
    "git@git:services/{service}".to_string()
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            ref_prefix: default_ref_prefix(),
            default_url_template: default_url_template(),
            local_checkout: None,
        }
    }
}

impl GitSettings {
    pub fn url_for(&self, service: &str) -> String {
        self.default_url_template.replace("{service}", service)
    }
}

/// Retry settings for desired-state mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutatorSettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for MutatorSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl MutatorSettings {
    /// Configured attempts, at least one and never more than the default
    pub fn attempts(&self) -> u32 {
        self.attempts.clamp(1, default_attempts())
    }

    /// Backoff between attempts; the base delay is never zero
    pub fn cooldown(&self) -> CooldownOptions {
        let base_delay_ms = self.base_delay_ms.max(1);
        CooldownOptions {
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(base_delay_ms)),
            ..Default::default()
        }
    }
}

/// Fleet status API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSettings {
    /// Base URL of the deployment status API
    #[serde(default = "default_status_api_url")]
    pub status_api_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_status_api_url() -> String {
    "http://localhost:5054/v1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            status_api_url: default_status_api_url(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Docker registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_registry_url")]
    pub url: String,
}

fn default_registry_url() -> String {
    "https://docker-registry.local".to_string()
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
        }
    }
}

/// Slack settings
#[derive(Debug, Serialize, Deserialize)]
pub struct SlackSettings {
    /// Bot token; notifications are disabled when absent
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,

    /// Channels used when a service's deploy.json lists none
    #[serde(default)]
    pub default_channels: Vec<String>,

    #[serde(default = "default_slack_api_url")]
    pub api_base_url: String,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let token = Option::<String>::deserialize(deserializer)?;
    Ok(token.map(SecretString::from))
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            token: None,
            default_channels: Vec::new(),
            api_base_url: default_slack_api_url(),
        }
    }
}

/// Interaction listener settings
#[derive(Debug, Serialize, Deserialize)]
pub struct InteractionSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Slack app signing secret; the listener refuses to start without it
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub signing_secret: Option<SecretString>,

    #[serde(default = "default_listen_host")]
    pub host: String,

    #[serde(default = "default_listen_port")]
    pub port: u16,
}

fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            signing_secret: None,
            host: default_listen_host(),
            port: default_listen_port(),
        }
    }
}
