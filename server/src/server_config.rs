use anyhow::{anyhow, Context};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::{env, path::Path, path::PathBuf, time::Duration};
use strum::{Display, EnumString};
use url::Url;

use crate::email::window::DEFAULT_WINDOW_DAYS;

/// Outbound calls one emailed report can make in sequence: app token, Inbox,
/// SentItems, extraction, synthesis, app token, sendMail
pub const MAX_OUTBOUND_CALLS_PER_RUN: u64 = 7;

pub const MAX_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Must outlast every outbound call of a run, so a send is never cut off mid-flight
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 5006,
            request_timeout_secs: 240,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Applied to every outbound call: mailbox listing, token, generation, send
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub window_days: i64,
    pub max_prompt_conversations: usize,
    pub messages_per_conversation: usize,
    pub fetch_limit: u32,
    pub default_user_email: Option<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            max_prompt_conversations: 25,
            messages_per_conversation: 5,
            fetch_limit: 200,
            default_user_email: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphAppSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret_env: String,
    pub mailbox_user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub base_url: String,
    pub authority_url: String,
    pub app: Option<GraphAppSettings>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
            authority_url: "https://login.microsoftonline.com".to_string(),
            app: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Mistral,
    Anthropic,
}

impl Provider {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::Mistral => "https://api.mistral.ai/v1/chat/completions",
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key_env: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub json_mode: bool,
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    1400
}

impl BackendConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }

    pub fn api_key(&self) -> anyhow::Result<String> {
        env::var(&self.api_key_env)
            .with_context(|| format!("{} is required for {}", self.api_key_env, self.provider))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub structuring: BackendConfig,
    pub executive: BackendConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            structuring: BackendConfig {
                provider: Provider::OpenAi,
                model: "gpt-4.1-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                endpoint: None,
                temperature: default_temperature(),
                max_tokens: 2000,
                json_mode: true,
            },
            executive: BackendConfig {
                provider: Provider::Anthropic,
                model: "claude-3-5-sonnet-latest".to_string(),
                api_key_env: "CLAUDE_API_KEY".to_string(),
                endpoint: None,
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
                json_mode: false,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub path: PathBuf,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/user_profiles.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub enabled: bool,
    pub cron: String,
    pub recipients: Vec<String>,
    pub user_id: Option<String>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: "0 0 13 * * Mon".to_string(),
            recipients: vec![],
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub http: HttpSettings,
    pub report: ReportSettings,
    pub graph: GraphSettings,
    pub generation: GenerationSettings,
    pub profiles: ProfileSettings,
    pub schedule: ScheduleSettings,
}

impl ServerConfig {
    /// Load `config.toml` from `APP_DIR`, or `<workspace>/config` during development,
    /// then apply `OPSREPORT__SECTION__KEY` environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let root = config_dir()?;
        let path = root.join("config.toml");
        let builder = Config::builder()
            .add_source(File::from(path.as_path()).required(false))
            .add_source(Environment::with_prefix("OPSREPORT").separator("__"));

        let cfg: ServerConfig = builder
            .build()
            .context("config.toml could not be read")?
            .try_deserialize()
            .context("config.toml is invalid")?;

        cfg.resolve_paths(&root).validate()
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: ServerConfig = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()
    }

    fn resolve_paths(mut self, root: &Path) -> Self {
        if self.profiles.path.is_relative() {
            self.profiles.path = root.join(&self.profiles.path);
        }
        self
    }

    fn validate(self) -> anyhow::Result<Self> {
        Url::parse(&self.graph.base_url).context("graph.base_url is invalid")?;
        Url::parse(&self.graph.authority_url).context("graph.authority_url is invalid")?;
        for backend in [&self.generation.structuring, &self.generation.executive] {
            Url::parse(backend.endpoint())
                .with_context(|| format!("endpoint for {} is invalid", backend.provider))?;
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.report.window_days) {
            return Err(anyhow!(
                "report.window_days must be between 1 and {}",
                MAX_WINDOW_DAYS
            ));
        }
        let worst_case_run = self
            .http
            .timeout_secs
            .saturating_mul(MAX_OUTBOUND_CALLS_PER_RUN);
        if self.server.request_timeout_secs <= worst_case_run {
            return Err(anyhow!(
                "server.request_timeout_secs ({}) must exceed {} x http.timeout_secs ({}s)",
                self.server.request_timeout_secs,
                MAX_OUTBOUND_CALLS_PER_RUN,
                worst_case_run
            ));
        }
        if self.schedule.enabled && self.schedule.recipients.is_empty() {
            return Err(anyhow!("schedule.recipients is required when schedule is enabled"));
        }
        Ok(self)
    }
}

fn config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = env::var("APP_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let cargo_dir =
        env::var("CARGO_MANIFEST_DIR").context("CARGO_MANIFEST_DIR or APP_DIR is required")?;
    let parent = Path::new(&cargo_dir)
        .parent()
        .context("Failed to get parent dir")?;
    Ok(parent.join("config"))
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let app_mode = self
            .graph
            .app
            .as_ref()
            .map(|a| format!("tenant {} mailbox {}", a.tenant_id, a.mailbox_user_id))
            .unwrap_or_else(|| "disabled".to_string());
        write!(
            f,
            "Server Config:\n{:?}\n\nHTTP: {:?}\n\nReport: {:?}\n\nGraph: {} (app credentials: {})\n\nStructuring backend: {} {} @ {}\n\nExecutive backend: {} {} @ {}\n\nProfiles: {}\n\nSchedule: {:?}",
            self.server,
            self.http,
            self.report,
            self.graph.base_url,
            app_mode,
            self.generation.structuring.provider,
            self.generation.structuring.model,
            self.generation.structuring.endpoint(),
            self.generation.executive.provider,
            self.generation.executive.model,
            self.generation.executive.endpoint(),
            self.profiles.path.display(),
            self.schedule,
        )
    }
}
