use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "TicketFlow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,ticketflow=debug"
}

/// Get the application data directory
/// ~/TicketFlow/ unless TICKETFLOW_DATA_DIR overrides it
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Jira credentials; all three must be present.
#[derive(Debug, Clone, PartialEq)]
pub struct JiraConfig {
    pub url: String,
    pub email: String,
    pub api_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GitLabConfig {
    pub url: String,
    pub token: String,
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub call_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub jira: Option<JiraConfig>,
    pub gitlab: Option<GitLabConfig>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("TICKETFLOW_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "TICKETFLOW_BIND",
            value: bind_raw.clone(),
        })?;

        let call_timeout_secs = match get("TICKETFLOW_CALL_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "TICKETFLOW_CALL_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_CALL_TIMEOUT_SECS,
        };

        let jira = match (get("JIRA_URL"), get("JIRA_EMAIL"), get("JIRA_API_TOKEN")) {
            (Some(url), Some(email), Some(api_token)) => Some(JiraConfig {
                url,
                email,
                api_token,
            }),
            _ => None,
        };

        let gitlab = match (get("GITLAB_URL"), get("GITLAB_TOKEN")) {
            (Some(url), Some(token)) => Some(GitLabConfig { url, token }),
            _ => None,
        };

        Ok(Self {
            bind,
            data_dir: get("TICKETFLOW_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(app_data_dir),
            call_timeout_secs,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            jira,
            gitlab,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("ticketflow.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}
