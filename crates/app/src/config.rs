use std::str::FromStr;
use std::time::Duration;

use fileconv_client::reconnect::{ReconnectConfig, DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS};
use fileconv_client::ChannelConfig;

const DEFAULT_API_URL: &str = "http://localhost:4000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SAFETY_NET_DELAY_MS: u64 = 1800;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL for every HTTP endpoint.
    pub api_url: String,
    /// Push channel endpoint.
    pub ws_url: String,
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// Delay before the safety-net history refresh.
    pub safety_net_delay: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                          | Default                          |
    /// |----------------------------------|----------------------------------|
    /// | `FILECONV_API_URL`               | `http://localhost:4000`          |
    /// | `FILECONV_WS_URL`                | API URL as `ws(s)://` plus `/ws` |
    /// | `FILECONV_REQUEST_TIMEOUT_SECS`  | `30`                             |
    /// | `FILECONV_RECONNECT_ATTEMPTS`    | `5`                              |
    /// | `FILECONV_RECONNECT_DELAY_MS`    | `3000`                           |
    /// | `FILECONV_SAFETY_NET_DELAY_MS`   | `1800`                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("FILECONV_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.into());

        let ws_url = lookup("FILECONV_WS_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| derive_ws_url(&api_url));

        let request_timeout_secs: u64 = parse_var(
            &lookup,
            "FILECONV_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "FILECONV_REQUEST_TIMEOUT_SECS",
                value: "0".into(),
            });
        }

        let max_attempts: u32 =
            parse_var(&lookup, "FILECONV_RECONNECT_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let reconnect_delay_ms: u64 = parse_var(
            &lookup,
            "FILECONV_RECONNECT_DELAY_MS",
            DEFAULT_DELAY.as_millis() as u64,
        )?;
        let safety_net_delay_ms: u64 = parse_var(
            &lookup,
            "FILECONV_SAFETY_NET_DELAY_MS",
            DEFAULT_SAFETY_NET_DELAY_MS,
        )?;

        Ok(Self {
            api_url,
            ws_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
            reconnect: ReconnectConfig {
                max_attempts,
                delay: Duration::from_millis(reconnect_delay_ms),
            },
            safety_net_delay: Duration::from_millis(safety_net_delay_ms),
        })
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            ws_url: self.ws_url.clone(),
            reconnect: self.reconnect.clone(),
        }
    }
}

/// `http://host:4000/api` becomes `ws://host:4000/api/ws`.
fn derive_ws_url(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws")
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
