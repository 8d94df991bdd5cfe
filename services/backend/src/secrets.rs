// secrets
use std::{collections::HashMap, env, net::IpAddr, path::PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{Level, info, warn};

use crate::controllers::Delivery;

pub const DEFAULT_PORT: u16 = 4000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_TOOL: &str = "yt-dlp";
const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mode {
    Dev,
    Prod,
}

/// Startup configuration read once from the environment and handed to
/// `main`. Nothing reads the environment after this is built.
pub struct SecretManager {
    mode: Mode,
    secrets: HashMap<String, String>,
}

impl SecretManager {
    pub fn new() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mode = match value("MODE") {
            Some(mode) if mode.eq_ignore_ascii_case("prod") => Mode::Prod,
            _ => Mode::Dev,
        };

        let mut secrets: HashMap<String, String> = HashMap::new();
        let port = value("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        secrets.insert(
            "BACKEND_URL".to_string(),
            value("BACKEND_URL").unwrap_or_else(|| format!("http://localhost:{}", port)),
        );
        secrets.insert("PORT".to_string(), port);
        secrets.insert(
            "HOST".to_string(),
            value("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        );
        secrets.insert(
            "YT_DLP_PATH".to_string(),
            value("YT_DLP_PATH").unwrap_or_else(|| DEFAULT_TOOL.to_string()),
        );
        secrets.insert(
            "YT_DLP_EXTRA_ARGS".to_string(),
            value("YT_DLP_EXTRA_ARGS").unwrap_or_default(),
        );
        secrets.insert(
            "DOWNLOAD_MODE".to_string(),
            value("DOWNLOAD_MODE").unwrap_or_else(|| "stream".to_string()),
        );
        secrets.insert(
            "DOWNLOADS_DIR".to_string(),
            value("DOWNLOADS_DIR").unwrap_or_else(|| DEFAULT_DOWNLOADS_DIR.to_string()),
        );

        SecretManager { mode, secrets }
    }

    pub fn get(&self, key: &str) -> String {
        self.secrets.get(key).cloned().unwrap_or_default()
    }

    /// Default verbosity before `RUST_LOG` directives are applied.
    pub fn log_level(&self) -> Level {
        match self.mode {
            Mode::Dev => Level::DEBUG,
            Mode::Prod => Level::INFO,
        }
    }

    /// Logs which keys are set, never their values.
    pub fn log_summary(&self) {
        let mut configured: Vec<&str> = self
            .secrets
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect();
        configured.sort_unstable();
        info!("Mode: {:?}, configured: {:?}", self.mode, configured);
    }

    pub fn port(&self) -> u16 {
        let raw = self.get("PORT");
        raw.parse::<u16>().unwrap_or_else(|_| {
            warn!("Invalid PORT {:?}, falling back to {}", raw, DEFAULT_PORT);
            DEFAULT_PORT
        })
    }

    pub fn host(&self) -> Result<IpAddr> {
        let raw = self.get("HOST");
        raw.parse::<IpAddr>()
            .with_context(|| format!("HOST must be an IPv4 or IPv6 address, got {:?}", raw))
    }

    pub fn tool_program(&self) -> PathBuf {
        PathBuf::from(self.get("YT_DLP_PATH"))
    }

    pub fn tool_extra_args(&self) -> Vec<String> {
        self.get("YT_DLP_EXTRA_ARGS")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    pub fn delivery(&self) -> Result<Delivery> {
        let mode = self.get("DOWNLOAD_MODE");
        match mode.to_ascii_lowercase().as_str() {
            "stream" => Ok(Delivery::Stream),
            "directory" => Ok(Delivery::Directory(PathBuf::from(self.get("DOWNLOADS_DIR")))),
            _ => bail!("DOWNLOAD_MODE must be \"stream\" or \"directory\", got {:?}", mode),
        }
    }
}
