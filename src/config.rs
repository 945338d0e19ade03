use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::endpoints::DEFAULT_PAGE_SIZE;
use crate::reddit::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

const DEFAULT_ENV_PREFIX: &str = "REDINSIGHT";
const CONFIG_PATH_ENV: &str = "REDINSIGHT_CONFIG";
const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            workers: default_workers(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_comment_limit")]
    pub comment_limit: usize,
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            comment_limit: default_comment_limit(),
            debounce: default_debounce(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_comment_limit() -> usize {
    10
}

fn default_debounce() -> Duration {
    Duration::from_millis(500)
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Defaults, then the YAML file, then `REDINSIGHT_<SECTION>__<KEY>`
/// variables, then `PORT`.
pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = config_path(&options) {
        if path.exists() {
            cfg = read_config_file(&path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    if let Ok(port) = env::var(PORT_ENV) {
        match port.trim().parse::<u16>() {
            Ok(port) => cfg.server.port = port,
            Err(err) => warn!(value = %port, error = %err, "ignoring invalid PORT"),
        }
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let map: HashMap<String, String> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&upper_prefix)
                .map(|stripped| (stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "server.host" => cfg.server.host = value,
        "server.port" => parse_into(&mut cfg.server.port, key, &value),
        "server.static_dir" => cfg.server.static_dir = PathBuf::from(value),
        "server.workers" => parse_into(&mut cfg.server.workers, key, &value),
        "upstream.base_url" => cfg.upstream.base_url = value,
        "upstream.user_agent" => cfg.upstream.user_agent = value,
        "upstream.timeout" => match humantime::parse_duration(&value) {
            Ok(duration) => cfg.upstream.timeout = duration,
            Err(err) => warn!(%key, error = %err, "ignoring invalid duration"),
        },
        "client.page_size" => parse_into(&mut cfg.client.page_size, key, &value),
        "client.comment_limit" => parse_into(&mut cfg.client.comment_limit, key, &value),
        "client.debounce" => match humantime::parse_duration(&value) {
            Ok(duration) => cfg.client.debounce = duration,
            Err(err) => warn!(%key, error = %err, "ignoring invalid duration"),
        },
        _ => {}
    }
}

fn parse_into<T>(slot: &mut T, key: &str, value: &str)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(err) => warn!(%key, error = %err, "ignoring invalid config value"),
    }
}

/// The file `load` reads: the explicit path, then `REDINSIGHT_CONFIG`, then
/// the per-user default.
pub fn config_path(options: &LoadOptions) -> Option<PathBuf> {
    options
        .config_file
        .clone()
        .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .or_else(default_config_path)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("redinsight").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_the_public_service() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.upstream.user_agent, "RedInsight/1.0 (Educational Project)");
        assert_eq!(cfg.upstream.timeout, Duration::from_secs(10));
        assert_eq!(cfg.client.page_size, 25);
        assert_eq!(cfg.client.debounce, Duration::from_millis(500));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "server:\n  port: 8080\nupstream:\n  timeout: 3s\nclient:\n  debounce: 250ms\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("REDINSIGHT_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.server.workers, 4);
        assert_eq!(cfg.upstream.timeout, Duration::from_secs(3));
        assert_eq!(cfg.client.debounce, Duration::from_millis(250));
        assert_eq!(cfg.upstream.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(dir.path().join("absent.yaml")),
            env_prefix: Some("REDINSIGHT_TEST_MISSING".into()),
        })
        .unwrap();
        assert_eq!(cfg.client, ClientConfig::default());
    }

    #[test]
    fn env_overrides() {
        env::set_var("REDINSIGHT_TEST_ENV_UPSTREAM__BASE_URL", "http://127.0.0.1:9/");
        env::set_var("REDINSIGHT_TEST_ENV_CLIENT__PAGE_SIZE", "nope");
        let dir = tempdir().unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(dir.path().join("absent.yaml")),
            env_prefix: Some("REDINSIGHT_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.upstream.base_url, "http://127.0.0.1:9/");
        assert_eq!(cfg.client.page_size, 25);
        env::remove_var("REDINSIGHT_TEST_ENV_UPSTREAM__BASE_URL");
        env::remove_var("REDINSIGHT_TEST_ENV_CLIENT__PAGE_SIZE");
    }
}
