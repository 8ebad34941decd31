//! Configuration management for jobhound.
//!
//! Settings come from `config.toml` inside the data directory, with a
//! handful of environment overrides. Every knob has a default so a
//! fresh install works with nothing but `jobhound init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Fetch/anti-blocking and run-guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lower bound of the randomized pre-request delay.
    #[serde(default = "default_delay_ms_min")]
    pub delay_ms_min: u64,
    /// Upper bound of the randomized pre-request delay.
    #[serde(default = "default_delay_ms_max")]
    pub delay_ms_max: u64,
    /// Fetch attempts per page before the run gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Hard page cap per run.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Wall-clock budget per run, in seconds.
    #[serde(default = "default_max_run_secs")]
    pub max_run_secs: u64,
    /// Re-fetches granted when a page fails to parse.
    #[serde(default = "default_parse_retries")]
    pub parse_retries: u32,
    /// Concurrent runs across all searches.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    /// Body substrings a genuine listing page carries; a 200 response
    /// without any of them is treated as a soft block.
    #[serde(default = "default_expected_markers")]
    pub expected_markers: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_delay_ms_min() -> u64 {
    400
}
fn default_delay_ms_max() -> u64 {
    2500
}
fn default_max_attempts() -> u32 {
    4
}
fn default_max_pages() -> u32 {
    20
}
fn default_max_run_secs() -> u64 {
    300
}
fn default_parse_retries() -> u32 {
    2
}
fn default_max_concurrent_runs() -> usize {
    4
}
fn default_expected_markers() -> Vec<String> {
    vec![
        "id=\"search-results\"".to_string(),
        "class=\"no-results\"".to_string(),
    ]
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            delay_ms_min: default_delay_ms_min(),
            delay_ms_max: default_delay_ms_max(),
            max_attempts: default_max_attempts(),
            max_pages: default_max_pages(),
            max_run_secs: default_max_run_secs(),
            parse_retries: default_parse_retries(),
            max_concurrent_runs: default_max_concurrent_runs(),
            expected_markers: default_expected_markers(),
        }
    }
}

/// API server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8750
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    base_url: Option<String>,
    #[serde(default)]
    scrape: Option<ScrapeConfig>,
    #[serde(default)]
    server: Option<ServerConfig>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    /// Root URL of the listing site.
    pub base_url: String,
    pub scrape: ScrapeConfig,
    pub server: ServerConfig,
}

const DEFAULT_BASE_URL: &str = "https://jobs.example.com";

impl Settings {
    /// Resolve settings from the data directory, `config.toml` and
    /// environment overrides.
    pub fn load(data_dir_override: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;

        let config_path = data_dir.join("config.toml");
        let file: ConfigFile = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            ConfigFile::default()
        };

        let base_url = std::env::var("JOBHOUND_BASE_URL")
            .ok()
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let database_path = match std::env::var("JOBHOUND_DATABASE") {
            Ok(raw) => PathBuf::from(shellexpand::tilde(&raw).into_owned()),
            Err(_) => data_dir.join("jobhound.db"),
        };

        Ok(Self {
            data_dir,
            database_path,
            base_url,
            scrape: file.scrape.unwrap_or_default(),
            server: file.server.unwrap_or_default(),
        })
    }

    /// Create the data directory and write a commented default config
    /// if none exists yet.
    pub fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        let config_path = self.data_dir.join("config.toml");
        if !config_path.exists() {
            let skeleton = ConfigFile {
                base_url: Some(self.base_url.clone()),
                scrape: Some(self.scrape.clone()),
                server: Some(self.server.clone()),
            };
            fs::write(&config_path, toml::to_string_pretty(&skeleton)?)
                .with_context(|| format!("writing {}", config_path.display()))?;
        }
        Ok(())
    }
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }
    if let Ok(raw) = std::env::var("JOBHOUND_DATA_DIR") {
        return Ok(PathBuf::from(shellexpand::tilde(&raw).into_owned()));
    }
    let base = dirs::data_dir().context("could not determine a data directory")?;
    Ok(base.join("jobhound"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let scrape = ScrapeConfig::default();
        assert!(scrape.delay_ms_min < scrape.delay_ms_max);
        assert!(scrape.max_attempts >= 1);
        assert!(!scrape.expected_markers.is_empty());
    }

    #[test]
    fn test_config_file_parses_partial_toml() {
        let file: ConfigFile = toml::from_str(
            r#"
            base_url = "https://board.example.org"

            [scrape]
            max_pages = 5
            "#,
        )
        .unwrap();
        assert_eq!(file.base_url.as_deref(), Some("https://board.example.org"));
        let scrape = file.scrape.unwrap();
        assert_eq!(scrape.max_pages, 5);
        // Unspecified fields fall back to defaults.
        assert_eq!(scrape.max_attempts, 4);
    }

    #[test]
    fn test_load_with_explicit_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.database_path, dir.path().join("jobhound.db"));
    }
}
