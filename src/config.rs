//! TOML configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration
//! for crawling Swift packages on github.com. The API credential is never
//! stored in the file: `github.token_env` names the environment variable
//! it is read from.

use anyhow::{bail, Context, Result};
use depcrawl_core::extract::ExtractorMarkers;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub extractor: ExtractorMarkers,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_raw_url")]
    pub raw_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            token_env: default_token_env(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_user_agent() -> String {
    concat!("depcrawl/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl GithubConfig {
    /// The API token from the configured environment variable, if set.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_quota_low_water")]
    pub quota_low_water: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_package_host_prefix")]
    pub package_host_prefix: String,
    #[serde(default = "default_memoize")]
    pub memoize: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            manifest_path: default_manifest_path(),
            max_depth: default_max_depth(),
            quota_low_water: default_quota_low_water(),
            per_page: default_per_page(),
            package_host_prefix: default_package_host_prefix(),
            memoize: default_memoize(),
        }
    }
}

fn default_language() -> String {
    "swift".to_string()
}
fn default_manifest_path() -> String {
    "Package.swift".to_string()
}
fn default_max_depth() -> u32 {
    3
}
fn default_quota_low_water() -> u64 {
    5
}
fn default_per_page() -> u32 {
    30
}
fn default_package_host_prefix() -> String {
    "https://github.com/".to_string()
}
fn default_memoize() -> bool {
    true
}

impl CrawlConfig {
    /// Search expression: repositories in `language` mentioning the manifest file.
    pub fn search_query(&self) -> String {
        let file_name = self
            .manifest_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.manifest_path);
        format!("{} language:{}", file_name, self.language)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
    #[serde(default = "default_journal_file")]
    pub journal_file: String,
    #[serde(default = "default_repositories_csv")]
    pub repositories_csv: String,
    #[serde(default = "default_dependencies_csv")]
    pub dependencies_csv: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            checkpoint_file: default_checkpoint_file(),
            journal_file: default_journal_file(),
            repositories_csv: default_repositories_csv(),
            dependencies_csv: default_dependencies_csv(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}
fn default_checkpoint_file() -> String {
    "checkpoint.json".to_string()
}
fn default_journal_file() -> String {
    "records.jsonl".to_string()
}
fn default_repositories_csv() -> String {
    "repositories.csv".to_string()
}
fn default_dependencies_csv() -> String {
    "dependencies.csv".to_string()
}

impl OutputConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(&self.checkpoint_file)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(&self.journal_file)
    }

    pub fn repositories_csv_path(&self) -> PathBuf {
        self.dir.join(&self.repositories_csv)
    }

    pub fn dependencies_csv_path(&self) -> PathBuf {
        self.dir.join(&self.dependencies_csv)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate transport
    if config.github.timeout_secs == 0 {
        bail!("github.timeout_secs must be > 0");
    }

    // Validate crawl
    if !(1..=100).contains(&config.crawl.per_page) {
        bail!("crawl.per_page must be in [1, 100]");
    }
    if config.crawl.language.trim().is_empty() {
        bail!("crawl.language must not be empty");
    }
    if config.crawl.manifest_path.trim().is_empty() {
        bail!("crawl.manifest_path must not be empty");
    }
    if config.crawl.package_host_prefix.trim().is_empty() {
        bail!("crawl.package_host_prefix must not be empty");
    }

    // Validate extractor
    let markers = &config.extractor;
    for (name, value) in [
        ("declaration_marker", &markers.declaration_marker),
        ("url_marker", &markers.url_marker),
        ("url_delimiter", &markers.url_delimiter),
        ("version_marker", &markers.version_marker),
        ("version_delimiter", &markers.version_delimiter),
    ] {
        if value.is_empty() {
            bail!("extractor.{} must not be empty", name);
        }
    }

    Ok(())
}
