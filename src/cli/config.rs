use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, debug, error};
use url::Url;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HarvesterConfig {
    pub scraper: ScraperSettings,
    pub browser: BrowserSettings,
    pub readiness: ReadinessSettings,
    pub input: InputSettings,
    pub output: OutputSettings,
}

/// Worker pool and task settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ScraperSettings {
    /// Maximum number of concurrent page sessions
    pub workers: usize,

    /// Canonical product page address, `{id}` is replaced by the identifier
    pub url_template: String,

    /// Wall-clock limit for one identifier, covering the whole readiness protocol
    pub task_timeout_secs: u64,

    /// Sort the result table by identifier instead of completion order
    pub sort_output: bool,
}

/// Browser session settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_size: WindowSize,
    pub page_load_timeout_secs: u64,
    /// One of these is picked at random for every session
    pub user_agents: Vec<String>,
    pub chrome_args: Vec<String>,
}

/// Browser window dimensions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// Selectors and timeouts driving the page readiness protocol
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReadinessSettings {
    pub title_marker: String,
    pub expand_control: String,
    pub expanded_content: String,
    pub marker_timeout_secs: u64,
    pub expand_timeout_secs: u64,
    pub content_timeout_secs: u64,
    /// Pause after the initial scroll and after the content appears
    pub settle_ms: u64,
}

/// Identifier source settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct InputSettings {
    pub identifier_column: String,
}

/// Result table settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub format: OutputFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

pub const MAX_WORKERS: usize = 16;

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            url_template: "https://www.wildberries.ru/catalog/{id}/detail.aspx".to_string(),
            task_timeout_secs: 120,
            sort_output: false,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_size: WindowSize {
                width: 1920,
                height: 1080,
            },
            page_load_timeout_secs: 30,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
            chrome_args: vec![
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            title_marker: "h1.product-page__title".to_string(),
            expand_control: "button.j-details-btn-desktop".to_string(),
            expanded_content: "section.product-details__description.option p.option__text".to_string(),
            marker_timeout_secs: 10,
            expand_timeout_secs: 15,
            content_timeout_secs: 20,
            settle_ms: 2000,
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            identifier_column: "article".to_string(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "wildberries_data".to_string(),
            format: OutputFormat::Csv,
        }
    }
}

impl ScraperSettings {
    /// Worker count clamped to the supported range
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }

    /// Build the canonical page address for an identifier
    pub fn page_url(&self, identifier: &str) -> String {
        self.url_template.replace("{id}", identifier)
    }
}

impl HarvesterConfig {
    /// Reject settings that would fail every task
    pub fn validate(&self) -> Result<()> {
        if !self.scraper.url_template.contains("{id}") {
            anyhow::bail!("url_template must contain an {{id}} placeholder");
        }

        let sample = self.scraper.page_url("0");
        let url = Url::parse(&sample).context(format!("Invalid url_template: {}", self.scraper.url_template))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("url_template must be an http(s) address, got {}", url.scheme());
        }

        Url::parse(&self.browser.webdriver_url)
            .context(format!("Invalid webdriver_url: {}", self.browser.webdriver_url))?;

        if self.scraper.task_timeout_secs == 0 {
            anyhow::bail!("task_timeout_secs must be positive");
        }

        Ok(())
    }

    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        let mut path = if let Some(proj_dirs) = directories::ProjectDirs::from("com", "catalog-harvester", "catalog-harvester") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        // Create the profiles directory if it doesn't exist
        path.push("profiles");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        path.pop();
        path
    }

    /// Load the default configuration
    pub fn load_default() -> Result<Self> {
        let config_path = Self::config_dir().join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let profile_path = Self::config_dir().join("profiles").join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_path = Self::config_dir().join("default.yaml");
        self.save_to_file(&config_path)
    }

    /// Save the configuration as a profile
    pub fn save_as_profile(&self, profile: &str) -> Result<()> {
        let profile_path = Self::config_dir().join("profiles").join(format!("{}.yaml", profile));
        self.save_to_file(&profile_path)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let profiles_dir = Self::config_dir().join("profiles");

        if !profiles_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(profiles_dir)? {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_substitutes_identifier() {
        let settings = ScraperSettings::default();
        assert_eq!(
            settings.page_url("12345"),
            "https://www.wildberries.ru/catalog/12345/detail.aspx"
        );
    }

    #[test]
    fn test_effective_workers_is_clamped() {
        let mut settings = ScraperSettings::default();
        settings.workers = 0;
        assert_eq!(settings.effective_workers(), 1);
        settings.workers = 500;
        assert_eq!(settings.effective_workers(), MAX_WORKERS);
        settings.workers = 3;
        assert_eq!(settings.effective_workers(), 3);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = "scraper:\n  workers: 4\noutput:\n  format: json\n";
        let config: HarvesterConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.scraper.workers, 4);
        assert_eq!(config.scraper.task_timeout_secs, 120);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.readiness.marker_timeout_secs, 10);
        assert_eq!(config.input.identifier_column, "article");
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profile.yaml");

        let mut config = HarvesterConfig::default();
        config.scraper.workers = 3;
        config.readiness.settle_ms = 0;
        config.save_to_file(&path).unwrap();

        let loaded = HarvesterConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.scraper.workers, 3);
        assert_eq!(loaded.readiness.settle_ms, 0);
    }

    #[test]
    fn test_validate_rejects_bad_addresses() {
        assert!(HarvesterConfig::default().validate().is_ok());

        let mut config = HarvesterConfig::default();
        config.scraper.url_template = "https://www.wildberries.ru/catalog/detail.aspx".to_string();
        assert!(config.validate().is_err());

        let mut config = HarvesterConfig::default();
        config.scraper.url_template = "ftp://example.test/{id}".to_string();
        assert!(config.validate().is_err());

        let mut config = HarvesterConfig::default();
        config.browser.webdriver_url = "localhost 9515".to_string();
        assert!(config.validate().is_err());
    }
}
