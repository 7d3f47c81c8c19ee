use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::browser::WebDriverFactory;
use crate::cli::config::{HarvesterConfig, OutputFormat};
use crate::crawler::record::build_record;
use crate::crawler::HarvestController;
use crate::storage::{FileIdentifierSource, FileTableWriter, IdentifierSource, TableWriter};

/// Command line values that take precedence over the loaded configuration
#[derive(Debug, Default)]
pub struct ScrapeOverrides {
    pub workers: Option<usize>,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub sort: bool,
}

impl ScrapeOverrides {
    fn apply(self, config: &mut HarvesterConfig) {
        if let Some(workers) = self.workers {
            config.scraper.workers = workers;
        }

        if let Some(output) = self.output {
            config.output.directory = output;
        }

        if let Some(format) = self.format {
            config.output.format = format;
        }

        if self.sort {
            config.scraper.sort_output = true;
        }
    }
}

fn load_config(profile: Option<&str>) -> Result<HarvesterConfig> {
    match profile {
        Some(name) => HarvesterConfig::load_profile(name)
            .context(format!("Failed to load profile: {}", name)),
        None => HarvesterConfig::load_default(),
    }
}

/// Harvest every identifier in `input` and write the result table
pub async fn scrape(input: PathBuf, profile: Option<String>, overrides: ScrapeOverrides) -> Result<()> {
    let mut config = load_config(profile.as_deref())?;
    overrides.apply(&mut config);
    config.validate()?;

    // Input problems abort before any session is opened
    let identifiers = FileIdentifierSource::new(&input, &config.input)
        .load_identifiers()
        .context("Failed to load identifiers")?;

    if config.scraper.workers != config.scraper.effective_workers() {
        warn!(
            "Worker count {} out of range, using {}",
            config.scraper.workers,
            config.scraper.effective_workers()
        );
    }

    let factory = Arc::new(WebDriverFactory::new(config.browser.clone()));
    let writer = FileTableWriter::new(config.output.clone());
    let controller = HarvestController::new(config, factory);

    let report = controller.run(identifiers).await;
    let path = writer.write_table(&report.records)?;

    println!("Run ID: {}", report.run_id);
    println!("Submitted: {}", report.submitted);
    println!("Produced: {}", report.produced());
    println!("Dropped: {}", report.dropped());
    println!(
        "Ready / degraded / timed out: {} / {} / {}",
        report.metrics.ready, report.metrics.degraded, report.metrics.timed_out
    );
    println!("Duration: {}s", report.metrics.elapsed_secs());
    println!("Output: {}", path.display());

    if !report.failures.is_empty() {
        println!("Dropped identifiers:");
        for failure in &report.failures {
            println!("  - {} ({}): {}", failure.identifier, failure.error_type, failure.error);
        }
    }

    Ok(())
}

/// Build a record from a saved page and print it as JSON
pub async fn extract(html_file: PathBuf, id: Option<String>) -> Result<()> {
    let config = HarvesterConfig::load_default()?;

    let source = tokio::fs::read_to_string(&html_file)
        .await
        .context(format!("Failed to read {}", html_file.display()))?;

    let identifier = match id {
        Some(id) => id,
        None => html_file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .context("Cannot derive an identifier from the file name, pass --id")?,
    };

    let url = config.scraper.page_url(&identifier);
    let record = build_record(&identifier, &url, Some(&source));

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = HarvesterConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Show a profile, creating it from defaults if it does not exist
pub fn manage_profile(profile_name: String) -> Result<()> {
    match HarvesterConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{}", serde_yaml::to_string(&config)?);
        },
        Err(_) => {
            warn!("Profile '{}' does not exist. Creating a default profile.", profile_name);
            let config = HarvesterConfig::default();
            config.save_as_profile(&profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config() -> Result<()> {
    let config = HarvesterConfig::load_default()?;
    println!("Current configuration:");
    println!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}
