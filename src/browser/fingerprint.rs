use anyhow::Result;
use rand::{thread_rng, Rng};
use tracing::debug;

use crate::cli::config::{BrowserSettings, WindowSize};

/// Identity presented by one browser session
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub user_agent: String,
    pub window: WindowSize,
}

/// Picks a session identity out of the configured user agents
pub struct FingerprintManager {
    user_agents: Vec<String>,
    window: WindowSize,
}

impl FingerprintManager {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            user_agents: settings.user_agents.clone(),
            window: settings.window_size.clone(),
        }
    }

    /// Select a random profile
    pub fn random_profile(&self) -> Result<SessionProfile> {
        if self.user_agents.is_empty() {
            anyhow::bail!("No user agents configured");
        }

        let mut rng = thread_rng();
        let user_agent = self.user_agents[rng.gen_range(0..self.user_agents.len())].clone();
        debug!("Selected user agent: {}", user_agent);

        Ok(SessionProfile {
            user_agent,
            window: self.window.clone(),
        })
    }
}
