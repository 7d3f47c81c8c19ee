use async_trait::async_trait;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;
use std::time::Duration;
use tracing::{debug, error};

use crate::browser::fingerprint::FingerprintManager;
use crate::browser::{Condition, PageSession, SessionError, SessionFactory};
use crate::cli::config::BrowserSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Page session backed by a WebDriver-controlled Chrome instance
pub struct WebDriverSession {
    /// WebDriver instance, taken on close
    driver: Option<WebDriver>,
}

impl WebDriverSession {
    fn driver(&self) -> Result<&WebDriver, SessionError> {
        self.driver
            .as_ref()
            .ok_or_else(|| SessionError::Snapshot("browser session already closed".to_string()))
    }

    async fn first_match(&self, selector: &str) -> Result<WebElement, SessionError> {
        let driver = self.driver()?;
        driver.find(By::Css(selector)).await.map_err(|e| SessionError::Interaction {
            selector: selector.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A wait that polled until its timeout reports `NoSuchElement`. Anything else
/// means the driver itself failed.
fn wait_error(
    error: WebDriverError,
    selector: &str,
    condition: Condition,
    timeout: Duration,
) -> SessionError {
    match error {
        WebDriverError::NoSuchElement(_) => {
            debug!("Wait for '{}' timed out", selector);
            SessionError::ConditionNotMet {
                selector: selector.to_string(),
                condition,
                timeout,
            }
        }
        other => SessionError::Driver(format!("waiting for '{}': {}", selector, other)),
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to: {}", url);
        self.driver()?
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        condition: Condition,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let query = self
            .driver()?
            .query(By::Css(selector))
            .wait(timeout, POLL_INTERVAL);

        let query = match condition {
            Condition::Visible => query.and_displayed(),
            Condition::Clickable => query.and_clickable(),
        };

        query
            .first()
            .await
            .map(|_| ())
            .map_err(|e| wait_error(e, selector, condition, timeout))
    }

    async fn execute(&mut self, script: &str) -> Result<(), SessionError> {
        self.driver()?
            .execute(script, Vec::new())
            .await
            .map(|_| ())
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, SessionError> {
        let elements = self
            .driver()?
            .find_all(By::Css(selector))
            .await
            .map_err(|e| SessionError::Interaction {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;

        Ok(!elements.is_empty())
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), SessionError> {
        let element = self.first_match(selector).await?;
        element.scroll_into_view().await.map_err(|e| SessionError::Interaction {
            selector: selector.to_string(),
            reason: e.to_string(),
        })
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        let element = self.first_match(selector).await?;
        element.click().await.map_err(|e| SessionError::Interaction {
            selector: selector.to_string(),
            reason: e.to_string(),
        })
    }

    async fn document(&mut self) -> Result<String, SessionError> {
        self.driver()?
            .source()
            .await
            .map_err(|e| SessionError::Snapshot(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await.map_err(|e| SessionError::Close(e.to_string()))?;
            debug!("Browser session closed");
        }

        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            // Spawn a task to quit the driver
            tokio::spawn(async move {
                if let Err(e) = driver.quit().await {
                    error!("Error closing browser session during drop: {}", e);
                }
            });
        }
    }
}

/// Starts Chrome sessions against a running WebDriver server
pub struct WebDriverFactory {
    config: BrowserSettings,
    fingerprints: FingerprintManager,
}

impl WebDriverFactory {
    pub fn new(config: BrowserSettings) -> Self {
        let fingerprints = FingerprintManager::new(&config);
        Self { config, fingerprints }
    }

    fn capabilities(&self) -> Result<ChromeCapabilities, SessionError> {
        let profile = self
            .fingerprints
            .random_profile()
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        let mut caps = DesiredCapabilities::chrome();
        let mut args = vec![
            format!("--user-agent={}", profile.user_agent),
            format!("--window-size={},{}", profile.window.width, profile.window.height),
            "--disable-blink-features=AutomationControlled".to_string(),
        ];
        args.extend(self.config.chrome_args.iter().cloned());

        for arg in &args {
            caps.add_chrome_arg(arg)
                .map_err(|e| SessionError::Connect(e.to_string()))?;
        }

        if self.config.headless {
            caps.set_headless()
                .map_err(|e| SessionError::Connect(e.to_string()))?;
        }

        Ok(caps)
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>, SessionError> {
        let caps = self.capabilities()?;

        let driver = WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .map_err(|e| SessionError::Connect(format!("{} ({})", e, self.config.webdriver_url)))?;

        let page_load_timeout = Duration::from_secs(self.config.page_load_timeout_secs);
        if let Err(e) = driver.set_page_load_timeout(page_load_timeout).await {
            // Never hand out a session without its page load timeout
            let _ = driver.quit().await;
            return Err(SessionError::Connect(e.to_string()));
        }

        debug!("Browser session initialized");

        Ok(Box::new(WebDriverSession { driver: Some(driver) }))
    }
}
