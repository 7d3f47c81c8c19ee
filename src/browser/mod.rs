pub mod fingerprint;
pub mod session;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// Re-export common types
pub use session::WebDriverFactory;

/// Scroll the whole page so lazily mounted blocks get rendered
pub const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Condition a waited-on element has to satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Visible,
    Clickable,
}

/// Failures raised by a page session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start browser session: {0}")]
    Connect(String),

    #[error("failed to navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("'{selector}' did not become {condition:?} within {timeout:?}")]
    ConditionNotMet {
        selector: String,
        condition: Condition,
        timeout: Duration,
    },

    #[error("browser session failed: {0}")]
    Driver(String),

    #[error("script execution failed: {0}")]
    Script(String),

    #[error("interaction with '{selector}' failed: {reason}")]
    Interaction { selector: String, reason: String },

    #[error("failed to read page document: {0}")]
    Snapshot(String),

    #[error("failed to close browser session: {0}")]
    Close(String),
}

/// One page-acquisition session, exclusively owned by the task driving it
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSession: Send {
    /// Load the given address
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Wait until the first element matching `selector` satisfies `condition`
    async fn wait_for(
        &mut self,
        selector: &str,
        condition: Condition,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Run a script in the page
    async fn execute(&mut self, script: &str) -> Result<(), SessionError>;

    /// Whether any element matches `selector` right now
    async fn exists(&mut self, selector: &str) -> Result<bool, SessionError>;

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), SessionError>;

    async fn click(&mut self, selector: &str) -> Result<(), SessionError>;

    /// Snapshot of the rendered document markup
    async fn document(&mut self) -> Result<String, SessionError>;

    /// Release the session. Called exactly once per session.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens fresh page sessions for worker tasks
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, SessionError>;
}
