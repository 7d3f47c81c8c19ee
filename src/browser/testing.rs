//! Scripted in-memory sessions for exercising the readiness protocol and the pool.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::browser::{Condition, PageSession, SessionError, SessionFactory};
use crate::cli::config::ReadinessSettings;

/// How a fake page behaves once navigated to
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    pub html: String,
    /// Selectors that satisfy any wait
    pub visible: HashSet<String>,
    /// Selectors reported by `exists`
    pub present: HashSet<String>,
    pub fail_navigation: bool,
    pub fail_click: bool,
    /// Simulated load time spent inside `navigate`
    pub load_time: Duration,
}

impl PageScript {
    /// A page whose markers, expansion control and description all render
    pub fn rendered(html: &str, readiness: &ReadinessSettings) -> Self {
        let mut script = Self {
            html: html.to_string(),
            ..Default::default()
        };
        script.visible.insert(marker_selector(readiness));
        script.visible.insert(readiness.expand_control.clone());
        script.visible.insert(readiness.expanded_content.clone());
        script.present.insert(readiness.expand_control.clone());
        script
    }

    /// A page that loads but never shows any key marker
    pub fn blank(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Default::default()
        }
    }

    /// A page whose navigation raises
    pub fn broken() -> Self {
        Self {
            fail_navigation: true,
            ..Default::default()
        }
    }

    pub fn with_load_time(mut self, load_time: Duration) -> Self {
        self.load_time = load_time;
        self
    }
}

pub fn marker_selector(readiness: &ReadinessSettings) -> String {
    format!("{}, {}", readiness.title_marker, readiness.expand_control)
}

/// Counters shared by every session a factory opened
#[derive(Debug, Default)]
pub struct SessionStats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub actions: Mutex<Vec<String>>,
}

impl SessionStats {
    fn record(&self, action: String) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

pub struct FakeSession {
    pages: Arc<HashMap<String, PageScript>>,
    current: Option<PageScript>,
    stats: Arc<SessionStats>,
}

impl FakeSession {
    pub fn new(pages: HashMap<String, PageScript>) -> (Self, Arc<SessionStats>) {
        let stats = Arc::new(SessionStats::default());
        stats.opened.fetch_add(1, Ordering::SeqCst);
        stats.active.fetch_add(1, Ordering::SeqCst);
        let session = Self {
            pages: Arc::new(pages),
            current: None,
            stats: stats.clone(),
        };
        (session, stats)
    }

    fn page(&self) -> Result<&PageScript, SessionError> {
        self.current
            .as_ref()
            .ok_or_else(|| SessionError::Snapshot("no page loaded".to_string()))
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.stats.record(format!("navigate {}", url));
        let page = self.pages.get(url).cloned().unwrap_or_default();
        if !page.load_time.is_zero() {
            tokio::time::sleep(page.load_time).await;
        }
        if page.fail_navigation {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        self.current = Some(page);
        Ok(())
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        condition: Condition,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        self.stats.record(format!("wait {:?} {}", condition, selector));
        if self.page()?.visible.contains(selector) {
            Ok(())
        } else {
            Err(SessionError::ConditionNotMet {
                selector: selector.to_string(),
                condition,
                timeout,
            })
        }
    }

    async fn execute(&mut self, script: &str) -> Result<(), SessionError> {
        self.stats.record(format!("execute {}", script));
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, SessionError> {
        Ok(self.page()?.present.contains(selector))
    }

    async fn scroll_into_view(&mut self, selector: &str) -> Result<(), SessionError> {
        self.stats.record(format!("scroll {}", selector));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        self.stats.record(format!("click {}", selector));
        if self.page()?.fail_click {
            return Err(SessionError::Interaction {
                selector: selector.to_string(),
                reason: "element click intercepted".to_string(),
            });
        }
        Ok(())
    }

    async fn document(&mut self) -> Result<String, SessionError> {
        self.stats.record("document".to_string());
        Ok(self.page()?.html.clone())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.stats.record("close".to_string());
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out fake sessions sharing one page table and one set of counters
pub struct FakeFactory {
    pages: Arc<HashMap<String, PageScript>>,
    /// Simulated WebDriver handshake time spent inside `open`
    open_delay: Duration,
    pub stats: Arc<SessionStats>,
}

impl FakeFactory {
    pub fn new(pages: HashMap<String, PageScript>) -> Self {
        Self {
            pages: Arc::new(pages),
            open_delay: Duration::ZERO,
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn with_open_delay(mut self, open_delay: Duration) -> Self {
        self.open_delay = open_delay;
        self
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>, SessionError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            pages: self.pages.clone(),
            current: None,
            stats: self.stats.clone(),
        }))
    }
}
