//! Page readiness protocol.
//!
//! ```text
//! Start -> Navigated -> KeyMarkersFound -> ExpansionAttempted -> ContentReady -> End
//!                  \-> TimedOut -------------------------------------------/
//! ```
//!
//! A missing key marker ends the protocol in `TimedOut` without a document.
//! Failures after the markers were found only degrade the result; the page is
//! read as currently rendered. Navigation and snapshot failures are session
//! faults and surface as errors. The session is always released at `End`.

use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::browser::{Condition, PageSession, SessionError, SCROLL_TO_BOTTOM};
use crate::cli::config::ReadinessSettings;
use crate::crawler::task::{HarvestTask, TaskFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Start,
    Navigated,
    KeyMarkersFound,
    ExpansionAttempted,
    ContentReady,
    TimedOut,
    End,
}

/// Terminal result of a protocol run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Document snapshot taken at `ContentReady`
    Ready { document: String, degraded: bool },
    /// Key markers never appeared
    TimedOut,
}

pub struct ReadinessProtocol<'a> {
    identifier: &'a str,
    settings: &'a ReadinessSettings,
    state: ReadinessState,
    history: Vec<ReadinessState>,
}

impl<'a> ReadinessProtocol<'a> {
    pub fn new(identifier: &'a str, settings: &'a ReadinessSettings) -> Self {
        Self {
            identifier,
            settings,
            state: ReadinessState::Start,
            history: vec![ReadinessState::Start],
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[ReadinessState] {
        &self.history
    }

    fn advance(&mut self, next: ReadinessState) {
        debug!("{}: {:?} -> {:?}", self.identifier, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.settings.settle_ms)
    }

    /// Drive the protocol up to `ContentReady` or `TimedOut`
    pub async fn run(
        &mut self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<PageOutcome, SessionError> {
        info!("{}: opening {}", self.identifier, url);
        session.navigate(url).await?;
        self.advance(ReadinessState::Navigated);

        // Mount lazily loaded blocks before looking for markers
        if let Err(e) = session.execute(SCROLL_TO_BOTTOM).await {
            warn!("{}: initial scroll failed: {}", self.identifier, e);
        }
        sleep(self.settle()).await;

        let markers = format!("{}, {}", self.settings.title_marker, self.settings.expand_control);
        let marker_timeout = Duration::from_secs(self.settings.marker_timeout_secs);
        match session.wait_for(&markers, Condition::Visible, marker_timeout).await {
            Ok(()) => self.advance(ReadinessState::KeyMarkersFound),
            Err(SessionError::ConditionNotMet { .. }) => {
                warn!(
                    "{}: key page markers not found within {:?}, possibly a challenge or error page",
                    self.identifier, marker_timeout
                );
                self.advance(ReadinessState::TimedOut);
                return Ok(PageOutcome::TimedOut);
            }
            Err(e) => return Err(e),
        }

        let degraded = match self.expand(session).await {
            Ok(()) => false,
            Err(e) => {
                warn!("{}: details expansion failed, reading page as rendered: {}", self.identifier, e);
                true
            }
        };
        if self.state == ReadinessState::KeyMarkersFound {
            self.advance(ReadinessState::ExpansionAttempted);
        }
        self.advance(ReadinessState::ContentReady);

        let document = session.document().await?;
        info!("{}: page ready ({} bytes)", self.identifier, document.len());

        Ok(PageOutcome::Ready { document, degraded })
    }

    /// Open the details block if the page has a toggle for it
    async fn expand(&mut self, session: &mut dyn PageSession) -> Result<(), SessionError> {
        let control = self.settings.expand_control.as_str();

        if !session.exists(control).await? {
            info!("{}: no details control on page, skipping expansion", self.identifier);
            return Ok(());
        }

        session.scroll_into_view(control).await?;
        session
            .wait_for(control, Condition::Clickable, Duration::from_secs(self.settings.expand_timeout_secs))
            .await?;
        session.click(control).await?;
        self.advance(ReadinessState::ExpansionAttempted);
        debug!("{}: details control clicked", self.identifier);

        session
            .wait_for(
                &self.settings.expanded_content,
                Condition::Visible,
                Duration::from_secs(self.settings.content_timeout_secs),
            )
            .await?;
        sleep(self.settle()).await;

        Ok(())
    }

    /// Release the session. Failures are logged, never returned.
    pub async fn release(&mut self, session: &mut dyn PageSession) {
        match session.close().await {
            Ok(()) => debug!("{}: browser session released", self.identifier),
            Err(e) => error!("{}: failed to release browser session: {}", self.identifier, e),
        }
        self.advance(ReadinessState::End);
    }
}

/// Run the protocol for `task` under a wall-clock `deadline`, then release the
/// session whatever happened.
pub async fn acquire(
    mut session: Box<dyn PageSession>,
    task: &HarvestTask,
    settings: &ReadinessSettings,
    deadline: Duration,
) -> Result<PageOutcome, TaskFailure> {
    let mut protocol = ReadinessProtocol::new(&task.identifier, settings);

    let run = timeout(deadline, protocol.run(session.as_mut(), &task.url)).await;
    let outcome = match run {
        Ok(result) => result.map_err(TaskFailure::from),
        Err(_) => {
            warn!("{}: deadline reached in state {:?}", task.identifier, protocol.state());
            Err(TaskFailure::Deadline(deadline))
        }
    };

    protocol.release(session.as_mut()).await;
    outcome
}
