//! # Monkey
//!
//! A [`Monkey`] binds one [`User`] to one [`Business`] and drives it as an
//! independent tokio task.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start--> Running --cycle error--> Failed
//!                    |
//!                    +------stop---------> Stopped
//! ```
//!
//! `Failed` and `Stopped` are terminal. A monkey is never restarted; the
//! operator deletes it and creates a new one.
//!
//! Stopping cancels the monkey's token, which interrupts whatever the loop is
//! waiting on (a request, the spawn poll, a kernel receive or the pause between
//! cycles). Once the task has finished, the business gets one bounded chance to
//! delete its lab.

use crate::business::{Business, BusinessKind};
use crate::error::{MonkeyError, Result};
use crate::user::User;
use chrono::{DateTime, Utc};
use mobu_common::StateMachine;
use mobu_jupyter_client::ClientSnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessState {
    Idle,
    Running,
    Stopped,
    Failed,
}

impl BusinessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BusinessState::Stopped | BusinessState::Failed)
    }
}

#[derive(Debug, Clone)]
struct MonkeyStatus {
    state: BusinessState,
    cycles: u64,
    last_error: Option<String>,
    last_output: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl MonkeyStatus {
    fn new() -> Self {
        Self {
            state: BusinessState::Idle,
            cycles: 0,
            last_error: None,
            last_output: None,
            started_at: None,
        }
    }
}

/// What the registry reports about one monkey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonkeySummary {
    pub username: String,
    pub uidnumber: u64,
    pub business: BusinessKind,
    pub state: BusinessState,
    pub cycles: u64,
    pub last_error: Option<String>,
    pub last_output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

/// A summary plus the session's cookies, for inspecting a single monkey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonkeyDetail {
    #[serde(flatten)]
    pub summary: MonkeySummary,
    pub session: Option<ClientSnapshot>,
}

pub struct Monkey {
    user: User,
    business: Arc<dyn Business>,
    status: Arc<StateMachine<MonkeyStatus>>,
    cancel: CancellationToken,
    handle: StateMachine<Option<JoinHandle<()>>>,
    cycle_pause: Duration,
    teardown_timeout: Duration,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Monkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monkey")
            .field("user", &self.user)
            .field("business", &self.business.kind())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Monkey {
    pub fn new(
        user: User,
        business: Arc<dyn Business>,
        cancel: CancellationToken,
        cycle_pause: Duration,
        teardown_timeout: Duration,
    ) -> Self {
        Self {
            user,
            business,
            status: Arc::new(StateMachine::new(MonkeyStatus::new())),
            cancel,
            handle: StateMachine::new(None),
            cycle_pause,
            teardown_timeout,
            created_at: Utc::now(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn kind(&self) -> BusinessKind {
        self.business.kind()
    }

    pub fn state(&self) -> BusinessState {
        self.status.lock().state
    }

    /// Spawns the business loop. Only an `Idle` monkey can be started.
    pub fn start(&self) -> Result<()> {
        // Held until the handle is stored, so a concurrent `stop` either
        // refuses this start or finds the task to await and tear down.
        let mut handle = self.handle.lock();
        if self.cancel.is_cancelled() {
            return Err(MonkeyError::AlreadyStarted(self.user.username.clone()));
        }
        let started = self.status.transition(|status| {
            if status.state != BusinessState::Idle {
                return false;
            }
            status.state = BusinessState::Running;
            status.started_at = Some(Utc::now());
            true
        });
        if !started {
            return Err(MonkeyError::AlreadyStarted(self.user.username.clone()));
        }

        let span = info_span!("monkey", user = %self.user.username, business = %self.business.kind());
        let task = run_loop(
            self.business.clone(),
            self.status.clone(),
            self.cancel.clone(),
            self.cycle_pause,
        );
        *handle = Some(tokio::spawn(task.instrument(span)));
        Ok(())
    }

    /// Stops the loop and tears the session down.
    ///
    /// Returns once the loop task has finished and teardown has either
    /// succeeded, failed or timed out. Teardown failures are only logged.
    /// Calling it again is harmless.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        let was_started = handle.is_some();

        if let Some(handle) = handle
            && let Err(e) = handle.await
            && e.is_panic()
        {
            error!(user = %self.user.username, "Monkey loop panicked");
            self.status.transition(|status| {
                status.state = BusinessState::Failed;
                status.last_error = Some("business loop panicked".to_string());
            });
        }

        self.status.transition(|status| {
            if !status.state.is_terminal() {
                status.state = BusinessState::Stopped;
            }
        });

        if was_started {
            self.teardown().await;
        }
    }

    async fn teardown(&self) {
        let user = &self.user.username;
        match tokio::time::timeout(self.teardown_timeout, self.business.teardown()).await {
            Ok(Ok(())) => debug!(%user, "Teardown complete"),
            Ok(Err(e)) => warn!(%user, error = %e, "Teardown failed"),
            Err(_) => warn!(%user, timeout = ?self.teardown_timeout, "Teardown timed out"),
        }
    }

    pub fn summary(&self) -> MonkeySummary {
        let status = self.status.snapshot();
        MonkeySummary {
            username: self.user.username.clone(),
            uidnumber: self.user.uidnumber,
            business: self.business.kind(),
            state: status.state,
            cycles: status.cycles,
            last_error: status.last_error,
            last_output: status.last_output,
            created_at: self.created_at,
            started_at: status.started_at,
        }
    }

    pub fn detail(&self) -> MonkeyDetail {
        MonkeyDetail {
            summary: self.summary(),
            session: self.business.client().map(|client| client.snapshot()),
        }
    }
}

async fn run_loop(
    business: Arc<dyn Business>,
    status: Arc<StateMachine<MonkeyStatus>>,
    cancel: CancellationToken,
    cycle_pause: Duration,
) {
    info!("Monkey started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = business.cycle() => outcome,
        };

        match outcome {
            Ok(output) => {
                let cycles = status.transition(|status| {
                    status.cycles += 1;
                    if output.is_some() {
                        status.last_output = output;
                    }
                    status.cycles
                });
                debug!(cycles, "Cycle complete");
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                error!(error = %e, "Cycle failed");
                status.transition(|status| {
                    status.state = BusinessState::Failed;
                    status.last_error = Some(e.to_string());
                });
                return;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(cycle_pause) => {}
        }
    }

    status.transition(|status| {
        if status.state == BusinessState::Running {
            status.state = BusinessState::Stopped;
        }
    });
    info!("Monkey stopped");
}
