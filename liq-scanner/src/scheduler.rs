//! Cooperative event loop for a scanning session
//!
//! One tokio task owns the `Session` and runs every mutation to completion
//! before taking the next event, so append + dedup + aggregate + persist is
//! never interleaved with another change. Events come from:
//! - commands sent through a `SchedulerHandle`
//! - the input-settle timer (debounced scanner keystrokes)
//! - the manifest resync timer
//! - completion of a spawned manifest fetch
//!
//! A fetch runs outside the loop so scans keep matching against the current
//! manifest while it is out; its result is applied as a single swap when it
//! completes. At most one fetch is in flight.

use crate::backend::Backend;
use crate::error::{FetchError, SchedulerError, SubmitError};
use crate::manifest::ManifestSnapshot;
use crate::report::{GroupProgress, MissingReport};
use crate::session::Session;
use crate::submission::SubmissionReceipt;
use crate::sync::{SyncController, SyncMode};
use liq_common::config::ScannerConfig;
use liq_common::events::{EventBus, ScanEvent};
use liq_common::time;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

/// Timer settings for the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Inactivity before typed input is matched
    pub debounce: Duration,
    /// Period of the background manifest resync
    pub autosync_interval: Duration,
}

impl From<&ScannerConfig> for SchedulerConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            debounce: config.debounce,
            autosync_interval: config.autosync_interval,
        }
    }
}

/// Requests served by the loop
#[derive(Debug)]
pub enum Command {
    /// Input field changed; (re)arms the settle timer
    Input(String),
    /// Explicit submit key; cancels the settle timer and matches now
    Enter(String),
    SyncNow,
    Clear,
    Submit(oneshot::Sender<Result<SubmissionReceipt, SubmitError>>),
    Report(oneshot::Sender<MissingReport>),
    Progress(oneshot::Sender<Vec<GroupProgress>>),
}

/// Typed input waiting for the settle timer
struct PendingInput {
    text: String,
    deadline: Instant,
}

struct InFlightSync {
    mode: SyncMode,
    handle: JoinHandle<Result<ManifestSnapshot, FetchError>>,
}

#[derive(Default)]
struct LoopState {
    pending: Option<PendingInput>,
    in_flight: Option<InFlightSync>,
    /// Submissions handed to the backend and not yet answered
    submissions: JoinSet<()>,
}

/// Cloneable front door to a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl SchedulerHandle {
    async fn send(&self, command: Command) -> Result<(), SchedulerError> {
        self.tx.send(command).await.map_err(|_| SchedulerError::Closed)
    }

    pub async fn input(&self, text: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(Command::Input(text.into())).await
    }

    pub async fn enter(&self, text: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(Command::Enter(text.into())).await
    }

    pub async fn sync_now(&self) -> Result<(), SchedulerError> {
        self.send(Command::SyncNow).await
    }

    pub async fn clear(&self) -> Result<(), SchedulerError> {
        self.send(Command::Clear).await
    }

    /// Build and deliver a submission; resolves when the backend answers
    pub async fn submit(&self) -> Result<Result<SubmissionReceipt, SubmitError>, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit(reply)).await?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    pub async fn missing_report(&self) -> Result<MissingReport, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Report(reply)).await?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    pub async fn group_progress(&self) -> Result<Vec<GroupProgress>, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Progress(reply)).await?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    /// Stop the loop
    ///
    /// A pending settle timer is flushed and in-flight submissions are
    /// awaited before the loop returns.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

pub struct Scheduler {
    session: Session,
    sync: SyncController,
    backend: Arc<dyn Backend>,
    events: EventBus,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        session: Session,
        backend: Arc<dyn Backend>,
        events: EventBus,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            session,
            sync: SyncController::new(Arc::clone(&backend), events.clone()),
            backend,
            events,
            config,
        }
    }

    /// Start the loop on the current runtime
    ///
    /// The join handle yields the session back once the loop stops.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<Session>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let shutdown = CancellationToken::new();
        let handle = SchedulerHandle {
            tx,
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(self.run(rx, shutdown));
        (handle, task)
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) -> Session {
        let mut state = LoopState::default();
        let period = self.config.autosync_interval;
        let mut resync = tokio::time::interval_at(Instant::now() + period, period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            debounce_ms = self.config.debounce.as_millis() as u64,
            autosync_ms = period.as_millis() as u64,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = settle(&state.pending) => {
                    if let Some(pending) = state.pending.take() {
                        debug!(text = %pending.text, "Input settled");
                        self.session.match_scan(&pending.text);
                    }
                }

                result = sync_finished(&mut state.in_flight) => {
                    if let Some(done) = state.in_flight.take() {
                        // Failure is already logged and published
                        let _ = self.sync.complete(&mut self.session, result, done.mode);
                    }
                }

                Some(_) = state.submissions.join_next(), if !state.submissions.is_empty() => {}

                command = rx.recv() => match command {
                    Some(command) => self.handle_command(command, &mut state),
                    None => break,
                },

                _ = resync.tick() => {
                    if state.in_flight.is_some() {
                        debug!("Resync tick skipped, fetch already in flight");
                    } else {
                        state.in_flight = Some(self.start_fetch(SyncMode::Silent));
                    }
                }
            }
        }

        if let Some(pending) = state.pending.take() {
            debug!(text = %pending.text, "Flushing pending input on shutdown");
            self.session.match_scan(&pending.text);
        }
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.handle.abort();
        }
        if !state.submissions.is_empty() {
            info!(count = state.submissions.len(), "Waiting for in-flight submissions");
            while state.submissions.join_next().await.is_some() {}
        }
        info!(records = self.session.ledger().len(), "Scheduler stopped");
        self.session
    }

    fn handle_command(&mut self, command: Command, state: &mut LoopState) {
        match command {
            Command::Input(text) => {
                if text.trim().is_empty() {
                    state.pending = None;
                } else {
                    state.pending = Some(PendingInput {
                        text,
                        deadline: Instant::now() + self.config.debounce,
                    });
                }
            }
            Command::Enter(text) => {
                if state.pending.take().is_some() {
                    debug!("Pending input cancelled by explicit submit");
                }
                self.session.match_scan(&text);
            }
            Command::SyncNow => match state.in_flight.as_mut() {
                // Join the running fetch but surface its outcome
                Some(in_flight) => in_flight.mode = SyncMode::Blocking,
                None => state.in_flight = Some(self.start_fetch(SyncMode::Blocking)),
            },
            Command::Clear => {
                self.session.clear();
            }
            Command::Submit(reply) => self.start_submit(reply, &mut state.submissions),
            Command::Report(reply) => {
                let _ = reply.send(self.session.missing_report());
            }
            Command::Progress(reply) => {
                let _ = reply.send(self.session.group_progress());
            }
        }
    }

    fn start_fetch(&self, mode: SyncMode) -> InFlightSync {
        debug!(?mode, "Starting manifest fetch");
        let sync = self.sync.clone();
        InFlightSync {
            mode,
            handle: tokio::spawn(async move { sync.fetch().await }),
        }
    }

    /// Build the payload now, deliver it off the loop
    fn start_submit(
        &self,
        reply: oneshot::Sender<Result<SubmissionReceipt, SubmitError>>,
        submissions: &mut JoinSet<()>,
    ) {
        let payload = match self.session.build_submission(time::now()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Submission refused");
                self.events.emit_lossy(ScanEvent::SubmissionFailed {
                    error: e.to_string(),
                    timestamp: time::now(),
                });
                let _ = reply.send(Err(e));
                return;
            }
        };

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        submissions.spawn(async move {
            let groups = payload.groups.len();
            let result = backend.submit(&payload).await;
            match &result {
                Ok(receipt) => events.emit_lossy(ScanEvent::SubmissionSent {
                    groups,
                    sheet: receipt.sheet.clone(),
                    blocks: receipt.blocks,
                    timestamp: time::now(),
                }),
                Err(e) => {
                    warn!(error = %e, "Submission failed");
                    events.emit_lossy(ScanEvent::SubmissionFailed {
                        error: e.to_string(),
                        timestamp: time::now(),
                    });
                }
            }
            let _ = reply.send(result);
        });
    }
}

async fn settle(pending: &Option<PendingInput>) {
    match pending {
        Some(pending) => tokio::time::sleep_until(pending.deadline).await,
        None => std::future::pending().await,
    }
}

async fn sync_finished(
    in_flight: &mut Option<InFlightSync>,
) -> Result<ManifestSnapshot, FetchError> {
    match in_flight {
        Some(in_flight) => match (&mut in_flight.handle).await {
            Ok(result) => result,
            Err(e) => Err(FetchError::Network(format!("fetch task failed: {}", e))),
        },
        None => std::future::pending().await,
    }
}
