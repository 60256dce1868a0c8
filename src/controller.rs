use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::commands::{is_enabled, statuses, Command, CommandStatus, PendingInput};
use crate::error::RecordError;
use crate::metrics::Metrics;
use crate::recorder::{new_session_id, SessionRecord, SessionRecorder};
use crate::session::{Category, Phase, SessionState};
use crate::ticker::Ticker;

/// Result of dispatching a command
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Applied,
    /// The command was disabled; nothing changed
    Ignored,
    Saved(PathBuf),
}

/// Notifications delivered to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// State, labels or command enablement changed
    Changed(Snapshot),
    /// Time moved on while running; only time-derived values differ
    Ticked(Snapshot),
    Saved { session_id: String, path: PathBuf },
}

/// Read-only view of the session for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub success: u64,
    pub fail: u64,
    pub total: u64,
    pub success_rate: String,
    pub items_per_minute: String,
    pub elapsed: String,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    pub site: Option<String>,
    pub outlet: Option<String>,
    pub sites: Vec<String>,
    pub outlets: Vec<String>,
    pub pending: PendingInput,
    pub commands: Vec<CommandStatus>,
}

impl Snapshot {
    pub fn is_enabled(&self, command: Command) -> bool {
        self.commands
            .iter()
            .any(|s| s.command == command && s.enabled)
    }
}

/// Owns the session and is the only place it is mutated
pub struct SessionController {
    state: SessionState,
    pending: PendingInput,
    clock: Box<dyn Clock>,
    ticker: Ticker,
    recorder: SessionRecorder,
    auto_reset_after_save: bool,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl SessionController {
    pub fn new<C: Clock>(state: SessionState, clock: C, recorder: SessionRecorder) -> Self {
        Self {
            state,
            pending: PendingInput::default(),
            clock: Box::new(clock),
            ticker: Ticker::default(),
            recorder,
            auto_reset_after_save: false,
            subscribers: Vec::new(),
        }
    }

    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        self.ticker = ticker;
        self
    }

    /// Reset the session after every successful save
    pub fn with_auto_reset(mut self, enabled: bool) -> Self {
        self.auto_reset_after_save = enabled;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn pending(&self) -> &PendingInput {
        &self.pending
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::compute(&self.state, self.clock.now())
    }

    pub fn snapshot(&self) -> Snapshot {
        let metrics = self.metrics();
        Snapshot {
            phase: self.state.phase(),
            success: metrics.success,
            fail: metrics.fail,
            total: metrics.total,
            success_rate: metrics.success_rate_text(),
            items_per_minute: metrics.items_per_minute_text(),
            elapsed: metrics.duration_text(),
            started_at: self.state.started_at,
            ended_at: self.state.ended_at,
            site: self.state.site.clone(),
            outlet: self.state.outlet.clone(),
            sites: self.state.sites.as_slice().to_vec(),
            outlets: self.state.outlets.as_slice().to_vec(),
            pending: self.pending.clone(),
            commands: self.commands(),
        }
    }

    pub fn commands(&self) -> Vec<CommandStatus> {
        statuses(&self.state, &self.pending)
    }

    pub fn is_enabled(&self, command: Command) -> bool {
        is_enabled(command, &self.state, &self.pending)
    }

    /// Registers an observer. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Dispatch, RecordError> {
        if !self.is_enabled(command) {
            debug!(%command, phase = %self.state.phase(), "ignored disabled command");
            return Ok(Dispatch::Ignored);
        }

        let now = self.clock.now();
        match command {
            Command::Start => {
                self.state.start(now);
                self.ticker.start(now);
                info!(started_at = %now, "session started");
            }
            Command::Finish => {
                self.state.finish(now);
                self.ticker.stop();
                info!(
                    success = self.state.success,
                    fail = self.state.fail,
                    "session finished"
                );
            }
            Command::Reset => {
                self.state.reset();
                self.ticker.stop();
                info!("session reset");
            }
            Command::RecordSuccess => {
                self.state.record_success();
            }
            Command::RecordFail => {
                self.state.record_fail();
            }
            Command::AddCategory | Command::SetCategory => {
                let Some(kind) = command.category() else {
                    return Ok(Dispatch::Ignored);
                };
                let label = std::mem::take(self.pending.get_mut(kind));
                self.state.choose(kind, &label);
            }
            Command::Save => return self.save(now),
        }

        self.publish_changed();
        Ok(Dispatch::Applied)
    }

    /// Replaces the pending text for a label input
    pub fn set_pending(&mut self, kind: Category, text: impl Into<String>) {
        *self.pending.get_mut(kind) = text.into();
        self.publish_changed();
    }

    /// Selects `label`, registering it first if it is new
    pub fn select(&mut self, kind: Category, label: &str) -> Dispatch {
        if self.state.selection(kind) == Some(label.trim()) {
            return Dispatch::Ignored;
        }
        if !self.state.choose(kind, label) {
            debug!(%kind, "rejected blank label");
            return Dispatch::Ignored;
        }
        self.publish_changed();
        Dispatch::Applied
    }

    /// Advances the ticker; publishes a tick when one was due
    pub fn on_tick(&mut self) -> bool {
        if !self.ticker.poll(self.clock.now()) {
            return false;
        }
        let snapshot = self.snapshot();
        self.publish(SessionEvent::Ticked(snapshot));
        true
    }

    /// How long the event loop may wait before the next tick is due
    pub fn tick_timeout(&self) -> Option<Duration> {
        self.ticker.time_until_due(self.clock.now())
    }

    fn save(&mut self, now: DateTime<Local>) -> Result<Dispatch, RecordError> {
        let Some(record) = SessionRecord::from_session(&self.state, now, new_session_id(now))
        else {
            return Ok(Dispatch::Ignored);
        };

        let path = self.recorder.append(&record).inspect_err(|e| {
            warn!(error = %e, "failed to save session");
        })?;
        info!(session_id = %record.session_id, path = %path.display(), "session saved");
        self.publish(SessionEvent::Saved {
            session_id: record.session_id,
            path: path.clone(),
        });

        if self.auto_reset_after_save {
            self.state.reset();
            self.ticker.stop();
            self.publish_changed();
        }
        Ok(Dispatch::Saved(path))
    }

    fn publish_changed(&mut self) {
        let snapshot = self.snapshot();
        self.publish(SessionEvent::Changed(snapshot));
    }

    fn publish(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
