//! Debounced rebuild loop.
//!
//! [`MonitorMachine`] is the pure transition table; [`Monitor`] drives it
//! from a tokio task, selecting between the quiet-window timer and incoming
//! watch events.

use std::sync::Arc;
use std::time::Duration;

use quire_static::{BuildError, MemoryOutput, SiteSnapshot, StaticBuilder};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::snapshot::SnapshotHandle;
use crate::watcher::WatchEvent;

/// Quiet window used when none is configured.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(2);

/// Monitor states.
///
/// `retained` holds the time of the last event seen while a build was
/// running; it schedules one more cycle once the build settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Pending { deadline: Instant },
    Building { retained: Option<Instant> },
    Published { retained: Option<Instant> },
}

/// The debounce state machine, driven by explicit instants.
#[derive(Debug, Clone)]
pub struct MonitorMachine {
    state: MonitorState,
    quiet: Duration,
}

impl MonitorMachine {
    pub fn new(quiet: Duration) -> Self {
        Self {
            state: MonitorState::Idle,
            quiet,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// A filesystem event arrived at `now`.
    pub fn on_event(&mut self, now: Instant) {
        self.state = match self.state {
            MonitorState::Idle | MonitorState::Pending { .. } | MonitorState::Published { .. } => {
                MonitorState::Pending {
                    deadline: now + self.quiet,
                }
            }
            MonitorState::Building { .. } => MonitorState::Building {
                retained: Some(now),
            },
        };
    }

    /// When the timer should fire, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            MonitorState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// The timer fired at `now`. Returns whether a build should start.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        match self.state {
            MonitorState::Pending { deadline } if now >= deadline => {
                self.state = MonitorState::Building { retained: None };
                true
            }
            _ => false,
        }
    }

    /// The build finished and its output replaces the snapshot.
    pub fn build_succeeded(&mut self) {
        if let MonitorState::Building { retained } = self.state {
            self.state = MonitorState::Published { retained };
        }
    }

    /// The build failed; the old snapshot stays.
    pub fn build_failed(&mut self) {
        if let MonitorState::Building { retained } = self.state {
            self.state = self.after(retained);
        }
    }

    /// Leave `Published` once the snapshot has been swapped.
    pub fn settle(&mut self) {
        if let MonitorState::Published { retained } = self.state {
            self.state = self.after(retained);
        }
    }

    fn after(&self, retained: Option<Instant>) -> MonitorState {
        match retained {
            Some(at) => MonitorState::Pending {
                deadline: at + self.quiet,
            },
            None => MonitorState::Idle,
        }
    }
}

/// Something that can produce a fresh snapshot.
pub trait Rebuild: Send + Sync + 'static {
    fn rebuild(&self) -> Result<SiteSnapshot, BuildError>;
}

impl Rebuild for StaticBuilder {
    fn rebuild(&self) -> Result<SiteSnapshot, BuildError> {
        let out = MemoryOutput::new();
        self.build(&out)?;
        Ok(out.into_snapshot())
    }
}

/// Background task owning the rebuild loop.
pub struct Monitor<R> {
    builder: Arc<R>,
    handle: SnapshotHandle,
    machine: MonitorMachine,
}

impl<R: Rebuild> Monitor<R> {
    pub fn new(builder: R, handle: SnapshotHandle, quiet: Duration) -> Self {
        Self {
            builder: Arc::new(builder),
            handle,
            machine: MonitorMachine::new(quiet),
        }
    }

    /// Run until the event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<WatchEvent>) {
        loop {
            let before = self.machine.state();
            let deadline = self.machine.deadline();

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        tracing::debug!("Change: {:?}", event.paths);
                        self.machine.on_event(Instant::now());
                    }
                    None => break,
                },
                _ = wait_for(deadline) => {
                    if self.machine.on_timer(Instant::now()) {
                        tracing::debug!("Quiet window elapsed, rebuilding");
                        if !self.rebuild(&mut events).await {
                            break;
                        }
                    }
                }
            }
            if self.machine.state() != before {
                tracing::debug!("Monitor: {:?} -> {:?}", before, self.machine.state());
            }
        }

        tracing::debug!("Watch channel closed, monitor stopping");
    }

    /// Run one build while still recording events. Returns whether the
    /// event channel is still open.
    async fn rebuild(&mut self, events: &mut mpsc::Receiver<WatchEvent>) -> bool {
        let builder = Arc::clone(&self.builder);
        let mut task = tokio::task::spawn_blocking(move || builder.rebuild());
        let mut open = true;

        let outcome = loop {
            tokio::select! {
                result = &mut task => break result,
                event = events.recv(), if open => match event {
                    Some(_) => self.machine.on_event(Instant::now()),
                    None => open = false,
                },
            }
        };

        match outcome {
            Ok(Ok(snapshot)) => {
                self.machine.build_succeeded();
                self.handle.publish(snapshot).await;
                tracing::info!("Documentation updated");
                self.machine.settle();
            }
            Ok(Err(e)) => {
                tracing::error!("Rebuild failed: {}", e);
                self.machine.build_failed();
            }
            Err(e) => {
                tracing::error!("Rebuild task failed: {}", e);
                self.machine.build_failed();
            }
        }

        open
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
