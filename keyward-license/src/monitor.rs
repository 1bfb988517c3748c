//! Heartbeat monitoring for machines and processes.
//!
//! [`Monitor::monitor`] pings once inline, so misconfiguration surfaces to
//! the caller directly. Subsequent pings run on a background task every
//! `interval - margin` until the handle is cancelled, the entity is gone
//! server-side, or (under [`PingFailurePolicy::Stop`]) a ping fails.

use crate::error::{LicenseError, LicenseResult};
use crate::resource::{HeartbeatStatus, Machine, Process, ProcessStatus};
use crate::transport::{Method, Transport};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Default heartbeat window for machines that do not report one.
pub const DEFAULT_HEARTBEAT_DURATION: Duration = Duration::from_secs(600);

/// What the loop does when a non-terminal ping fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PingFailurePolicy {
    /// Report the failure and stop.
    #[default]
    Stop,
    /// Report the failure and keep pinging.
    Continue,
}

/// Default number of unread events a handle holds.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Monitor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Subtracted from the heartbeat interval so pings land early.
    pub margin: Duration,
    /// Handling of failed pings after the first.
    pub failure_policy: PingFailurePolicy,
    /// Unread events kept for the handle, at least 2. One slot is held
    /// back for the final `Stopped`; other events past the limit are
    /// dropped until the caller reads.
    pub event_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            margin: Duration::from_secs(30),
            failure_policy: PingFailurePolicy::Stop,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl MonitorConfig {
    /// Delay between pings for a heartbeat `interval`, floored at 1 s.
    #[must_use]
    pub fn period(&self, interval: Duration) -> Duration {
        interval
            .saturating_sub(self.margin)
            .max(Duration::from_secs(1))
    }
}

/// A machine or process that sends heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MonitoredEntity {
    /// A machine id.
    Machine(String),
    /// A process id.
    Process(String),
}

impl MonitoredEntity {
    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Machine(id) | Self::Process(id) => id,
        }
    }

    fn ping_path(&self) -> String {
        match self {
            Self::Machine(id) => format!("machines/{id}/actions/ping"),
            Self::Process(id) => format!("processes/{id}/actions/ping"),
        }
    }

    fn not_found(&self) -> LicenseError {
        match self {
            Self::Machine(_) => LicenseError::MachineNotFound,
            Self::Process(_) => LicenseError::ProcessNotFound,
        }
    }
}

impl fmt::Display for MonitoredEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Machine(id) => write!(f, "machine {id}"),
            Self::Process(id) => write!(f, "process {id}"),
        }
    }
}

/// Why a monitor loop ended.
#[derive(Debug)]
pub enum StopReason {
    /// The handle was cancelled or dropped.
    Cancelled,
    /// The entity is gone or dead server-side.
    Terminal(LicenseError),
    /// A ping failed under [`PingFailurePolicy::Stop`].
    Failed(LicenseError),
}

/// Reported by a running monitor.
#[derive(Debug)]
pub enum HeartbeatEvent {
    /// A ping succeeded.
    Alive(HeartbeatStatus),
    /// A ping failed and the loop keeps going.
    PingFailed(LicenseError),
    /// The loop ended. Always the last event.
    Stopped(StopReason),
}

/// Monitor failures.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The inline first ping failed; no task was spawned.
    #[error("first heartbeat ping failed: {0}")]
    FirstPing(#[source] LicenseError),

    /// Creating the process to monitor failed.
    #[error("process creation failed: {0}")]
    Create(#[source] LicenseError),

    /// The background task panicked or was aborted.
    #[error("monitor task failed: {0}")]
    Task(String),
}

/// Sends heartbeat pings through a transport.
#[derive(Clone)]
pub struct Monitor {
    transport: Arc<dyn Transport>,
    config: MonitorConfig,
}

impl Monitor {
    /// Creates a monitor with the default margin and failure policy.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, MonitorConfig::default())
    }

    /// Creates a monitor with explicit tuning.
    pub fn with_config(transport: Arc<dyn Transport>, config: MonitorConfig) -> Self {
        Self { transport, config }
    }

    /// Returns the tuning.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Sends one heartbeat ping.
    ///
    /// # Errors
    ///
    /// `MachineNotFound`/`ProcessNotFound` on 404, `HeartbeatDead` when
    /// the server reports the entity dead, or any transport error.
    pub async fn ping(&self, entity: &MonitoredEntity) -> LicenseResult<HeartbeatStatus> {
        ping(self.transport.as_ref(), entity).await
    }

    /// Pings `entity` now, then every `interval - margin` in the
    /// background.
    ///
    /// # Errors
    ///
    /// `MonitorError::FirstPing` if the inline ping fails.
    pub async fn monitor(
        &self,
        entity: MonitoredEntity,
        interval: Duration,
    ) -> Result<MonitorHandle, MonitorError> {
        let status = self
            .ping(&entity)
            .await
            .inspect_err(|e| warn!(%entity, error = %e, "first heartbeat ping failed"))
            .map_err(MonitorError::FirstPing)?;

        let period = self.config.period(interval);
        info!(%entity, period_secs = period.as_secs(), "heartbeat monitor started");

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer.max(2));
        emit(&event_tx, &entity, HeartbeatEvent::Alive(status));

        let task = tokio::spawn(run_loop(
            Arc::clone(&self.transport),
            entity,
            period,
            self.config.failure_policy,
            cancel_rx,
            event_tx,
        ));

        Ok(MonitorHandle {
            cancel: cancel_tx,
            events: event_rx,
            task,
        })
    }

    /// Monitors a machine using its heartbeat duration.
    pub async fn monitor_machine(&self, machine: &Machine) -> Result<MonitorHandle, MonitorError> {
        let interval = machine
            .heartbeat_duration
            .map_or(DEFAULT_HEARTBEAT_DURATION, Duration::from_secs);
        self.monitor(MonitoredEntity::Machine(machine.id.clone()), interval)
            .await
    }

    /// Monitors a process using its heartbeat interval.
    pub async fn monitor_process(&self, process: &Process) -> Result<MonitorHandle, MonitorError> {
        let interval = match process.interval {
            0 => DEFAULT_HEARTBEAT_DURATION,
            secs => Duration::from_secs(secs),
        };
        self.monitor(MonitoredEntity::Process(process.id.clone()), interval)
            .await
    }
}

/// Controls a running monitor loop.
///
/// Dropping the handle cancels the loop.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: watch::Sender<bool>,
    events: mpsc::Receiver<HeartbeatEvent>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Asks the loop to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Waits for the next event. `None` once the loop has ended and all
    /// events were read.
    pub async fn next_event(&mut self) -> Option<HeartbeatEvent> {
        self.events.recv().await
    }

    /// Returns true once the loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop to end without cancelling it.
    ///
    /// # Errors
    ///
    /// `MonitorError::Task` if the task panicked.
    pub async fn join(self) -> Result<(), MonitorError> {
        let Self { cancel, task, .. } = self;
        let result = task.await.map_err(|e| MonitorError::Task(e.to_string()));
        drop(cancel);
        result
    }
}

async fn ping(transport: &dyn Transport, entity: &MonitoredEntity) -> LicenseResult<HeartbeatStatus> {
    let response = match transport.call(Method::Post, &entity.ping_path(), None).await {
        Ok(response) => response,
        Err(LicenseError::NotFound) => return Err(entity.not_found()),
        Err(e) => return Err(e),
    };

    let status = match entity {
        MonitoredEntity::Machine(_) => response.primary::<Machine>()?.heartbeat_status,
        MonitoredEntity::Process(_) => match response.primary::<Process>()?.status {
            ProcessStatus::Alive => HeartbeatStatus::Alive,
            ProcessStatus::Dead => HeartbeatStatus::Dead,
            ProcessStatus::Unknown => HeartbeatStatus::Unknown,
        },
    };

    if status == HeartbeatStatus::Dead {
        return Err(LicenseError::HeartbeatDead);
    }

    debug!(%entity, ?status, "heartbeat ping ok");
    Ok(status)
}

async fn run_loop(
    transport: Arc<dyn Transport>,
    entity: MonitoredEntity,
    period: Duration,
    policy: PingFailurePolicy,
    mut cancel_rx: watch::Receiver<bool>,
    event_tx: mpsc::Sender<HeartbeatEvent>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break StopReason::Cancelled;
                }
            }
            _ = ticker.tick() => {
                match ping(transport.as_ref(), &entity).await {
                    Ok(status) => emit(&event_tx, &entity, HeartbeatEvent::Alive(status)),
                    Err(e) if e.is_terminal_for_monitor() => {
                        warn!(%entity, error = %e, "heartbeat monitor terminated");
                        break StopReason::Terminal(e);
                    }
                    Err(e) => match policy {
                        PingFailurePolicy::Stop => {
                            warn!(%entity, error = %e, "heartbeat ping failed, stopping");
                            break StopReason::Failed(e);
                        }
                        PingFailurePolicy::Continue => {
                            warn!(%entity, error = %e, "heartbeat ping failed");
                            emit(&event_tx, &entity, HeartbeatEvent::PingFailed(e));
                        }
                    },
                }
            }
        }
    };

    info!(%entity, ?reason, "heartbeat monitor stopped");
    if event_tx.try_send(HeartbeatEvent::Stopped(reason)).is_err() {
        debug!(%entity, "handle gone, stop event not delivered");
    }
}

/// Queues a non-final event, keeping the last slot for `Stopped`.
fn emit(event_tx: &mpsc::Sender<HeartbeatEvent>, entity: &MonitoredEntity, event: HeartbeatEvent) {
    if event_tx.is_closed() {
        debug!(%entity, ?event, "handle gone, event dropped");
    } else if event_tx.capacity() <= 1 {
        debug!(%entity, ?event, "event buffer full, event dropped");
    } else if let Err(e) = event_tx.try_send(event) {
        debug!(%entity, error = %e, "event dropped");
    }
}

impl Machine {
    /// Creates a process on this machine and monitors it.
    ///
    /// # Errors
    ///
    /// `MonitorError::Create` if the process cannot be created (for
    /// example `ProcessLimitExceeded`), or the first-ping error.
    pub async fn spawn(
        &self,
        monitor: &Monitor,
        pid: &str,
    ) -> Result<(Process, MonitorHandle), MonitorError> {
        let body = json!({
            "data": {
                "type": "processes",
                "attributes": { "pid": pid },
                "relationships": {
                    "machine": { "data": { "type": "machines", "id": self.id } }
                }
            }
        });

        let process: Process = monitor
            .transport
            .call(Method::Post, "processes", Some(body))
            .await
            .and_then(|response| response.primary())
            .map_err(MonitorError::Create)?;
        debug!(machine = %self.id, process = %process.id, "process created");

        let handle = monitor.monitor_process(&process).await?;
        Ok((process, handle))
    }
}
