// ── Device actor ──
//
// Each device runs as one task that owns its `PollMachine`. The task reacts
// to cancellation, inbound messages, its polling ticker and (for devices
// that stream) the push channel, in that priority order. Because the task
// is the machine's only owner, a command and a poll can never overlap.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use hablink_api::PushChannel;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{Availability, ChannelState, DeviceStatus, Publisher};
use crate::clock::Clock;
use crate::command::{HostCommand, PendingCommand};
use crate::config::{DeviceConfig, DeviceKind};
use crate::error::CoreError;
use crate::machine::{DispatchReport, MachineState, PollMachine, PollReport};
use crate::vendor::Vendor;

const COMMAND_CHANNEL_SIZE: usize = 64;
const MIN_REFRESH: Duration = Duration::from_secs(1);
/// Ceiling for the ticker's delays, so deadlines never overflow the clock.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 3600);

// ── Messages ─────────────────────────────────────────────────────────

enum DeviceMessage {
    Command {
        command: PendingCommand,
        reply: oneshot::Sender<Result<DispatchReport, CoreError>>,
    },
    /// Poll now; follow-up polls carry no reply.
    Poll {
        reply: Option<oneshot::Sender<PollReport>>,
    },
}

// ── Snapshot access ──────────────────────────────────────────────────

/// Type-erased read access to a machine's snapshot slot.
trait SnapshotSource: Send + Sync {
    fn channels(&self) -> Option<Vec<(String, ChannelState)>>;
}

impl<S: DeviceStatus> SnapshotSource for ArcSwapOption<S> {
    fn channels(&self) -> Option<Vec<(String, ChannelState)>> {
        self.load_full().map(|status| status.channels())
    }
}

// ── DeviceHandle ─────────────────────────────────────────────────────

/// Handle to a running device actor. Cheap to clone.
#[derive(Clone)]
pub struct DeviceHandle {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    id: String,
    label: String,
    kind: DeviceKind,
    tx: mpsc::Sender<DeviceMessage>,
    cancel: CancellationToken,
    state: watch::Receiver<MachineState>,
    availability: watch::Receiver<Option<Availability>>,
    snapshot: Arc<dyn SnapshotSource>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// The last handle going away stops the actor even without `dispose`.
impl Drop for DeviceInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl DeviceHandle {
    /// Start the actor for `vendor`. The first poll happens after
    /// `config.initial_delay`, then every `config.refresh`.
    pub fn spawn<V: Vendor, C: Clock>(
        config: &DeviceConfig,
        vendor: V,
        publisher: Arc<dyn Publisher>,
        clock: C,
    ) -> Self {
        let machine = PollMachine::new(config.id.clone(), vendor, clock, publisher)
            .with_control_wait(config.control_wait_attempts, Duration::from_secs(1));
        let state = machine.subscribe_state();
        let availability = machine.subscribe_availability();
        let snapshot: Arc<dyn SnapshotSource> = machine.snapshot_handle();

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let actor = DeviceActor {
            machine,
            rx,
            tx: tx.clone(),
            cancel: cancel.clone(),
            refresh: config.refresh,
            initial_delay: config.initial_delay,
            push_timeout: config.timeout,
            push: None,
        };
        let task = tokio::spawn(actor.run());

        Self {
            inner: Arc::new(DeviceInner {
                id: config.id.clone(),
                label: config.display_name().to_owned(),
                kind: config.kind(),
                tx,
                cancel,
                state,
                availability,
                snapshot,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn kind(&self) -> DeviceKind {
        self.inner.kind
    }

    pub fn state(&self) -> MachineState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<MachineState> {
        self.inner.state.clone()
    }

    pub fn availability(&self) -> Option<Availability> {
        self.inner.availability.borrow().clone()
    }

    /// Channels of the latest snapshot, if any poll has succeeded.
    pub fn channels(&self) -> Option<Vec<(String, ChannelState)>> {
        self.inner.snapshot.channels()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Send a host command. `Refresh` polls immediately; anything else is
    /// translated by the vendor and dispatched.
    pub async fn handle_command(
        &self,
        channel: impl Into<String>,
        command: HostCommand,
    ) -> Result<DispatchReport, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(DeviceMessage::Command {
            command: PendingCommand::new(channel, command),
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.disposed())?
    }

    /// Poll now and wait for the result.
    pub async fn poll_now(&self) -> Result<PollReport, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(DeviceMessage::Poll { reply: Some(reply) }).await?;
        rx.await.map_err(|_| self.disposed())
    }

    /// Stop the actor: cancel the ticker and follow-ups, log out, and wait
    /// for the task to finish. Idempotent.
    pub async fn dispose(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(device = %self.inner.id, error = %e, "device task ended abnormally");
            }
        }
    }

    /// Signal the actor to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    async fn send(&self, message: DeviceMessage) -> Result<(), CoreError> {
        if self.is_disposed() {
            return Err(self.disposed());
        }
        self.inner.tx.send(message).await.map_err(|_| self.disposed())
    }

    fn disposed(&self) -> CoreError {
        CoreError::DeviceDisposed {
            device: self.inner.id.clone(),
        }
    }
}

// ── Actor task ───────────────────────────────────────────────────────

struct DeviceActor<V: Vendor, C: Clock> {
    machine: PollMachine<V, C>,
    rx: mpsc::Receiver<DeviceMessage>,
    /// Loopback sender for follow-up polls.
    tx: mpsc::Sender<DeviceMessage>,
    cancel: CancellationToken,
    refresh: Duration,
    initial_delay: Duration,
    /// Bound on the push handshake.
    push_timeout: Duration,
    push: Option<PushChannel>,
}

impl<V: Vendor, C: Clock> DeviceActor<V, C> {
    async fn run(mut self) {
        let period = self.refresh.clamp(MIN_REFRESH, MAX_DELAY);
        let now = Instant::now();
        let start = now + self.initial_delay.min(MAX_DELAY);
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(device = %self.machine.device(), "device started");

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                message = self.rx.recv() => {
                    let Some(message) = message else { break };
                    self.handle(message).await;
                }
                _ = ticker.tick() => {
                    let report = self.machine.poll().await;
                    debug!(device = %self.machine.device(), outcome = %report.outcome, "poll");
                    self.ensure_push().await;
                }
                text = next_push(self.push.as_mut()) => match text {
                    Some(text) => {
                        self.machine.accept_push(&text);
                    }
                    None => {
                        debug!(device = %self.machine.device(), "push channel closed");
                        self.push = None;
                    }
                },
            }
        }

        if let Some(push) = self.push.take() {
            push.close();
        }
        self.machine.dispose().await;
        info!(device = %self.machine.device(), "device stopped");
    }

    async fn handle(&mut self, message: DeviceMessage) {
        match message {
            DeviceMessage::Command { command, reply } => {
                let result = self.execute(command).await;
                if let Ok(report) = &result {
                    self.schedule_follow_ups(&report.follow_ups);
                }
                let _ = reply.send(result);
            }
            DeviceMessage::Poll { reply } => {
                let report = self.machine.poll().await;
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
        }
    }

    async fn execute(&mut self, command: PendingCommand) -> Result<DispatchReport, CoreError> {
        if command.is_refresh() {
            self.machine.poll().await;
            return Ok(DispatchReport::default());
        }
        let Some(cmd) = self
            .machine
            .vendor()
            .translate(&command.channel, &command.command)
        else {
            return Err(CoreError::UnsupportedCommand {
                channel: command.channel,
                command: command.command.to_string(),
            });
        };
        info!(
            device = %self.machine.device(),
            channel = %command.channel,
            command = %command.command,
            "dispatching command"
        );
        self.machine.dispatch_command(cmd).await
    }

    /// Confirmation polls run as child tasks that die with the device.
    fn schedule_follow_ups(&self, delays: &[Duration]) {
        for &delay in delays {
            let tx = self.tx.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(delay) => {
                        let _ = tx.send(DeviceMessage::Poll { reply: None }).await;
                    }
                }
            });
        }
    }

    /// (Re)connect the push channel when it is down and the device is online.
    async fn ensure_push(&mut self) {
        let Some(url) = self.machine.push_url() else {
            return;
        };
        if self.push.as_ref().is_some_and(PushChannel::is_open) {
            return;
        }
        if !self
            .machine
            .availability()
            .is_some_and(|a| a.is_online())
        {
            return;
        }
        match PushChannel::connect(url, self.cancel.child_token(), self.push_timeout).await {
            Ok(channel) => self.push = Some(channel),
            Err(e) => {
                debug!(device = %self.machine.device(), error = %e, "push connect failed");
                self.push = None;
            }
        }
    }
}

async fn next_push(push: Option<&mut PushChannel>) -> Option<String> {
    match push {
        Some(channel) => channel.recv().await.map(|m| m.text),
        None => std::future::pending().await,
    }
}
