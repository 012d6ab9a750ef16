// ── Poll/retry state machine ──
//
// One `PollMachine` per device. It owns the vendor session, the latest
// snapshot and the failure counter, and turns every status request into
// exactly one transition. The device actor is its only caller, so polls and
// commands for one device never overlap.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{Availability, DeviceStatus, Publisher, StatusDetail};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::outcome::{ControlResult, OutcomeKind, PollOutcome};
use crate::session::SessionStore;
use crate::vendor::Vendor;

const CONTROL_WAIT_INTERVAL: Duration = Duration::from_secs(1);

// ── MachineState ─────────────────────────────────────────────────────

/// Lifecycle state, observable through [`PollMachine::subscribe_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MachineState {
    LoggedOut,
    LoggingIn,
    Polling,
    Publishing,
    Reauthenticating,
    /// Device busy or in service; the next tick tries again.
    Backoff,
    Disposed,
}

// ── Reports ──────────────────────────────────────────────────────────

/// Result of one [`PollMachine::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub outcome: OutcomeKind,
    /// A login happened during this poll.
    pub relogged_in: bool,
}

/// Result of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Delays of the confirmation polls to schedule.
    pub follow_ups: Vec<Duration>,
}

// ── PollMachine ──────────────────────────────────────────────────────

pub struct PollMachine<V: Vendor, C: Clock> {
    device: String,
    vendor: V,
    clock: C,
    publisher: Arc<dyn Publisher>,
    session: SessionStore,
    snapshot: Arc<ArcSwapOption<V::Status>>,
    failures: u32,
    state: watch::Sender<MachineState>,
    availability: watch::Sender<Option<Availability>>,
    control_wait_attempts: u32,
    control_wait_interval: Duration,
}

impl<V: Vendor, C: Clock> PollMachine<V, C> {
    pub fn new(
        device: impl Into<String>,
        vendor: V,
        clock: C,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let (state, _) = watch::channel(MachineState::LoggedOut);
        let (availability, _) = watch::channel(None);
        Self {
            device: device.into(),
            vendor,
            clock,
            publisher,
            session: SessionStore::new(),
            snapshot: Arc::new(ArcSwapOption::empty()),
            failures: 0,
            state,
            availability,
            control_wait_attempts: crate::config::DEFAULT_CONTROL_WAIT_ATTEMPTS,
            control_wait_interval: CONTROL_WAIT_INTERVAL,
        }
    }

    /// How often, and how far apart, to re-poll while control is disabled.
    pub fn with_control_wait(mut self, attempts: u32, interval: Duration) -> Self {
        self.control_wait_attempts = attempts;
        self.control_wait_interval = interval;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn vendor(&self) -> &V {
        &self.vendor
    }

    pub fn vendor_mut(&mut self) -> &mut V {
        &mut self.vendor
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn state(&self) -> MachineState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<MachineState> {
        self.state.subscribe()
    }

    /// Last published availability; `None` before the first poll.
    pub fn availability(&self) -> Option<Availability> {
        self.availability.borrow().clone()
    }

    pub fn subscribe_availability(&self) -> watch::Receiver<Option<Availability>> {
        self.availability.subscribe()
    }

    /// Consecutive failed polls since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn snapshot(&self) -> Option<Arc<V::Status>> {
        self.snapshot.load_full()
    }

    /// Shared handle to the snapshot slot, for readers outside the actor.
    pub fn snapshot_handle(&self) -> Arc<ArcSwapOption<V::Status>> {
        Arc::clone(&self.snapshot)
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Run one poll cycle.
    pub async fn poll(&mut self) -> PollReport {
        if self.session.roll_hour(self.clock.hour()) {
            info!(device = %self.device, "hour boundary, renewing session");
        }

        let mut relogged_in = false;
        if self.session.is_valid() {
            self.set_state(MachineState::Polling);
        } else {
            if let Err(outcome) = self.login().await {
                return PollReport {
                    outcome,
                    relogged_in: false,
                };
            }
            relogged_in = true;
        }

        let mut outcome = self.fetch().await;
        if matches!(outcome, PollOutcome::SessionExpired) {
            self.session.invalidate("status request rejected the session");
            self.set_state(MachineState::Reauthenticating);
            if let Err(kind) = self.login().await {
                return PollReport {
                    outcome: kind,
                    relogged_in,
                };
            }
            relogged_in = true;
            outcome = self.fetch().await;
        }

        let kind = outcome.kind();
        self.apply(outcome);
        PollReport {
            outcome: kind,
            relogged_in,
        }
    }

    async fn login(&mut self) -> Result<(), OutcomeKind> {
        self.set_state(MachineState::LoggingIn);
        match self.vendor.login().await {
            Ok(token) => {
                let hour = self.clock.hour();
                self.session.establish(token, hour);
                info!(device = %self.device, vendor = self.vendor.kind(), "logged in");
                Ok(())
            }
            Err(e) => {
                let unreachable = e.is_unreachable();
                warn!(device = %self.device, error = %e, unreachable, "login failed");
                self.set_state(MachineState::LoggedOut);
                self.failures += 1;
                // Only a rejection of the credentials themselves needs the user.
                let detail = if e.is_auth_expired() && !e.is_transient() && !unreachable {
                    StatusDetail::ConfigurationError
                } else {
                    StatusDetail::CommunicationError
                };
                self.set_availability(Availability::offline(detail, e.to_string()));
                Err(PollOutcome::<()>::from_error(&e).kind())
            }
        }
    }

    async fn fetch(&mut self) -> PollOutcome<V::Status> {
        let Some(token) = self.session.token() else {
            return PollOutcome::SessionExpired;
        };
        match self.vendor.fetch_status(token).await {
            Ok(raw) => self.vendor.parse_status(raw),
            Err(e) => {
                debug!(device = %self.device, error = %e, "status request failed");
                PollOutcome::from_error(&e)
            }
        }
    }

    fn apply(&mut self, outcome: PollOutcome<V::Status>) {
        match outcome {
            PollOutcome::Ok(status) => {
                self.set_state(MachineState::Publishing);
                self.publish_snapshot(status);
                self.failures = 0;
                self.set_availability(Availability::Online);
                self.set_state(MachineState::Polling);
            }
            PollOutcome::Busy => {
                warn!(device = %self.device, "device busy, another client is in control");
                self.set_state(MachineState::Backoff);
            }
            PollOutcome::InService => {
                warn!(device = %self.device, "device is in service mode");
                self.set_state(MachineState::Backoff);
            }
            PollOutcome::SessionExpired => {
                self.session.invalidate("session rejected after relogin");
                self.set_state(MachineState::LoggedOut);
            }
            PollOutcome::TransportError(reason) | PollOutcome::ParseError(reason) => {
                self.failures += 1;
                warn!(device = %self.device, failures = self.failures, %reason, "poll failed");
                self.set_availability(Availability::offline(
                    StatusDetail::CommunicationError,
                    reason,
                ));
                self.set_state(MachineState::Polling);
            }
        }
    }

    /// Publish a status pushed by the device outside the poll cycle.
    ///
    /// Returns `false` when the text does not decode.
    pub fn accept_push(&mut self, text: &str) -> bool {
        let Some(status) = self.vendor.parse_push(text) else {
            debug!(device = %self.device, "ignoring undecodable push message");
            return false;
        };
        self.publish_snapshot(status);
        self.failures = 0;
        self.set_availability(Availability::Online);
        true
    }

    pub fn push_url(&self) -> Option<url::Url> {
        self.vendor.push_url()
    }

    fn publish_snapshot(&self, status: V::Status) {
        let status = Arc::new(status);
        self.snapshot.store(Some(Arc::clone(&status)));
        for (channel, value) in status.channels() {
            self.publisher.publish_state(&self.device, &channel, value);
        }
    }

    fn set_state(&self, state: MachineState) {
        self.state.send_replace(state);
    }

    /// Publish `next` when it differs in kind from the current availability.
    fn set_availability(&self, next: Availability) {
        let changed = match (self.availability.borrow().as_ref(), &next) {
            (Some(Availability::Online), Availability::Online) => false,
            (
                Some(Availability::Offline { detail: prev, .. }),
                Availability::Offline { detail, .. },
            ) => prev != detail,
            _ => true,
        };
        if changed {
            debug!(device = %self.device, availability = %next, "availability changed");
            self.publisher.publish_status(&self.device, next.clone());
            self.availability.send_replace(Some(next));
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Carry out one vendor command.
    pub async fn dispatch_command(
        &mut self,
        cmd: V::Command,
    ) -> Result<DispatchReport, CoreError> {
        if !self.session.is_valid() && self.login().await.is_err() {
            return Err(CoreError::NotLoggedIn {
                device: self.device.clone(),
            });
        }

        self.ensure_reachable().await?;

        let mut attempts = 0;
        while !self.control_ready() {
            if attempts >= self.control_wait_attempts {
                return Err(CoreError::DeviceUnavailable {
                    device: self.device.clone(),
                    reason: format!("control still disabled after {attempts} attempts"),
                });
            }
            attempts += 1;
            debug!(device = %self.device, attempts, "waiting for control to be enabled");
            tokio::time::sleep(self.control_wait_interval).await;
            self.ensure_reachable().await?;
        }

        let Some(token) = self.session.token() else {
            return Err(CoreError::NotLoggedIn {
                device: self.device.clone(),
            });
        };
        debug!(device = %self.device, command = ?cmd, "sending command");
        let mut result = self.vendor.send_control(token, &cmd).await?;
        if result == ControlResult::InputRequired {
            debug!(device = %self.device, "device asked for the user code");
            result = self.vendor.provide_input(token, &cmd).await?;
        }
        self.vendor.after_control(&cmd, &result);

        match result {
            ControlResult::Accepted(confirm) => Ok(DispatchReport {
                follow_ups: confirm.follow_ups(),
            }),
            ControlResult::SessionExpired => {
                self.session.invalidate("command rejected the session");
                Err(CoreError::NotLoggedIn {
                    device: self.device.clone(),
                })
            }
            ControlResult::InputRequired => {
                self.reject(None, "device asked for input twice".into())
                    .await
            }
            ControlResult::Rejected { code, reason } => self.reject(code, reason).await,
        }
    }

    /// Poll once; anything but a good status makes the device unavailable.
    async fn ensure_reachable(&mut self) -> Result<(), CoreError> {
        let report = self.poll().await;
        if report.outcome == OutcomeKind::Ok {
            return Ok(());
        }
        Err(CoreError::DeviceUnavailable {
            device: self.device.clone(),
            reason: format!("status poll ended with {}", report.outcome),
        })
    }

    fn control_ready(&self) -> bool {
        self.snapshot
            .load_full()
            .is_none_or(|status| self.vendor.control_ready(&status))
    }

    async fn reject(
        &mut self,
        code: Option<i64>,
        reason: String,
    ) -> Result<DispatchReport, CoreError> {
        warn!(device = %self.device, ?code, %reason, "command rejected, logging out");
        self.logout().await;
        Err(CoreError::CommandRejected { code, reason })
    }

    async fn logout(&mut self) {
        if self.session.is_valid() {
            if let Err(e) = self.vendor.logout().await {
                debug!(device = %self.device, error = %e, "logout failed");
            }
        }
        self.session.invalidate("logout");
        self.set_state(MachineState::LoggedOut);
    }

    /// Final teardown: log out and report the device as gone.
    pub async fn dispose(&mut self) {
        self.logout().await;
        self.set_state(MachineState::Disposed);
        self.publisher
            .publish_status(&self.device, Availability::offline(StatusDetail::None, "disposed"));
        self.availability
            .send_replace(Some(Availability::offline(StatusDetail::None, "disposed")));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::VecDeque;

    use hablink_api::Error;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast;

    use super::*;
    use crate::channel::{BroadcastPublisher, ChannelState, Update};
    use crate::clock::ManualClock;
    use crate::command::HostCommand;
    use crate::outcome::Confirm;

    // ── Scripted vendor ──────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq)]
    struct FakeStatus {
        value: u8,
        ready: bool,
    }

    impl DeviceStatus for FakeStatus {
        fn channels(&self) -> Vec<(String, ChannelState)> {
            vec![("value".into(), ChannelState::Percent(self.value))]
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Ok(u8),
        NotReady,
        Busy,
        InService,
        Expired,
        Transport,
        Garbage,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Login,
        Status(String),
        Control(String),
        Input,
        Logout,
    }

    #[derive(Default)]
    struct FakeVendor {
        steps: VecDeque<Step>,
        controls: VecDeque<ControlResult>,
        inputs: VecDeque<ControlResult>,
        login_error: Option<fn() -> Error>,
        logins: u32,
        calls: Vec<Call>,
    }

    impl FakeVendor {
        fn script(steps: &[Step]) -> Self {
            Self {
                steps: steps.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn logins(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Login).count()
        }
    }

    impl Vendor for FakeVendor {
        type Status = FakeStatus;
        type Command = String;
        type Raw = Step;

        fn kind(&self) -> &'static str {
            "fake"
        }

        async fn login(&mut self) -> Result<String, Error> {
            self.calls.push(Call::Login);
            if let Some(make) = self.login_error {
                return Err(make());
            }
            self.logins += 1;
            Ok(format!("tok-{}", self.logins))
        }

        async fn fetch_status(&mut self, token: &str) -> Result<Step, Error> {
            self.calls.push(Call::Status(token.to_owned()));
            match self.steps.pop_front().unwrap_or(Step::Ok(0)) {
                Step::Transport => Err(Error::Timeout { timeout_secs: 10 }),
                Step::Expired => Err(Error::SessionExpired),
                step => Ok(step),
            }
        }

        fn parse_status(&self, raw: Step) -> PollOutcome<FakeStatus> {
            match raw {
                Step::Ok(value) => PollOutcome::Ok(FakeStatus { value, ready: true }),
                Step::NotReady => PollOutcome::Ok(FakeStatus {
                    value: 0,
                    ready: false,
                }),
                Step::Busy => PollOutcome::Busy,
                Step::InService => PollOutcome::InService,
                Step::Garbage => PollOutcome::ParseError("unexpected body".into()),
                Step::Expired | Step::Transport => unreachable!("handled in fetch_status"),
            }
        }

        async fn send_control(
            &mut self,
            _token: &str,
            cmd: &String,
        ) -> Result<ControlResult, Error> {
            self.calls.push(Call::Control(cmd.clone()));
            Ok(self
                .controls
                .pop_front()
                .unwrap_or(ControlResult::Accepted(Confirm::None)))
        }

        async fn provide_input(
            &mut self,
            _token: &str,
            _cmd: &String,
        ) -> Result<ControlResult, Error> {
            self.calls.push(Call::Input);
            Ok(self
                .inputs
                .pop_front()
                .unwrap_or(ControlResult::Accepted(Confirm::Twice)))
        }

        async fn logout(&mut self) -> Result<(), Error> {
            self.calls.push(Call::Logout);
            Ok(())
        }

        fn translate(&self, channel: &str, _cmd: &HostCommand) -> Option<String> {
            Some(channel.to_owned())
        }

        fn control_ready(&self, status: &FakeStatus) -> bool {
            status.ready
        }
    }

    struct Harness {
        machine: PollMachine<FakeVendor, ManualClock>,
        clock: ManualClock,
        updates: broadcast::Receiver<Update>,
    }

    fn harness(vendor: FakeVendor) -> Harness {
        let publisher = BroadcastPublisher::new();
        let updates = publisher.subscribe();
        let clock = ManualClock::new(10);
        let machine = PollMachine::new("dev", vendor, clock.clone(), Arc::new(publisher))
            .with_control_wait(3, Duration::ZERO);
        Harness {
            machine,
            clock,
            updates,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<Update>) -> Vec<Update> {
        let mut out = Vec::new();
        while let Ok(update) = rx.try_recv() {
            out.push(update);
        }
        out
    }

    fn statuses(updates: &[Update]) -> Vec<&Availability> {
        updates
            .iter()
            .filter_map(|u| match u {
                Update::Status { availability, .. } => Some(availability),
                Update::State { .. } => None,
            })
            .collect()
    }

    // ── Polling ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_poll_logs_in_and_publishes() {
        let mut h = harness(FakeVendor::script(&[Step::Ok(40)]));

        let report = h.machine.poll().await;
        assert_eq!(report.outcome, OutcomeKind::Ok);
        assert!(report.relogged_in);
        assert_eq!(h.machine.state(), MachineState::Polling);
        assert_eq!(h.machine.snapshot().unwrap().value, 40);

        let updates = drain(&mut h.updates);
        assert_eq!(
            updates,
            vec![
                Update::State {
                    device: "dev".into(),
                    channel: "value".into(),
                    value: ChannelState::Percent(40),
                },
                Update::Status {
                    device: "dev".into(),
                    availability: Availability::Online,
                },
            ]
        );
    }

    #[tokio::test]
    async fn online_is_published_only_on_transition() {
        let mut h = harness(FakeVendor::script(&[Step::Ok(1), Step::Ok(2)]));
        h.machine.poll().await;
        h.machine.poll().await;
        let updates = drain(&mut h.updates);
        assert_eq!(statuses(&updates).len(), 1);
    }

    #[tokio::test]
    async fn invalidated_session_is_never_reused() {
        let mut h = harness(FakeVendor::script(&[Step::Ok(1), Step::Expired, Step::Ok(2)]));
        h.machine.poll().await;
        let report = h.machine.poll().await;

        assert_eq!(report.outcome, OutcomeKind::Ok);
        assert!(report.relogged_in);
        assert_eq!(
            h.machine.vendor().calls,
            vec![
                Call::Login,
                Call::Status("tok-1".into()),
                Call::Status("tok-1".into()),
                Call::Login,
                Call::Status("tok-2".into()),
            ]
        );
    }

    #[tokio::test]
    async fn busy_and_in_service_leave_session_alone() {
        let mut h = harness(FakeVendor::script(&[Step::Ok(5), Step::Busy, Step::InService]));
        h.machine.poll().await;
        drain(&mut h.updates);

        for expected in [OutcomeKind::Busy, OutcomeKind::InService] {
            let report = h.machine.poll().await;
            assert_eq!(report.outcome, expected);
            assert!(!report.relogged_in);
            assert_eq!(h.machine.state(), MachineState::Backoff);
            assert!(h.machine.session().is_valid());
        }

        assert!(drain(&mut h.updates).is_empty());
        assert_eq!(h.machine.vendor().logins(), 1);
        assert_eq!(h.machine.snapshot().unwrap().value, 5);
    }

    #[tokio::test]
    async fn backoff_returns_to_polling_on_next_tick() {
        let mut h = harness(FakeVendor::script(&[Step::Busy, Step::Ok(3)]));
        h.machine.poll().await;
        assert_eq!(h.machine.state(), MachineState::Backoff);
        h.machine.poll().await;
        assert_eq!(h.machine.state(), MachineState::Polling);
    }

    #[tokio::test]
    async fn hour_boundary_renews_session_before_status() {
        let mut h = harness(FakeVendor::script(&[Step::Ok(1), Step::Ok(2), Step::Ok(3)]));
        h.machine.poll().await;
        h.machine.poll().await;
        assert_eq!(h.machine.vendor().logins(), 1);

        h.clock.advance_hour();
        let report = h.machine.poll().await;
        assert!(report.relogged_in);
        assert_eq!(h.machine.session().created_at_hour(), Some(11));

        let calls = &h.machine.vendor().calls;
        assert_eq!(calls[calls.len() - 2], Call::Login);
        assert_eq!(calls[calls.len() - 1], Call::Status("tok-2".into()));
    }

    #[tokio::test]
    async fn second_expiry_defers_to_next_tick() {
        let mut h = harness(FakeVendor::script(&[Step::Expired, Step::Expired, Step::Ok(9)]));

        let report = h.machine.poll().await;
        assert_eq!(report.outcome, OutcomeKind::SessionExpired);
        assert_eq!(h.machine.vendor().logins(), 2);
        assert!(!h.machine.session().is_valid());
        assert_eq!(h.machine.state(), MachineState::LoggedOut);
        assert!(drain(&mut h.updates).is_empty());

        let report = h.machine.poll().await;
        assert_eq!(report.outcome, OutcomeKind::Ok);
        assert_eq!(h.machine.vendor().logins(), 3);
    }

    #[tokio::test]
    async fn transport_errors_report_offline_once() {
        let mut h = harness(FakeVendor::script(&[
            Step::Transport,
            Step::Transport,
            Step::Garbage,
        ]));

        for _ in 0..3 {
            let report = h.machine.poll().await;
            assert!(matches!(
                report.outcome,
                OutcomeKind::TransportError | OutcomeKind::ParseError
            ));
            assert_eq!(h.machine.state(), MachineState::Polling);
        }

        assert_eq!(h.machine.failures(), 3);
        assert_eq!(h.machine.vendor().logins(), 1);
        assert!(h.machine.session().is_valid());

        let updates = drain(&mut h.updates);
        let statuses = statuses(&updates);
        assert_eq!(statuses.len(), 1);
        assert!(matches!(
            statuses[0],
            Availability::Offline {
                detail: StatusDetail::CommunicationError,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn recovery_resets_failures_and_goes_online() {
        let mut h = harness(FakeVendor::script(&[Step::Transport, Step::Ok(4)]));
        h.machine.poll().await;
        h.machine.poll().await;
        assert_eq!(h.machine.failures(), 0);
        assert_eq!(h.machine.availability(), Some(Availability::Online));
    }

    #[tokio::test]
    async fn login_outage_is_a_communication_error() {
        let mut vendor = FakeVendor::default();
        vendor.login_error = Some(|| Error::UnexpectedStatus {
            status: 503,
            body: "maintenance".into(),
        });
        let mut h = harness(vendor);

        let report = h.machine.poll().await;
        assert_eq!(report.outcome, OutcomeKind::TransportError);
        assert_eq!(h.machine.state(), MachineState::LoggedOut);
        assert_eq!(h.machine.failures(), 1);
        assert!(matches!(
            h.machine.availability(),
            Some(Availability::Offline {
                detail: StatusDetail::CommunicationError,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn rejected_login_is_a_configuration_error() {
        let mut vendor = FakeVendor::default();
        vendor.login_error = Some(|| Error::Authentication {
            message: "bad password".into(),
        });
        let mut h = harness(vendor);

        let report = h.machine.poll().await;
        assert_eq!(report.outcome, OutcomeKind::SessionExpired);
        assert_eq!(h.machine.state(), MachineState::LoggedOut);
        assert!(matches!(
            h.machine.availability(),
            Some(Availability::Offline {
                detail: StatusDetail::ConfigurationError,
                ..
            })
        ));
        assert!(
            !h.machine
                .vendor()
                .calls
                .iter()
                .any(|c| matches!(c, Call::Status(_)))
        );
    }

    // ── Commands ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn command_without_session_is_refused() {
        let mut vendor = FakeVendor::default();
        vendor.login_error = Some(|| Error::Timeout { timeout_secs: 5 });
        let mut h = harness(vendor);

        let err = h.machine.dispatch_command("switch".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotLoggedIn { .. }));
        assert!(
            !h.machine
                .vendor()
                .calls
                .iter()
                .any(|c| matches!(c, Call::Control(_)))
        );
    }

    #[tokio::test]
    async fn command_on_unreachable_device_fails() {
        let mut h = harness(FakeVendor::script(&[Step::Transport]));
        let err = h.machine.dispatch_command("switch".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceUnavailable { .. }));
    }

    #[tokio::test]
    async fn input_required_sends_code_and_confirms_twice() {
        let mut vendor = FakeVendor::script(&[Step::Ok(1)]);
        vendor.controls.push_back(ControlResult::InputRequired);
        let mut h = harness(vendor);

        let report = h.machine.dispatch_command("command".into()).await.unwrap();
        assert_eq!(
            report.follow_ups,
            vec![Duration::from_secs(1), Duration::from_secs(15)]
        );
        let calls = &h.machine.vendor().calls;
        assert_eq!(
            calls[calls.len() - 2..],
            [Call::Control("command".into()), Call::Input]
        );
    }

    #[tokio::test]
    async fn rejected_command_forces_logout() {
        let mut vendor = FakeVendor::script(&[Step::Ok(1)]);
        vendor.controls.push_back(ControlResult::Rejected {
            code: Some(201),
            reason: "busy".into(),
        });
        let mut h = harness(vendor);

        let err = h.machine.dispatch_command("switch".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::CommandRejected { code: Some(201), .. }));
        assert!(!h.machine.session().is_valid());
        assert_eq!(h.machine.vendor().calls.last(), Some(&Call::Logout));
    }

    #[tokio::test]
    async fn expired_session_on_command_relogs_on_next_poll() {
        let mut vendor = FakeVendor::script(&[Step::Ok(1), Step::Ok(2)]);
        vendor.controls.push_back(ControlResult::SessionExpired);
        let mut h = harness(vendor);

        let err = h.machine.dispatch_command("switch".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotLoggedIn { .. }));
        assert!(!h.machine.session().is_valid());

        let report = h.machine.poll().await;
        assert!(report.relogged_in);
        assert_eq!(report.outcome, OutcomeKind::Ok);
    }

    #[tokio::test]
    async fn waits_for_control_to_be_enabled() {
        let mut h = harness(FakeVendor::script(&[
            Step::NotReady,
            Step::NotReady,
            Step::Ok(1),
        ]));

        let report = h.machine.dispatch_command("switch".into()).await.unwrap();
        assert!(report.follow_ups.is_empty());
        let polls = h
            .machine
            .vendor()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Status(_)))
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn gives_up_when_control_stays_disabled() {
        let mut h = harness(FakeVendor::script(&[Step::NotReady; 5]));
        let err = h.machine.dispatch_command("switch".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceUnavailable { .. }));
        assert!(
            !h.machine
                .vendor()
                .calls
                .iter()
                .any(|c| matches!(c, Call::Control(_)))
        );
    }

    // ── Disposal ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn dispose_logs_out_and_reports_offline() {
        let mut h = harness(FakeVendor::script(&[Step::Ok(1)]));
        h.machine.poll().await;
        drain(&mut h.updates);

        h.machine.dispose().await;
        assert_eq!(h.machine.state(), MachineState::Disposed);
        assert_eq!(h.machine.vendor().calls.last(), Some(&Call::Logout));
        assert_eq!(
            drain(&mut h.updates),
            vec![Update::Status {
                device: "dev".into(),
                availability: Availability::offline(StatusDetail::None, "disposed"),
            }]
        );
    }

    #[tokio::test]
    async fn dispose_without_session_skips_logout() {
        let mut h = harness(FakeVendor::default());
        h.machine.dispose().await;
        assert!(h.machine.vendor().calls.is_empty());
    }
}
