//! Connection lifecycle state machine.
//!
//! The machine is pure: it consumes [`Input`]s (caller commands, socket
//! callbacks, timer expiries) and answers with [`Effect`]s for the driver to
//! carry out. Every socket attempt gets a fresh [`Generation`]; callbacks and
//! timers tagged with any generation other than the live one are dropped, so a
//! superseded socket can never mutate the snapshot.
//!
//! ```text
//!                open                 opened
//! Disconnected ───────▶ Connecting ───────────▶ Connected
//!      ▲                 │      ▲                  │
//!      │        timeout/ │      │ reconnect due    │ error/close
//!      │        error    ▼      │                  │
//!      │               Reconnecting ◀──────────────┘
//!      │
//!      └─── ShuttingDown ◀── shutdown (from any state)
//! ```

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codec::{self, Frame};
use crate::data::StateStore;
use crate::error::LinkError;

/// Default time allowed for a socket to open.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default delay before a dropped connection is retried.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Timer settings for the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Watchdog armed on every connect attempt.
    pub connect_timeout: Duration,
    /// Delay before a new attempt after a drop, error or timeout.
    pub reconnect_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Where the connection lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket and nothing scheduled.
    #[default]
    Disconnected,
    /// A socket is opening; the watchdog is armed.
    Connecting,
    /// The socket is open and the handshake has been sent.
    Connected,
    /// Waiting for the reconnect timer.
    Reconnecting,
    /// Shutdown requested; the instance is inert.
    ShuttingDown,
}

impl ConnectionState {
    /// Returns the display label for this state.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::ShuttingDown => "shutting down",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies one socket attempt, from creation to close or supersession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything that can drive the machine, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Caller asks for a connection to the current subscription.
    Open,
    /// Caller switches to another pipeline.
    Subscribe(String),
    /// Caller tears the instance down for good.
    Shutdown,
    /// The socket of this generation opened.
    Opened(Generation),
    /// The socket of this generation delivered a text frame.
    Frame(Generation, String),
    /// The socket of this generation failed.
    Failed(Generation, String),
    /// The socket of this generation closed.
    Closed(Generation),
    /// The connect watchdog for this generation expired.
    WatchdogExpired(Generation),
    /// The reconnect timer scheduled after this generation fired.
    ReconnectDue(Generation),
}

/// Work the driver must perform on the machine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create a socket for `url`; its callbacks carry `generation`.
    Connect { generation: Generation, url: String },
    /// Write a frame to the live socket.
    Send { generation: Generation, frame: String },
    /// Neutralize the socket's callbacks, then close it.
    Detach { generation: Generation },
    /// Start the connect watchdog.
    ArmWatchdog { generation: Generation, after: Duration },
    /// Stop the connect watchdog.
    CancelWatchdog,
    /// Start the reconnect timer.
    ScheduleReconnect { generation: Generation, after: Duration },
    /// Stop the reconnect timer.
    CancelReconnect,
}

/// The connection state machine for one subscription at a time.
#[derive(Debug)]
pub struct ConnectionMachine {
    url: String,
    subscription: String,
    timings: Timings,
    store: StateStore,
    state: ConnectionState,
    generation: Generation,
    /// Generation whose socket may still mutate state.
    live: Option<Generation>,
    watchdog: Option<Generation>,
    reconnect: Option<Generation>,
    shutdown_requested: bool,
    attempt: u32,
    last_error: Option<LinkError>,
}

impl ConnectionMachine {
    /// Create a disconnected machine for `subscription` on `url`.
    pub fn new(url: impl Into<String>, subscription: impl Into<String>, timings: Timings) -> Self {
        Self {
            url: url.into(),
            subscription: subscription.into(),
            timings,
            store: StateStore::new(),
            state: ConnectionState::Disconnected,
            generation: Generation::default(),
            live: None,
            watchdog: None,
            reconnect: None,
            shutdown_requested: false,
            attempt: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Connect attempts since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&LinkError> {
        self.last_error.as_ref()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown_requested
    }

    /// Settle into the terminal `Disconnected` state once teardown is done.
    pub fn finish_shutdown(&mut self) {
        if self.shutdown_requested {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Feed one input and collect the resulting effects.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        if self.shutdown_requested {
            debug!(?input, "Ignoring input after shutdown");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match input {
            Input::Open => self.on_open(&mut effects),
            Input::Subscribe(id) => self.on_subscribe(id, &mut effects),
            Input::Shutdown => self.on_shutdown(&mut effects),
            Input::Opened(generation) => self.on_opened(generation, &mut effects),
            Input::Frame(generation, text) => self.on_frame(generation, &text),
            Input::Failed(generation, reason) => {
                self.on_failed(generation, reason, &mut effects)
            }
            Input::Closed(generation) => self.on_closed(generation, &mut effects),
            Input::WatchdogExpired(generation) => {
                self.on_watchdog(generation, &mut effects)
            }
            Input::ReconnectDue(generation) => self.on_reconnect_due(generation, &mut effects),
        }
        effects
    }

    fn is_live(&self, generation: Generation) -> bool {
        if self.live == Some(generation) {
            true
        } else {
            debug!(%generation, live = ?self.live, "Dropping stale socket event");
            false
        }
    }

    fn on_open(&mut self, effects: &mut Vec<Effect>) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {}
            ConnectionState::Reconnecting => {
                self.cancel_reconnect(effects);
                self.begin_connect(effects);
            }
            ConnectionState::Disconnected => self.begin_connect(effects),
            ConnectionState::ShuttingDown => {}
        }
    }

    fn on_subscribe(&mut self, id: String, effects: &mut Vec<Effect>) {
        if id == self.subscription {
            return;
        }
        info!(from = %self.subscription, to = %id, "Switching pipeline subscription");

        let was_active = self.state != ConnectionState::Disconnected;
        self.teardown(effects);
        self.store.reset();
        self.subscription = id;
        self.last_error = None;
        self.attempt = 0;

        if was_active {
            self.begin_connect(effects);
        } else {
            self.state = ConnectionState::Disconnected;
        }
    }

    fn on_shutdown(&mut self, effects: &mut Vec<Effect>) {
        info!(subscription = %self.subscription, "Shutting down status link");
        self.shutdown_requested = true;
        self.teardown(effects);
        self.state = ConnectionState::ShuttingDown;
    }

    fn on_opened(&mut self, generation: Generation, effects: &mut Vec<Effect>) {
        if !self.is_live(generation) || self.state != ConnectionState::Connecting {
            return;
        }
        info!(%generation, subscription = %self.subscription, "Status link open");

        self.cancel_watchdog(effects);
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        self.last_error = None;
        effects.push(Effect::Send {
            generation,
            frame: codec::encode_handshake(&self.subscription),
        });
    }

    fn on_frame(&mut self, generation: Generation, text: &str) {
        if !self.is_live(generation) || self.state != ConnectionState::Connected {
            return;
        }
        match codec::decode(text) {
            Ok(Frame::Ack) => debug!(%generation, "Handshake acknowledged"),
            Ok(Frame::Update(event)) => {
                self.store.apply_event(event);
            }
            Err(e) => warn!(%generation, error = %e, "Ignoring malformed status frame"),
        }
    }

    fn on_failed(&mut self, generation: Generation, reason: String, effects: &mut Vec<Effect>) {
        if !self.is_live(generation) {
            return;
        }
        warn!(%generation, %reason, "Status link error");

        self.store.mark_error();
        self.last_error = Some(LinkError::Socket(reason));
        self.drop_socket(generation, effects);
    }

    fn on_closed(&mut self, generation: Generation, effects: &mut Vec<Effect>) {
        if !self.is_live(generation) {
            return;
        }
        info!(%generation, "Status link closed");
        self.drop_socket(generation, effects);
    }

    fn on_watchdog(&mut self, generation: Generation, effects: &mut Vec<Effect>) {
        if self.watchdog != Some(generation) || self.state != ConnectionState::Connecting {
            return;
        }
        warn!(
            %generation,
            timeout = ?self.timings.connect_timeout,
            "Status link did not open in time"
        );

        self.watchdog = None;
        self.store.mark_error();
        self.last_error = Some(LinkError::ConnectTimeout);
        self.drop_socket(generation, effects);
    }

    fn on_reconnect_due(&mut self, generation: Generation, effects: &mut Vec<Effect>) {
        if self.reconnect != Some(generation) || self.state != ConnectionState::Reconnecting {
            return;
        }
        self.reconnect = None;
        self.begin_connect(effects);
    }

    /// Detach the live socket and wait for the reconnect timer.
    fn drop_socket(&mut self, generation: Generation, effects: &mut Vec<Effect>) {
        self.cancel_watchdog(effects);
        self.live = None;
        effects.push(Effect::Detach { generation });
        self.state = ConnectionState::Reconnecting;
        self.schedule_reconnect(generation, effects);
    }

    fn begin_connect(&mut self, effects: &mut Vec<Effect>) {
        self.generation = Generation(self.generation.0 + 1);
        let generation = self.generation;
        self.live = Some(generation);
        self.watchdog = Some(generation);
        self.state = ConnectionState::Connecting;
        self.attempt += 1;

        info!(
            %generation,
            url = %self.url,
            subscription = %self.subscription,
            attempt = self.attempt,
            "Connecting status link"
        );
        effects.push(Effect::Connect {
            generation,
            url: self.url.clone(),
        });
        effects.push(Effect::ArmWatchdog {
            generation,
            after: self.timings.connect_timeout,
        });
    }

    fn schedule_reconnect(&mut self, generation: Generation, effects: &mut Vec<Effect>) {
        if self.reconnect.is_some() {
            return;
        }
        debug!(%generation, delay = ?self.timings.reconnect_delay, "Scheduling reconnect");
        self.reconnect = Some(generation);
        effects.push(Effect::ScheduleReconnect {
            generation,
            after: self.timings.reconnect_delay,
        });
    }

    fn cancel_watchdog(&mut self, effects: &mut Vec<Effect>) {
        if self.watchdog.take().is_some() {
            effects.push(Effect::CancelWatchdog);
        }
    }

    fn cancel_reconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.reconnect.take().is_some() {
            effects.push(Effect::CancelReconnect);
        }
    }

    /// Cancel timers, then detach the live socket.
    fn teardown(&mut self, effects: &mut Vec<Effect>) {
        self.cancel_watchdog(effects);
        self.cancel_reconnect(effects);
        if let Some(generation) = self.live.take() {
            effects.push(Effect::Detach { generation });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewatch_types::PipelineStatus;

    const URL: &str = "ws://localhost:8765";

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(URL, "p1", Timings::default())
    }

    /// Open and complete the handshake, returning the live generation.
    fn connected(m: &mut ConnectionMachine) -> Generation {
        m.handle(Input::Open);
        let generation = m.generation();
        m.handle(Input::Opened(generation));
        assert_eq!(m.state(), ConnectionState::Connected);
        generation
    }

    fn reconnects(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::ScheduleReconnect { .. }))
            .count()
    }

    #[test]
    fn test_open_connects_and_arms_watchdog() {
        let mut m = machine();
        let effects = m.handle(Input::Open);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(
            effects,
            vec![
                Effect::Connect {
                    generation: Generation(1),
                    url: URL.to_string()
                },
                Effect::ArmWatchdog {
                    generation: Generation(1),
                    after: CONNECT_TIMEOUT
                },
            ]
        );
    }

    #[test]
    fn test_open_is_ignored_while_connecting_or_connected() {
        let mut m = machine();
        m.handle(Input::Open);
        assert!(m.handle(Input::Open).is_empty());
        m.handle(Input::Opened(m.generation()));
        assert!(m.handle(Input::Open).is_empty());
        assert_eq!(m.generation(), Generation(1));
    }

    #[test]
    fn test_opened_sends_handshake() {
        let mut m = machine();
        m.handle(Input::Open);
        let effects = m.handle(Input::Opened(Generation(1)));
        assert_eq!(
            effects,
            vec![
                Effect::CancelWatchdog,
                Effect::Send {
                    generation: Generation(1),
                    frame: r#"{"pipeline_id":"p1"}"#.to_string()
                },
            ]
        );
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_watchdog_timeout_schedules_one_reconnect() {
        let mut m = machine();
        m.handle(Input::Open);
        let generation = m.generation();

        let effects = m.handle(Input::WatchdogExpired(generation));
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert_eq!(m.store().snapshot().status, PipelineStatus::Error);
        assert_eq!(m.last_error(), Some(&LinkError::ConnectTimeout));
        assert_eq!(
            effects,
            vec![
                Effect::Detach { generation },
                Effect::ScheduleReconnect {
                    generation,
                    after: RECONNECT_DELAY
                },
            ]
        );

        // Late callbacks from the timed-out socket schedule nothing more
        assert!(m.handle(Input::Failed(generation, "late".into())).is_empty());
        assert!(m.handle(Input::Closed(generation)).is_empty());
        assert!(m.handle(Input::Opened(generation)).is_empty());
        assert!(m.handle(Input::WatchdogExpired(generation)).is_empty());
        assert_eq!(m.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_watchdog_after_open_is_ignored() {
        let mut m = machine();
        let generation = connected(&mut m);
        assert!(m.handle(Input::WatchdogExpired(generation)).is_empty());
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.store().snapshot().status, PipelineStatus::Initialized);
    }

    #[test]
    fn test_frames_update_snapshot() {
        let mut m = machine();
        let generation = connected(&mut m);

        m.handle(Input::Frame(generation, r#"{"status":"connected"}"#.into()));
        assert!(m.store().snapshot().is_empty());

        m.handle(Input::Frame(
            generation,
            r#"{"status":"running","components":[{"name":"ingest","order":1}]}"#.into(),
        ));
        let snapshot = m.store().snapshot();
        assert_eq!(snapshot.status, PipelineStatus::Running);
        assert_eq!(snapshot.components.len(), 1);
        assert_eq!(snapshot.components[0].name, "ingest");
    }

    #[test]
    fn test_malformed_frame_changes_nothing() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Frame(generation, r#"{"status":"running"}"#.into()));
        let before = m.store().snapshot();

        for bad in ["garbage", "[]", r#"{"status":"bogus"}"#, r#"{"other":1}"#] {
            let effects = m.handle(Input::Frame(generation, bad.into()));
            assert!(effects.is_empty());
        }
        assert_eq!(m.store().snapshot(), before);
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_socket_error_surfaces_error_and_reconnects() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Frame(generation, r#"{"status":"running"}"#.into()));

        let effects = m.handle(Input::Failed(generation, "reset".into()));
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert_eq!(m.store().snapshot().status, PipelineStatus::Error);
        assert_eq!(m.last_error(), Some(&LinkError::Socket("reset".into())));
        assert_eq!(reconnects(&effects), 1);
        assert!(effects.contains(&Effect::Detach { generation }));

        // The close that follows an error is not a second reconnect
        assert!(m.handle(Input::Closed(generation)).is_empty());
    }

    #[test]
    fn test_close_keeps_status_and_reconnects() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Frame(generation, r#"{"status":"running"}"#.into()));

        let effects = m.handle(Input::Closed(generation));
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert_eq!(m.store().snapshot().status, PipelineStatus::Running);
        assert_eq!(
            effects,
            vec![
                Effect::Detach { generation },
                Effect::ScheduleReconnect {
                    generation,
                    after: RECONNECT_DELAY
                },
            ]
        );
    }

    #[test]
    fn test_reconnect_reuses_subscription() {
        let mut m = machine();
        let first = connected(&mut m);
        m.handle(Input::Closed(first));

        let effects = m.handle(Input::ReconnectDue(first));
        assert_eq!(m.state(), ConnectionState::Connecting);
        let second = m.generation();
        assert_eq!(second, Generation(2));
        assert!(effects.contains(&Effect::Connect {
            generation: second,
            url: URL.to_string()
        }));

        let effects = m.handle(Input::Opened(second));
        assert!(effects.contains(&Effect::Send {
            generation: second,
            frame: codec::encode_handshake("p1")
        }));

        // A duplicate timer expiry does nothing
        assert!(m.handle(Input::ReconnectDue(first)).is_empty());
    }

    #[test]
    fn test_open_while_reconnecting_connects_now() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Closed(generation));

        let effects = m.handle(Input::Open);
        assert_eq!(effects[0], Effect::CancelReconnect);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(m.handle(Input::ReconnectDue(generation)).is_empty());
    }

    #[test]
    fn test_stale_generation_cannot_mutate() {
        let mut m = machine();
        let old = connected(&mut m);
        m.handle(Input::Closed(old));
        m.handle(Input::ReconnectDue(old));
        let new = m.generation();
        m.handle(Input::Opened(new));

        let effects = m.handle(Input::Frame(old, r#"{"status":"completed"}"#.into()));
        assert!(effects.is_empty());
        assert_eq!(m.store().snapshot().status, PipelineStatus::Initialized);
        assert!(m.handle(Input::Failed(old, "late".into())).is_empty());
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        let mut m = machine();
        m.handle(Input::Open);
        let generation = m.generation();

        let effects = m.handle(Input::Shutdown);
        assert_eq!(
            effects,
            vec![Effect::CancelWatchdog, Effect::Detach { generation }]
        );
        assert_eq!(m.state(), ConnectionState::ShuttingDown);

        m.finish_shutdown();
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shutdown_while_reconnecting_cancels_timer() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Closed(generation));
        assert_eq!(m.handle(Input::Shutdown), vec![Effect::CancelReconnect]);
    }

    #[test]
    fn test_no_mutation_after_shutdown() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Frame(generation, r#"{"status":"running"}"#.into()));
        m.handle(Input::Shutdown);
        let before = m.store().snapshot();

        for input in [
            Input::Frame(generation, r#"{"status":"completed"}"#.into()),
            Input::Failed(generation, "late".into()),
            Input::Closed(generation),
            Input::WatchdogExpired(generation),
            Input::ReconnectDue(generation),
            Input::Open,
            Input::Subscribe("p2".into()),
        ] {
            assert!(m.handle(input).is_empty());
        }
        assert_eq!(m.store().snapshot(), before);
        assert_eq!(m.subscription(), "p1");
        assert_eq!(m.state(), ConnectionState::ShuttingDown);
    }

    #[test]
    fn test_subscribe_resets_and_reconnects() {
        let mut m = machine();
        let old = connected(&mut m);
        m.handle(Input::Frame(
            old,
            r#"{"status":"running","pipelineData":{"a.b":"c"}}"#.into(),
        ));

        let effects = m.handle(Input::Subscribe("p2".into()));
        assert!(m.store().snapshot().is_empty());
        assert_eq!(m.subscription(), "p2");
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(effects[0], Effect::Detach { generation: old });
        let new = m.generation();
        assert!(effects.contains(&Effect::Connect {
            generation: new,
            url: URL.to_string()
        }));

        // The old socket is neutralized
        m.handle(Input::Frame(old, r#"{"status":"completed"}"#.into()));
        assert!(m.store().snapshot().is_empty());

        let effects = m.handle(Input::Opened(new));
        assert!(effects.contains(&Effect::Send {
            generation: new,
            frame: codec::encode_handshake("p2")
        }));
    }

    #[test]
    fn test_subscribe_same_id_is_noop() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Frame(generation, r#"{"status":"running"}"#.into()));
        assert!(m.handle(Input::Subscribe("p1".into())).is_empty());
        assert_eq!(m.store().snapshot().status, PipelineStatus::Running);
    }

    #[test]
    fn test_subscribe_while_disconnected_does_not_connect() {
        let mut m = machine();
        assert!(m.handle(Input::Subscribe("p2".into())).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.subscription(), "p2");
    }

    #[test]
    fn test_subscribe_while_reconnecting_cancels_timer() {
        let mut m = machine();
        let generation = connected(&mut m);
        m.handle(Input::Closed(generation));

        let effects = m.handle(Input::Subscribe("p2".into()));
        assert_eq!(effects[0], Effect::CancelReconnect);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(m.handle(Input::ReconnectDue(generation)).is_empty());
    }

    #[test]
    fn test_attempts_count_until_open() {
        let mut m = machine();
        m.handle(Input::Open);
        let first = m.generation();
        m.handle(Input::WatchdogExpired(first));
        m.handle(Input::ReconnectDue(first));
        assert_eq!(m.attempt(), 2);

        m.handle(Input::Opened(m.generation()));
        assert_eq!(m.attempt(), 0);
        assert!(m.last_error().is_none());
    }
}
