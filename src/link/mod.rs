//! Live status link to the streaming channel.
//!
//! [`ConnectionManager`] owns the whole connection lifecycle for one
//! subscription at a time. Callers only ever see three operations
//! ([`open`](ConnectionManager::open), [`close`](ConnectionManager::close),
//! [`set_subscription`](ConnectionManager::set_subscription)) and two read-only
//! watch channels: the pipeline snapshot and the [`LinkStatus`].
//!
//! ## Architecture
//!
//! ```text
//!  open / close / set_subscription
//!               │
//!               ▼
//!        ┌─────────────┐   Effect    ┌──────────────┐
//!        │   driver    │────────────▶│ socket task  │ (one per generation)
//!        │ (machine +  │◀────────────│ timer tasks  │
//!        │   store)    │    Input    └──────────────┘
//!        └──────┬──────┘
//!               │ watch
//!               ▼
//!   PipelineSnapshot, LinkStatus
//! ```
//!
//! Every input funnels through a single inbox, so transitions never run
//! concurrently and events from one socket are handled in arrival order.

pub mod machine;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use machine::{
    ConnectionMachine, ConnectionState, Effect, Generation, Input, Timings, CONNECT_TIMEOUT,
    RECONNECT_DELAY,
};
pub use transport::{Connector, Socket, WsConnector};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pipewatch_types::PipelineSnapshot;

use crate::error::LinkError;

/// Where and what to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Streaming channel address, e.g. `ws://localhost:8765`.
    pub url: String,
    /// Initial subscription identifier.
    pub pipeline_id: String,
    pub timings: Timings,
}

impl LinkOptions {
    pub fn new(url: impl Into<String>, pipeline_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pipeline_id: pipeline_id.into(),
            timings: Timings::default(),
        }
    }

    /// Override the watchdog and reconnect timers.
    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }
}

/// Observable state of the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// Current subscription identifier.
    pub subscription: String,
    /// Most recent socket generation.
    pub generation: Generation,
    /// Connect attempts since the last successful open.
    pub attempt: u32,
    /// Last transport failure, cleared once a socket opens.
    pub last_error: Option<LinkError>,
}

impl LinkStatus {
    fn of(machine: &ConnectionMachine) -> Self {
        Self {
            state: machine.state(),
            subscription: machine.subscription().to_string(),
            generation: machine.generation(),
            attempt: machine.attempt(),
            last_error: machine.last_error().cloned(),
        }
    }
}

/// Handle to a running status link.
///
/// Dropping the handle shuts the link down.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pipewatch::link::{ConnectionManager, LinkOptions, WsConnector};
///
/// # tokio_test::block_on(async {
/// let options = LinkOptions::new("ws://localhost:8765", "etl-7");
/// let manager = ConnectionManager::spawn(Arc::new(WsConnector::new()), options);
/// let mut snapshot = manager.snapshot();
///
/// manager.open();
/// snapshot.changed().await.unwrap();
/// println!("status: {}", snapshot.borrow().status);
///
/// manager.close();
/// manager.join().await;
/// # });
/// ```
#[derive(Debug)]
pub struct ConnectionManager {
    inbox: mpsc::UnboundedSender<Input>,
    snapshot: watch::Receiver<PipelineSnapshot>,
    status: watch::Receiver<LinkStatus>,
    driver: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Start the driver task. The link stays disconnected until [`open`](Self::open).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(connector: Arc<dyn Connector>, options: LinkOptions) -> Self {
        let machine = ConnectionMachine::new(options.url, options.pipeline_id, options.timings);
        let snapshot = machine.store().subscribe();
        let (status_tx, status) = watch::channel(LinkStatus::of(&machine));
        let (inbox, inbox_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            connector,
            inbox: inbox_rx,
            events: inbox.clone(),
            sockets: HashMap::new(),
            watchdog: None,
            reconnect: None,
            status: status_tx,
        };

        Self {
            inbox,
            snapshot,
            status,
            driver: Some(tokio::spawn(driver.run())),
        }
    }

    /// Connect to the current subscription, or reconnect now if waiting.
    pub fn open(&self) {
        self.send(Input::Open);
    }

    /// Shut the link down for good. Later calls have no effect.
    pub fn close(&self) {
        self.send(Input::Shutdown);
    }

    /// Switch to another pipeline, resetting the snapshot.
    pub fn set_subscription(&self, pipeline_id: impl Into<String>) {
        self.send(Input::Subscribe(pipeline_id.into()));
    }

    /// Read-only view of the pipeline snapshot.
    pub fn snapshot(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshot.clone()
    }

    /// Read-only view of the connection lifecycle.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Wait for the driver to stop after [`close`](Self::close).
    pub async fn join(mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                warn!(error = %e, "Status link driver panicked");
            }
        }
    }

    fn send(&self, input: Input) {
        if self.inbox.send(input).is_err() {
            debug!("Status link already stopped");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.inbox.send(Input::Shutdown);
    }
}

#[derive(Debug)]
enum SocketCommand {
    Send(String),
    Close,
}

struct Driver {
    machine: ConnectionMachine,
    connector: Arc<dyn Connector>,
    inbox: mpsc::UnboundedReceiver<Input>,
    /// Handed to socket and timer tasks.
    events: mpsc::UnboundedSender<Input>,
    /// Command channels of sockets that are still attached.
    sockets: HashMap<Generation, mpsc::UnboundedSender<SocketCommand>>,
    watchdog: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    status: watch::Sender<LinkStatus>,
}

impl Driver {
    async fn run(mut self) {
        while let Some(input) = self.inbox.recv().await {
            for effect in self.machine.handle(input) {
                self.apply(effect);
            }
            self.publish();

            if self.machine.is_shut_down() {
                self.machine.finish_shutdown();
                self.publish();
                break;
            }
        }
        debug!("Status link driver stopped");
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Connect { generation, url } => {
                let (commands, commands_rx) = mpsc::unbounded_channel();
                self.sockets.insert(generation, commands);
                tokio::spawn(run_socket(
                    self.connector.clone(),
                    url,
                    generation,
                    self.events.clone(),
                    commands_rx,
                ));
            }
            Effect::Send { generation, frame } => {
                if let Some(commands) = self.sockets.get(&generation) {
                    let _ = commands.send(SocketCommand::Send(frame));
                }
            }
            Effect::Detach { generation } => {
                // Unrouted first, so nothing it says afterwards reaches the machine
                if let Some(commands) = self.sockets.remove(&generation) {
                    let _ = commands.send(SocketCommand::Close);
                }
            }
            Effect::ArmWatchdog { generation, after } => {
                let timer = self.timer(after, Input::WatchdogExpired(generation));
                if let Some(old) = self.watchdog.replace(timer) {
                    old.abort();
                }
            }
            Effect::CancelWatchdog => {
                if let Some(timer) = self.watchdog.take() {
                    timer.abort();
                }
            }
            Effect::ScheduleReconnect { generation, after } => {
                let timer = self.timer(after, Input::ReconnectDue(generation));
                if let Some(old) = self.reconnect.replace(timer) {
                    old.abort();
                }
            }
            Effect::CancelReconnect => {
                if let Some(timer) = self.reconnect.take() {
                    timer.abort();
                }
            }
        }
    }

    fn timer(&self, after: Duration, input: Input) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(input);
        })
    }

    fn publish(&self) {
        let status = LinkStatus::of(&self.machine);
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Drive one socket generation until it closes or is detached.
async fn run_socket(
    connector: Arc<dyn Connector>,
    url: String,
    generation: Generation,
    events: mpsc::UnboundedSender<Input>,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
) {
    let connected = tokio::select! {
        result = connector.connect(&url) => result,
        _ = detached(&mut commands) => {
            debug!(%generation, "Connect attempt abandoned");
            return;
        }
    };

    let mut socket = match connected {
        Ok(socket) => socket,
        Err(e) => {
            let _ = events.send(Input::Failed(generation, e.to_string()));
            return;
        }
    };
    let _ = events.send(Input::Opened(generation));

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(SocketCommand::Send(frame)) => {
                    if let Err(e) = socket.send_text(frame).await {
                        let _ = events.send(Input::Failed(generation, e.to_string()));
                        break;
                    }
                }
                Some(SocketCommand::Close) | None => break,
            },

            frame = socket.next_text() => match frame {
                Some(Ok(text)) => {
                    let _ = events.send(Input::Frame(generation, text));
                }
                Some(Err(e)) => {
                    let _ = events.send(Input::Failed(generation, e.to_string()));
                    break;
                }
                None => {
                    let _ = events.send(Input::Closed(generation));
                    return;
                }
            },
        }
    }

    socket.close().await;
    debug!(%generation, "Socket closed");
}

/// Resolve once the driver detaches this generation.
async fn detached(commands: &mut mpsc::UnboundedReceiver<SocketCommand>) {
    while let Some(command) = commands.recv().await {
        if matches!(command, SocketCommand::Close) {
            return;
        }
    }
}
