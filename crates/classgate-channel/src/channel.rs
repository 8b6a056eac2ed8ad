//! Control channel actor: one Tokio task that owns the authority connection.
//!
//! The task runs for the gateway's whole lifetime. Nothing else touches
//! the connection; the outside world talks to the task through a
//! [`ChannelHandle`] (commands in, events and status out). This is the
//! actor model again: no shared mutable state, just message passing. The
//! single exception is the [`ClassCell`], which the task writes and HTTP
//! handlers read.
//!
//! # Lifecycle
//!
//! ```text
//!         ┌──────────── backoff sleep ◀───────────┐
//!         ▼                                       │ (error)
//!   [Connecting] ──open──▶ namespace connect ──▶ [Connected] ── serve ──┐
//!         │                                                             │
//!         └───────────────────── Shutdown ──────────▶ [Stopped] ◀──────┘
//! ```
//!
//! While connected the task:
//! - answers every Engine.IO `ping` with a `pong`,
//! - emits `getActiveClass` right after each successful connect,
//! - writes every `setClass` payload into the [`ClassCell`],
//! - publishes every inbound event to subscribers,
//! - drops the connection when nothing arrives for
//!   `pingInterval + pingTimeout`.

use std::future::Future;
use std::time::Duration;

use classgate_protocol::{
    decode, encode, ControlEvent, OpenHandshake, Packet, DEFAULT_NAMESPACE,
    GET_ACTIVE_CLASS, SET_CLASS,
};
use classgate_transport::{Connection, Connector};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{Backoff, BackoffConfig, ChannelError, ClassCell, ClassView};

// ---------------------------------------------------------------------------
// Configuration and status
// ---------------------------------------------------------------------------

/// Settings for a [`ControlChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Socket.IO namespace to join on the authority. Default: `/`.
    pub namespace: String,

    /// Reconnect delays.
    pub backoff: BackoffConfig,

    /// How long the Engine.IO open plus the namespace connect may take.
    /// Default: 20 s.
    pub handshake_timeout: Duration,

    /// Capacity of the command queue. Default: 32.
    pub command_buffer: usize,

    /// Capacity of the inbound event broadcast. Subscribers that fall
    /// further behind than this miss events. Default: 64.
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            backoff: BackoffConfig::default(),
            handshake_timeout: Duration::from_secs(20),
            command_buffer: 32,
            event_buffer: 64,
        }
    }
}

/// What the channel task is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Dialing the authority or waiting for the handshake.
    Connecting,
    /// Joined the namespace. `sid` is the Socket.IO session id.
    Connected { sid: String },
    /// Waiting `delay` before reconnect attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The task has exited. Terminal.
    Stopped,
}

// ---------------------------------------------------------------------------
// Commands and handle
// ---------------------------------------------------------------------------

/// Commands sent to the channel task.
enum ChannelCommand {
    /// Send an event to the authority.
    Emit {
        event: ControlEvent,
        reply: oneshot::Sender<Result<(), ChannelError>>,
    },

    /// Disconnect and stop the task.
    Shutdown,
}

/// Handle to a running control channel.
///
/// Cheap to clone. Dropping every handle does **not** stop the task;
/// call [`shutdown`](Self::shutdown).
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    commands: mpsc::Sender<ChannelCommand>,
    events: broadcast::Sender<ControlEvent>,
    status: watch::Receiver<ChannelStatus>,
    class: ClassView,
}

impl std::fmt::Debug for ChannelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Emit { event, .. } => write!(f, "Emit({})", event.kind),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl ChannelHandle {
    /// Sends `event` to the authority on the channel's namespace.
    ///
    /// # Errors
    /// - [`ChannelError::NotConnected`]: between connections
    /// - [`ChannelError::Unavailable`]: the task has stopped
    /// - a transport or protocol error if the send itself failed
    pub async fn emit(&self, event: ControlEvent) -> Result<(), ChannelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ChannelCommand::Emit {
                event,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ChannelError::Unavailable)?;
        reply_rx.await.map_err(|_| ChannelError::Unavailable)?
    }

    /// Receives every event the authority sends from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// The task's current status.
    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified whenever the status changes.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// A read-only view of the current class.
    pub fn class_view(&self) -> ClassView {
        self.class.clone()
    }

    /// Tells the task to disconnect and waits until it has stopped.
    ///
    /// Calling this on an already stopped channel is a no-op.
    pub async fn shutdown(&self) {
        // A send error means the task is already gone.
        let _ = self.commands.send(ChannelCommand::Shutdown).await;
        let mut status = self.status.clone();
        let _ = status
            .wait_for(|status| *status == ChannelStatus::Stopped)
            .await;
    }
}

// ---------------------------------------------------------------------------
// ControlChannel
// ---------------------------------------------------------------------------

/// A control channel that has not been started yet.
///
/// ```no_run
/// # async fn demo() -> Result<(), classgate_channel::ChannelError> {
/// use classgate_channel::{authority_connector, ChannelConfig, ClassCell, ControlChannel};
///
/// let connector = authority_connector("http://localhost:420", "your_api_key")?;
/// let handle = ControlChannel::new(connector, ChannelConfig::default())
///     .spawn(ClassCell::new());
///
/// let class = handle.class_view();
/// println!("current class: {:?}", class.current());
/// # Ok(())
/// # }
/// ```
pub struct ControlChannel<C: Connector> {
    connector: C,
    config: ChannelConfig,
}

impl<C: Connector> ControlChannel<C> {
    pub fn new(connector: C, config: ChannelConfig) -> Self {
        Self { connector, config }
    }

    /// Starts the channel task. It immediately begins connecting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, class: ClassCell) -> ChannelHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (event_tx, _) = broadcast::channel(self.config.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Connecting);

        let handle = ChannelHandle {
            commands: command_tx,
            events: event_tx.clone(),
            status: status_rx,
            class: class.view(),
        };

        let actor = ChannelActor {
            backoff: Backoff::new(self.config.backoff.clone()),
            connector: self.connector,
            config: self.config,
            commands: command_rx,
            events: event_tx,
            status: status_tx,
            class,
        };
        tokio::spawn(actor.run());

        handle
    }
}

/// Why a connection ended.
enum SessionEnd {
    /// Shutdown was requested.
    Shutdown,
    /// The connection failed or was lost; reconnect.
    Lost(ChannelError),
}

/// The internal actor state. Runs inside a Tokio task.
struct ChannelActor<C: Connector> {
    connector: C,
    config: ChannelConfig,
    backoff: Backoff,
    commands: mpsc::Receiver<ChannelCommand>,
    events: broadcast::Sender<ControlEvent>,
    status: watch::Sender<ChannelStatus>,
    class: ClassCell,
}

impl<C: Connector> ChannelActor<C> {
    /// Connects, serves, and reconnects until shutdown.
    async fn run(mut self) {
        info!(namespace = %self.config.namespace, "control channel started");

        loop {
            self.status.send_replace(ChannelStatus::Connecting);

            match self.connect_and_serve().await {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(e) => {
                    warn!(error = %e, "control channel connection lost");
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                warn!(
                    attempts = self.backoff.attempts(),
                    "control channel giving up"
                );
                break;
            };
            let attempt = self.backoff.attempts();
            info!(attempt, delay = ?delay, "reconnecting");
            self.status
                .send_replace(ChannelStatus::Reconnecting { attempt, delay });

            if idle_until(&mut self.commands, time::sleep(delay)).await.is_none() {
                break;
            }
        }

        self.status.send_replace(ChannelStatus::Stopped);
        info!("control channel stopped");
    }

    async fn connect_and_serve(&mut self) -> SessionEnd {
        let connected = idle_until(&mut self.commands, self.connector.connect()).await;
        let conn = match connected {
            None => return SessionEnd::Shutdown,
            Some(Err(e)) => return SessionEnd::Lost(e.into()),
            Some(Ok(conn)) => conn,
        };
        debug!(conn = %conn.id(), "authority transport connected");

        let limit = self.config.handshake_timeout;
        let handshake = time::timeout(limit, handshake(&conn, &self.config.namespace));
        let (open, sid) = match idle_until(&mut self.commands, handshake).await {
            None => {
                let _ = conn.close().await;
                return SessionEnd::Shutdown;
            }
            Some(Err(_)) => {
                let _ = conn.close().await;
                return SessionEnd::Lost(ChannelError::HandshakeTimeout(limit));
            }
            Some(Ok(Err(e))) => {
                let _ = conn.close().await;
                return SessionEnd::Lost(e);
            }
            Some(Ok(Ok(joined))) => joined,
        };

        info!(%sid, namespace = %self.config.namespace, "control channel connected");
        self.backoff.reset();
        self.status
            .send_replace(ChannelStatus::Connected { sid: sid.clone() });

        let end = self.serve(&conn, &open).await;
        let _ = conn.close().await;
        end
    }

    /// The connected loop: frames in, commands in, heartbeat deadline.
    async fn serve(&mut self, conn: &C::Connection, open: &OpenHandshake) -> SessionEnd {
        let namespace = self.config.namespace.clone();

        let ask = Packet::event(namespace.as_str(), ControlEvent::bare(GET_ACTIVE_CLASS));
        if let Err(e) = send_packet(conn, &ask).await {
            return SessionEnd::Lost(e);
        }

        let window = open.liveness_window();
        let mut deadline = Instant::now() + window;
        let mut commands_open = true;

        loop {
            tokio::select! {
                frame = conn.recv() => {
                    let frame = match frame {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            return SessionEnd::Lost(ChannelError::Closed(
                                "connection closed".into(),
                            ));
                        }
                        Err(e) => return SessionEnd::Lost(e.into()),
                    };
                    deadline = Instant::now() + window;
                    if let Err(e) = self.handle_frame(conn, &namespace, &frame).await {
                        return SessionEnd::Lost(e);
                    }
                }
                cmd = self.commands.recv(), if commands_open => match cmd {
                    Some(ChannelCommand::Emit { event, reply }) => {
                        let result = send_packet(conn, &Packet::event(namespace.as_str(), event)).await;
                        let failed = result.as_ref().err().map(ToString::to_string);
                        let _ = reply.send(result);
                        if let Some(reason) = failed {
                            return SessionEnd::Lost(ChannelError::Closed(
                                format!("emit failed: {reason}"),
                            ));
                        }
                    }
                    Some(ChannelCommand::Shutdown) => {
                        let bye = Packet::Disconnect { namespace: namespace.clone() };
                        let _ = send_packet(conn, &bye).await;
                        return SessionEnd::Shutdown;
                    }
                    None => commands_open = false,
                },
                _ = time::sleep_until(deadline) => {
                    return SessionEnd::Lost(ChannelError::HeartbeatTimeout(window));
                }
            }
        }
    }

    /// Reacts to a single inbound frame while connected.
    ///
    /// Frames that don't decode are logged and skipped; one bad frame is
    /// not worth a reconnect.
    async fn handle_frame(
        &self,
        conn: &C::Connection,
        namespace: &str,
        frame: &str,
    ) -> Result<(), ChannelError> {
        let packet = match decode(frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "ignoring undecodable frame");
                return Ok(());
            }
        };

        match packet {
            Packet::Ping => send_packet(conn, &Packet::Pong).await,
            Packet::Close => Err(ChannelError::Closed("engine close".into())),
            Packet::Event {
                namespace: ns,
                ack,
                event,
            } if ns == namespace => {
                if let Some(ack) = ack {
                    let reply = Packet::Ack {
                        namespace: ns,
                        ack,
                        args: Vec::new(),
                    };
                    send_packet(conn, &reply).await?;
                }
                self.handle_event(event);
                Ok(())
            }
            Packet::Disconnect { namespace: ns } if ns == namespace => {
                Err(ChannelError::Closed("namespace disconnected".into()))
            }
            Packet::ConnectError { namespace: ns, data } if ns == namespace => {
                Err(ChannelError::Refused(refusal_message(data.as_ref())))
            }
            other => {
                debug!(packet = ?other, "ignoring packet");
                Ok(())
            }
        }
    }

    fn handle_event(&self, event: ControlEvent) {
        if event.is(SET_CLASS) {
            info!(class = %event.payload, "active class changed");
            self.class.set(event.payload.clone());
        } else {
            debug!(kind = %event.kind, "control event");
        }
        // An error only means nobody is subscribed.
        let _ = self.events.send(event);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Runs `fut` while still answering commands.
///
/// Emits are refused with [`ChannelError::NotConnected`]. Returns `None`
/// if shutdown was requested (or every handle is gone and the queue
/// closed) before `fut` finished.
async fn idle_until<F: Future>(
    commands: &mut mpsc::Receiver<ChannelCommand>,
    fut: F,
) -> Option<F::Output> {
    tokio::pin!(fut);
    let mut commands_open = true;
    loop {
        tokio::select! {
            output = &mut fut => return Some(output),
            cmd = commands.recv(), if commands_open => match cmd {
                Some(ChannelCommand::Emit { reply, .. }) => {
                    let _ = reply.send(Err(ChannelError::NotConnected));
                }
                Some(ChannelCommand::Shutdown) => return None,
                // Handles dropped: keep running until explicitly stopped.
                None => commands_open = false,
            },
        }
    }
}

/// Waits for the Engine.IO open packet, then joins `namespace`.
///
/// Returns the open handshake and the Socket.IO session id.
async fn handshake<T: Connection>(
    conn: &T,
    namespace: &str,
) -> Result<(OpenHandshake, String), ChannelError> {
    let open = loop {
        match recv_packet(conn).await? {
            Packet::Open(open) => break open,
            Packet::Noop => continue,
            other => {
                return Err(ChannelError::Handshake(format!(
                    "expected open packet, got {other:?}"
                )));
            }
        }
    };
    debug!(
        engine_sid = %open.sid,
        ping_interval = open.ping_interval,
        ping_timeout = open.ping_timeout,
        "engine.io open"
    );

    send_packet(conn, &Packet::connect(namespace)).await?;

    loop {
        match recv_packet(conn).await? {
            Packet::Connect { namespace: ns, data } if ns == namespace => {
                let sid = data
                    .as_ref()
                    .and_then(|data| data.get("sid"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Ok((open, sid));
            }
            Packet::ConnectError { namespace: ns, data } if ns == namespace => {
                return Err(ChannelError::Refused(refusal_message(data.as_ref())));
            }
            Packet::Ping => send_packet(conn, &Packet::Pong).await?,
            Packet::Close => {
                return Err(ChannelError::Closed("closed during handshake".into()));
            }
            other => debug!(packet = ?other, "ignoring packet during handshake"),
        }
    }
}

async fn recv_packet<T: Connection>(conn: &T) -> Result<Packet, ChannelError> {
    let frame = conn
        .recv()
        .await?
        .ok_or_else(|| ChannelError::Closed("closed during handshake".into()))?;
    Ok(decode(&frame)?)
}

async fn send_packet<T: Connection>(conn: &T, packet: &Packet) -> Result<(), ChannelError> {
    let frame = encode(packet)?;
    conn.send(&frame).await?;
    Ok(())
}

/// Pulls a readable reason out of `connect_error` data, which is either
/// `{"message": "..."}` or a bare string.
fn refusal_message(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(message)) => message.clone(),
        Some(value) => value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        None => "no reason given".to_string(),
    }
}
