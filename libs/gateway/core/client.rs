use crate::core::ack_tracker::AckTracker;
use crate::core::config::GatewayConfig;
use crate::core::connection_state::{AtomicGatewayState, AtomicMetrics, GatewayState};
use crate::core::heartbeat::{spawn_heartbeat, HeartbeatSchedule};
use crate::core::protocol::{self, event, opcode, GatewayFrame, HelloPayload, ReadyPayload};
use crate::core::session::{Disconnect, ReconnectPlan, Session};
use crate::dispatch::EventDispatcher;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Close code sent when we drop a connection we intend to resume
const RESUME_CLOSE_CODE: u16 = 4000;

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide guard: at most one gateway client runs at a time
#[derive(Debug)]
pub struct SessionGuard(());

impl SessionGuard {
    pub fn acquire() -> Result<Self> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionGuard(()))
            .map_err(|_| {
                GatewayError::Configuration(
                    "a gateway client is already running in this process".to_string(),
                )
            })
    }

    pub fn is_held() -> bool {
        SESSION_ACTIVE.load(Ordering::Acquire)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Send a frame to the gateway
    Send(GatewayFrame),
    /// Close the socket and stop the run loop
    Shutdown,
}

/// Lifecycle events emitted by the client
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Socket opened (handshake not yet complete)
    Connected,
    /// READY received
    Ready {
        session_id: String,
        application_id: Option<String>,
    },
    /// RESUMED received
    Resumed,
    /// Connection ended
    Disconnected(Disconnect),
    /// Waiting before the next attempt (consecutive failures so far)
    Reconnecting(usize),
    /// Retry cap reached; the client stopped
    Fatal { attempts: usize, reason: String },
    /// Error occurred
    Error(String),
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub heartbeats_sent: u64,
    pub reconnect_count: u64,
    pub state: GatewayState,
    pub latency: Option<Duration>,
}

/// State shared between the handle and the run task
struct Shared {
    state: AtomicGatewayState,
    metrics: AtomicMetrics,
    session: Mutex<Session>,
    acks: AckTracker,
    /// Wakes the run task while it waits for HELLO
    shutdown: Notify,
}

/// Gateway client
///
/// Owns one tokio task that runs the connect / identify / heartbeat /
/// resume cycle and forwards every decoded frame to the dispatcher.
pub struct GatewayClient {
    shared: Arc<Shared>,
    dispatcher: Arc<EventDispatcher>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
}

impl GatewayClient {
    /// Start the client from configuration
    ///
    /// Called by the builder's `build()`.
    pub(crate) fn start(config: GatewayConfig, guard: SessionGuard) -> Result<Self> {
        let config = Arc::new(config);
        let shared = Arc::new(Shared {
            state: AtomicGatewayState::new(GatewayState::Disconnected),
            metrics: AtomicMetrics::new(),
            session: Mutex::new(Session::new()),
            acks: AckTracker::new(),
            shutdown: Notify::new(),
        });

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        let task_handle = {
            let config = Arc::clone(&config);
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                run_gateway(config, shared, command_rx, event_tx).await;
                drop(guard);
            })
        };

        Ok(Self {
            shared,
            dispatcher: Arc::clone(&config.dispatcher),
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
            shutdown_flag: Arc::clone(&config.shutdown_flag),
        })
    }

    /// Queue an outbound frame (e.g. a presence update)
    pub fn send(&self, frame: GatewayFrame) -> Result<()> {
        self.command_tx
            .send(ClientCommand::Send(frame))
            .map_err(|e| GatewayError::ChannelSend(e.to_string()))
    }

    #[inline]
    pub fn state(&self) -> GatewayState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_steady(&self) -> bool {
        self.shared.state.is_steady()
    }

    /// Copy of the current session record
    pub fn session(&self) -> Session {
        self.shared.session.lock().clone()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.shared.acks.latency()
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn metrics(&self) -> Metrics {
        let metrics = &self.shared.metrics;
        Metrics {
            frames_sent: metrics.frames_sent(),
            frames_received: metrics.frames_received(),
            heartbeats_sent: metrics.heartbeats_sent(),
            reconnect_count: metrics.reconnect_count(),
            state: self.shared.state.get(),
            latency: self.shared.acks.latency(),
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    pub fn recv_event_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<ClientEvent, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Extra receiver for the event stream (events go to whichever receiver reads first)
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.shutdown_flag
    }

    /// Wait for the run task to end on its own (fatal or external shutdown)
    pub async fn wait(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }

    /// Close the socket, stop the run loop and join the dispatcher workers
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down gateway client");

        self.shutdown_flag.store(true, Ordering::Release);
        if !self.shared.state.is_fatal() {
            self.shared.state.set(GatewayState::ShuttingDown);
        }
        let _ = self.command_tx.send(ClientCommand::Shutdown);
        self.shared.shutdown.notify_one();

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        self.dispatcher.shutdown();

        info!("Gateway client shut down");
        Ok(())
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Release);
        let _ = self.command_tx.send(ClientCommand::Shutdown);
        self.shared.shutdown.notify_one();
    }
}

/// Main client task loop
async fn run_gateway(
    config: Arc<GatewayConfig>,
    shared: Arc<Shared>,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: Sender<ClientEvent>,
) {
    let mut plan = ReconnectPlan::Identify;

    loop {
        if config.shutdown_flag.load(Ordering::Acquire) {
            debug!("Shutdown flag is set, exiting gateway loop");
            break;
        }

        let (disconnect, reached_steady) =
            run_connection(&config, &shared, &plan, &mut command_rx, &event_tx).await;

        if disconnect == Disconnect::Shutdown || config.shutdown_flag.load(Ordering::Acquire) {
            debug!("Gateway loop stopping after {:?}", disconnect);
            break;
        }

        warn!("Gateway connection ended: {:?}", disconnect);
        let _ = event_tx.send(ClientEvent::Disconnected(disconnect.clone()));

        let (failures, next_plan) = {
            let mut session = shared.session.lock();
            let failures = if reached_steady {
                session.failed_attempts()
            } else {
                session.record_failure()
            };
            (failures, session.plan_reconnect(&disconnect))
        };
        plan = next_plan;

        let Some(delay) = config.reconnect_strategy.next_delay(failures) else {
            let reason = format!("{:?}", disconnect);
            error!(
                "Gateway failed {} consecutive connection attempts, giving up (last: {})",
                failures, reason
            );
            shared.state.set(GatewayState::Fatal);
            let _ = event_tx.send(ClientEvent::Fatal {
                attempts: failures,
                reason,
            });
            break;
        };

        shared.state.set(match plan {
            ReconnectPlan::Resume { .. } => GatewayState::Resuming,
            ReconnectPlan::Identify => GatewayState::Reidentifying,
        });
        info!(
            "Reconnecting in {:?} ({} consecutive failures, {})",
            delay,
            failures,
            match plan {
                ReconnectPlan::Resume { .. } => "resume",
                ReconnectPlan::Identify => "identify",
            }
        );
        let _ = event_tx.send(ClientEvent::Reconnecting(failures));
        shared.metrics.increment_reconnects();

        // Check shutdown flag periodically during the delay
        let check_interval = Duration::from_millis(100);
        let mut elapsed = Duration::ZERO;
        while elapsed < delay {
            if config.shutdown_flag.load(Ordering::Acquire) {
                debug!("Shutdown flag set during reconnection delay");
                return;
            }
            let sleep_time = check_interval.min(delay - elapsed);
            tokio::time::sleep(sleep_time).await;
            elapsed += sleep_time;
        }
    }

    if !shared.state.is_fatal() {
        shared.state.set(GatewayState::Disconnected);
    }
    info!("Gateway task exiting");
}

/// What the frame handler asks of the connection loop
enum LoopAction {
    Continue,
    HeartbeatNow,
    Disconnect(Disconnect),
}

/// Drive one connection from socket open to disconnect
///
/// Returns why it ended and whether it reached the steady state.
async fn run_connection(
    config: &GatewayConfig,
    shared: &Shared,
    plan: &ReconnectPlan,
    command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: &Sender<ClientEvent>,
) -> (Disconnect, bool) {
    let base = match plan {
        ReconnectPlan::Resume { resume_url, .. } => resume_url.as_str(),
        ReconnectPlan::Identify => config.url.as_str(),
    };
    let url = config.connect_url(base);

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, e);
            let _ = event_tx.send(ClientEvent::Error(e.to_string()));
            return (Disconnect::Transport(e.to_string()), false);
        }
    };

    info!("Connected to {}", url);
    shared.state.set(GatewayState::Handshaking);
    let _ = event_tx.send(ClientEvent::Connected);

    let (mut write, mut read) = ws_stream.split();

    let hello_wait = tokio::select! {
        result = tokio::time::timeout(config.hello_timeout, read_hello(&mut read, shared)) => result,
        _ = shared.shutdown.notified() => {
            debug!("Shutdown requested while waiting for HELLO");
            let _ = write.close().await;
            return (Disconnect::Shutdown, false);
        }
    };
    let hello = match hello_wait {
        Ok(Ok((frame, received_at))) => {
            let hello = serde_json::from_value::<HelloPayload>(frame.d.clone());
            config.dispatcher.dispatch(Arc::new(frame), received_at);
            match hello {
                Ok(hello) if hello.heartbeat_interval == 0 => {
                    error!("HELLO carried a zero heartbeat interval");
                    let _ = write.close().await;
                    return (
                        Disconnect::Protocol("malformed HELLO: zero heartbeat interval".to_string()),
                        false,
                    );
                }
                Ok(hello) => hello,
                Err(e) => {
                    error!("Malformed HELLO payload: {}", e);
                    return (Disconnect::Protocol(format!("malformed HELLO: {}", e)), false);
                }
            }
        }
        Ok(Err(disconnect)) => return (disconnect, false),
        Err(_) => {
            warn!("No HELLO within {:?}", config.hello_timeout);
            let _ = write.close().await;
            return (Disconnect::HelloTimeout, false);
        }
    };

    let interval = Duration::from_millis(hello.heartbeat_interval);
    let schedule = HeartbeatSchedule::with_random_jitter(interval);
    shared.session.lock().on_hello(interval, schedule.jitter());
    shared.acks.reset();

    let (_heartbeat_handle, heartbeat_shutdown, mut heartbeat_rx) = spawn_heartbeat(schedule);

    let outcome = async {
        let (handshake, next_state) = match plan {
            ReconnectPlan::Identify => (
                protocol::identify(&config.token, config.intents, &config.properties),
                GatewayState::Identified,
            ),
            ReconnectPlan::Resume {
                session_id, seq, ..
            } => (
                protocol::resume(&config.token, session_id, *seq),
                GatewayState::Resuming,
            ),
        };
        if let Err(disconnect) = send_frame(&mut write, shared, &handshake).await {
            return (disconnect, false);
        }
        shared.state.set(next_state);
        debug!("Sent handshake op {}", handshake.op);

        message_loop(
            &mut write,
            &mut read,
            config,
            shared,
            command_rx,
            &mut heartbeat_rx,
            event_tx,
        )
        .await
    }
    .await;

    let _ = heartbeat_shutdown.send(());

    let close = match &outcome.0 {
        Disconnect::Closed(_) | Disconnect::Transport(_) => None,
        Disconnect::Shutdown => Some(CloseCode::Normal),
        _ => Some(CloseCode::from(RESUME_CLOSE_CODE)),
    };
    if let Some(code) = close {
        let _ = write
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: Cow::Borrowed("closing"),
            })))
            .await;
        let _ = write.close().await;
    }

    outcome
}

/// Wait for the opening HELLO frame
async fn read_hello(
    read: &mut WsRead,
    shared: &Shared,
) -> std::result::Result<(GatewayFrame, Instant), Disconnect> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let received_at = Instant::now();
                shared.metrics.increment_received();
                let frame = GatewayFrame::parse(&text)
                    .map_err(|e| Disconnect::Protocol(format!("undecodable frame: {}", e)))?;
                if frame.op != opcode::HELLO {
                    return Err(Disconnect::Protocol(format!(
                        "expected HELLO, got op {}",
                        frame.op
                    )));
                }
                return Ok((frame, received_at));
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(Disconnect::Closed(frame.map(|f| u16::from(f.code))));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(Disconnect::Transport(e.to_string())),
            None => return Err(Disconnect::Transport("stream ended before HELLO".to_string())),
        }
    }
}

async fn send_frame(
    write: &mut WsWrite,
    shared: &Shared,
    frame: &GatewayFrame,
) -> std::result::Result<(), Disconnect> {
    let text = frame
        .to_json()
        .map_err(|e| Disconnect::Protocol(format!("failed to encode frame: {}", e)))?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| Disconnect::Transport(e.to_string()))?;
    shared.metrics.increment_sent();
    Ok(())
}

async fn send_heartbeat(write: &mut WsWrite, shared: &Shared) -> std::result::Result<(), Disconnect> {
    let seq = shared.session.lock().seq();
    send_frame(write, shared, &protocol::heartbeat(seq)).await?;
    shared.acks.record_beat_sent();
    shared.metrics.increment_heartbeats();
    debug!("Heartbeat sent (seq {:?})", seq);
    Ok(())
}

/// Main frame processing loop
async fn message_loop(
    write: &mut WsWrite,
    read: &mut WsRead,
    config: &GatewayConfig,
    shared: &Shared,
    command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    heartbeat_rx: &mut mpsc::UnboundedReceiver<u64>,
    event_tx: &Sender<ClientEvent>,
) -> (Disconnect, bool) {
    let mut reached_steady = false;

    loop {
        if config.shutdown_flag.load(Ordering::Acquire) {
            debug!("Shutdown flag detected in message loop");
            return (Disconnect::Shutdown, reached_steady);
        }

        tokio::select! {
            msg = read.next() => {
                let action = match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&text, config, shared, event_tx, &mut reached_steady)
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Ignoring {} byte binary frame (compression is disabled)", data.len());
                        LoopAction::Continue
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        info!(
                            "Gateway closed the connection (code {:?}, reason {:?})",
                            code,
                            frame.as_ref().map(|f| f.reason.to_string())
                        );
                        LoopAction::Disconnect(Disconnect::Closed(code))
                    }
                    Some(Ok(_)) => LoopAction::Continue,
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        LoopAction::Disconnect(Disconnect::Transport(e.to_string()))
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        LoopAction::Disconnect(Disconnect::Closed(None))
                    }
                };

                match action {
                    LoopAction::Continue => {}
                    LoopAction::HeartbeatNow => {
                        debug!("Gateway requested an immediate heartbeat");
                        if let Err(disconnect) = send_heartbeat(write, shared).await {
                            return (disconnect, reached_steady);
                        }
                    }
                    LoopAction::Disconnect(disconnect) => return (disconnect, reached_steady),
                }
            }

            tick = heartbeat_rx.recv() => {
                match tick {
                    Some(beat) => {
                        if !shared.acks.is_acknowledged() {
                            warn!("Heartbeat {} due but the previous one was never acknowledged", beat);
                            return (Disconnect::Zombie, reached_steady);
                        }
                        if let Err(disconnect) = send_heartbeat(write, shared).await {
                            return (disconnect, reached_steady);
                        }
                    }
                    None => {
                        error!("Heartbeat task stopped unexpectedly");
                        return (Disconnect::Zombie, reached_steady);
                    }
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(frame)) => {
                        if let Err(disconnect) = send_frame(write, shared, &frame).await {
                            return (disconnect, reached_steady);
                        }
                    }
                    Some(ClientCommand::Shutdown) | None => {
                        info!("Received shutdown command");
                        return (Disconnect::Shutdown, reached_steady);
                    }
                }
            }
        }
    }
}

/// Decode one text frame, update the session and forward it to the dispatcher
fn handle_text(
    text: &str,
    config: &GatewayConfig,
    shared: &Shared,
    event_tx: &Sender<ClientEvent>,
    reached_steady: &mut bool,
) -> LoopAction {
    let received_at = Instant::now();
    shared.metrics.increment_received();

    let frame = match GatewayFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Undecodable gateway frame: {}", e);
            return LoopAction::Disconnect(Disconnect::Protocol(e.to_string()));
        }
    };

    shared.session.lock().observe_seq(frame.s);

    let action = match frame.op {
        opcode::DISPATCH => match frame.t.as_deref() {
            Some(event::READY) => match serde_json::from_value::<ReadyPayload>(frame.d.clone()) {
                Ok(ready) => {
                    shared.session.lock().on_ready(&ready);
                    shared.state.set(GatewayState::Steady);
                    *reached_steady = true;
                    let _ = event_tx.send(ClientEvent::Ready {
                        session_id: ready.session_id,
                        application_id: ready.application.map(|app| app.id),
                    });
                    LoopAction::Continue
                }
                Err(e) => {
                    error!("Malformed READY payload: {}", e);
                    LoopAction::Disconnect(Disconnect::Protocol(format!("malformed READY: {}", e)))
                }
            },
            Some(event::RESUMED) => {
                shared.session.lock().on_resumed();
                shared.state.set(GatewayState::Steady);
                *reached_steady = true;
                let _ = event_tx.send(ClientEvent::Resumed);
                LoopAction::Continue
            }
            _ => LoopAction::Continue,
        },
        opcode::HEARTBEAT => LoopAction::HeartbeatNow,
        opcode::HEARTBEAT_ACK => {
            shared.acks.record_ack();
            LoopAction::Continue
        }
        opcode::RECONNECT => {
            info!("Gateway requested a reconnect");
            LoopAction::Disconnect(Disconnect::ReconnectRequested)
        }
        opcode::INVALID_SESSION => {
            let resumable = frame.d.as_bool().unwrap_or(false);
            warn!("Gateway invalidated the session (resumable: {})", resumable);
            LoopAction::Disconnect(Disconnect::InvalidSession { resumable })
        }
        opcode::HELLO => {
            debug!("Ignoring repeated HELLO");
            LoopAction::Continue
        }
        other => {
            debug!("Unhandled opcode {}", other);
            LoopAction::Continue
        }
    };

    config.dispatcher.dispatch(Arc::new(frame), received_at);
    action
}
