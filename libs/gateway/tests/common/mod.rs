//! Common test utilities for gateway integration tests
//!
//! `MockGateway` plays one script per accepted connection and records every
//! frame the client sends, so tests can assert on IDENTIFY and RESUME
//! payloads across reconnects.

#![allow(dead_code)]

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use inkcord_gateway::{ClientEvent, GatewayClient};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Only one gateway client may run per process; tests that build one hold this
pub static GATEWAY_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

pub const TEST_TOKEN: &str = "test-token";

type ServerWrite = SplitSink<WebSocketStream<TcpStream>, Message>;
type ServerRead = SplitStream<WebSocketStream<TcpStream>>;

/// One scripted server action
#[derive(Debug, Clone)]
pub enum Step {
    /// Send HELLO with this heartbeat interval (ms)
    Hello(u64),
    /// Read client frames until one with this opcode arrives
    Expect(u8),
    /// Dispatch READY; `resume_gateway_url` points back at this server
    Ready { session_id: &'static str, seq: u64 },
    /// Dispatch RESUMED
    Resumed(u64),
    /// Dispatch an arbitrary event
    Dispatch(&'static str, u64, Value),
    /// Send a non-dispatch opcode
    Op(u8, Value),
    /// Send a close frame with this code and end the connection
    Close(u16),
    /// Keep reading until the client goes away, optionally acking heartbeats
    Hold { ack: bool },
}

/// A scripted mock gateway
pub struct MockGateway {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    connections: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<(usize, Value)>>>,
}

impl MockGateway {
    /// Start the server; connection `n` plays `scripts[n]`
    ///
    /// Connections beyond the scripts get no HELLO and are held open.
    pub async fn start(scripts: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let url = format!("ws://{}", addr);

        let shutdown_clone = Arc::clone(&shutdown);
        let connections_clone = Arc::clone(&connections);
        let frames_clone = Arc::clone(&frames);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let index = connections_clone.fetch_add(1, Ordering::SeqCst);
                                let script = scripts
                                    .get(index)
                                    .cloned()
                                    .unwrap_or_else(|| vec![Step::Hold { ack: true }]);
                                let frames = Arc::clone(&frames_clone);
                                let url = url.clone();
                                tokio::spawn(async move {
                                    run_script(stream, index, script, url, frames).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            connections,
            frames,
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Frames the client sent on connection `conn`, in order
    pub fn frames_for(&self, conn: usize) -> Vec<Value> {
        self.frames
            .lock()
            .iter()
            .filter(|(index, _)| *index == conn)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    pub fn ops_for(&self, conn: usize) -> Vec<u64> {
        self.frames_for(conn)
            .iter()
            .filter_map(|frame| frame["op"].as_u64())
            .collect()
    }

    /// Poll until the client sent `op` on connection `conn`
    pub async fn wait_for_frame(&self, conn: usize, op: u64, timeout: Duration) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(frame) = self
                .frames_for(conn)
                .into_iter()
                .find(|frame| frame["op"].as_u64() == Some(op))
            {
                return Some(frame);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_script(
    stream: TcpStream,
    index: usize,
    script: Vec<Step>,
    url: String,
    frames: Arc<Mutex<Vec<(usize, Value)>>>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    for step in script {
        verbose_println!("  [mock conn {}] {:?}", index, step);
        match step {
            Step::Hello(interval) => {
                send(&mut write, json!({"op": 10, "d": {"heartbeat_interval": interval}, "s": null, "t": null})).await;
            }
            Step::Expect(op) => loop {
                match next_frame(&mut read).await {
                    Some(frame) => {
                        frames.lock().push((index, frame.clone()));
                        let received = frame["op"].as_u64();
                        if received == Some(1) {
                            send(&mut write, json!({"op": 11, "d": null, "s": null, "t": null})).await;
                        }
                        if received == Some(op as u64) {
                            break;
                        }
                    }
                    None => return,
                }
            },
            Step::Ready { session_id, seq } => {
                let ready = json!({
                    "v": 10,
                    "session_id": session_id,
                    "resume_gateway_url": url,
                    "application": {"id": "4242", "flags": 0},
                    "user": {"id": "4242", "username": "inkcord-test"},
                    "guilds": [],
                });
                send(&mut write, json!({"op": 0, "d": ready, "s": seq, "t": "READY"})).await;
            }
            Step::Resumed(seq) => {
                send(&mut write, json!({"op": 0, "d": {}, "s": seq, "t": "RESUMED"})).await;
            }
            Step::Dispatch(event, seq, d) => {
                send(&mut write, json!({"op": 0, "d": d, "s": seq, "t": event})).await;
            }
            Step::Op(op, d) => {
                send(&mut write, json!({"op": op, "d": d, "s": null, "t": null})).await;
            }
            Step::Close(code) => {
                let _ = write
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: Cow::Borrowed("mock close"),
                    })))
                    .await;
                // Drain until the client answers the close
                let _ = tokio::time::timeout(Duration::from_secs(1), async {
                    while next_frame(&mut read).await.is_some() {}
                })
                .await;
                return;
            }
            Step::Hold { ack } => {
                while let Some(frame) = next_frame(&mut read).await {
                    frames.lock().push((index, frame.clone()));
                    if ack && frame["op"].as_u64() == Some(1) {
                        send(&mut write, json!({"op": 11, "d": null, "s": null, "t": null})).await;
                    }
                }
                return;
            }
        }
    }
}

async fn send(write: &mut ServerWrite, frame: Value) {
    let _ = write.send(Message::Text(frame.to_string())).await;
}

/// Next JSON text frame; `None` once the client closed or dropped
async fn next_frame(read: &mut ServerRead) -> Option<Value> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                Ok(value) => return Some(value),
                Err(e) => {
                    eprintln!("Client sent invalid JSON: {}", e);
                    return None;
                }
            },
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// Accepts TCP connections and drops them before the WebSocket handshake
pub struct DroppingListener {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl DroppingListener {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let accepted_clone = Arc::clone(&accepted);
        let shutdown_clone = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            accepted_clone.fetch_add(1, Ordering::SeqCst);
                            drop(stream);
                        }
                    }
                    _ = shutdown_clone.notified() => break,
                }
            }
        });

        Self {
            addr,
            accepted,
            shutdown,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for DroppingListener {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

/// Poll the client's event channel until `pred` matches or `timeout` passes
pub async fn wait_for_event<F>(
    client: &GatewayClient,
    timeout: Duration,
    mut pred: F,
) -> Option<ClientEvent>
where
    F: FnMut(&ClientEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        while let Some(event) = client.try_recv_event() {
            verbose_println!("  client event: {:?}", event);
            if pred(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}
