//! WebSocket connection endpoint
//!
//! Each accepted connection gets a bounded mailbox registered with the hub
//! and two independent loops:
//!
//! - a writer loop that drains the mailbox onto the wire (coalescing pending
//!   frames) and pings the peer on a fixed cadence, and
//! - a reader loop that only enforces liveness. The protocol is send-only
//!   from server to client, so inbound application data is discarded.
//!
//! Any I/O failure is terminal for that one endpoint only; the sole side
//! effect is an `unregister` submission to the hub.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::hub::hub::{EndpointHandle, HubHandle, MAILBOX_CAPACITY};

/// Inbound message size ceiling; clients have nothing meaningful to send
const MAX_INBOUND_BYTES: usize = 512;

/// Deadline for a single outbound flush
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Transport-level ping period. Must stay below the read deadline: pongs
/// are the only thing that refreshes it, so every healthy peer has to be
/// pinged at least once per deadline window no matter how much data flows.
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Reader deadline, refreshed whenever a pong arrives
const READ_DEADLINE: Duration = Duration::from_secs(60);

/// Per-connection deadlines and ping cadence. The defaults are the
/// production values; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimings {
    pub write_deadline: Duration,
    pub ping_interval: Duration,
    pub read_deadline: Duration,
}

impl Default for ConnectionTimings {
    fn default() -> Self {
        Self {
            write_deadline: WRITE_DEADLINE,
            ping_interval: PING_INTERVAL,
            read_deadline: READ_DEADLINE,
        }
    }
}

/// Origin allow-list for browser connections.
///
/// Requests without an Origin header (non-browser callers) are always
/// accepted; requests with one are accepted only if it is listed.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn permits(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => self.allowed.iter().any(|a| a == origin),
        }
    }
}

/// Accept a WebSocket upgrade and run the endpoint until it dies
pub async fn handle_connection(stream: TcpStream, hub: HubHandle, policy: Arc<OriginPolicy>) {
    handle_connection_with_timings(stream, hub, policy, ConnectionTimings::default()).await
}

/// [`handle_connection`] with explicit deadlines and ping cadence
pub async fn handle_connection_with_timings(
    stream: TcpStream,
    hub: HubHandle,
    policy: Arc<OriginPolicy>,
    timings: ConnectionTimings,
) {
    let addr = stream.peer_addr().ok();

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let origin = request
            .headers()
            .get("Origin")
            .and_then(|v| v.to_str().ok());
        if policy.permits(origin) {
            Ok(response)
        } else {
            tracing::warn!("Refusing upgrade from disallowed origin {:?}", origin);
            let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
            *refusal.status_mut() = StatusCode::FORBIDDEN;
            Err(refusal)
        }
    };

    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_INBOUND_BYTES);

    let ws = match tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(config))
        .await
    {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed for {:?}: {}", addr, e);
            return;
        }
    };

    let id = connection_id();
    tracing::info!("Connection {} established from {:?}", id, addr);

    let (sink, source) = ws.split();
    let (mailbox_tx, mailbox_rx) = mpsc::channel::<String>(MAILBOX_CAPACITY);

    hub.register(EndpointHandle {
        id: id.clone(),
        mailbox: mailbox_tx,
    });

    tokio::spawn(write_loop(sink, mailbox_rx, id.clone(), timings));
    read_loop(source, hub, id, timings).await;
}

fn connection_id() -> String {
    let uuid = uuid::Uuid::new_v4().to_string();
    format!("conn_{}", uuid.split('-').next().unwrap_or("0"))
}

/// Drain the mailbox onto the wire, coalescing pending frames into one
/// newline-joined text frame per flush. The transport ping fires on a fixed
/// cadence regardless of data writes: only the resulting pong refreshes the
/// reader deadline, so a busy connection must still be pinged inside every
/// deadline window. Exits when the mailbox is closed or a write fails.
async fn write_loop(
    mut sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut mailbox: mpsc::Receiver<String>,
    id: String,
    timings: ConnectionTimings,
) {
    let mut ping = tokio::time::interval_at(
        Instant::now() + timings.ping_interval,
        timings.ping_interval,
    );

    loop {
        tokio::select! {
            frame = mailbox.recv() => match frame {
                Some(first) => {
                    let mut joined = first;
                    while let Ok(next) = mailbox.try_recv() {
                        joined.push('\n');
                        joined.push_str(&next);
                    }
                    match timeout(timings.write_deadline, sink.send(Message::Text(joined))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!("Connection {} write failed: {}", id, e);
                            break;
                        }
                        Err(_) => {
                            tracing::warn!("Connection {} write deadline exceeded", id);
                            break;
                        }
                    }
                }
                // Mailbox closed by the hub: say goodbye and stop
                None => {
                    let _ = timeout(timings.write_deadline, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping.tick() => {
                match timeout(timings.write_deadline, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        tracing::debug!("Connection {} ping failed", id);
                        break;
                    }
                }
            }
        }
    }
}

/// Liveness-only reader. Pongs refresh the read deadline; everything else
/// inbound is discarded. On error, deadline, or peer close it unregisters
/// the endpoint.
async fn read_loop(
    mut source: SplitStream<WebSocketStream<TcpStream>>,
    hub: HubHandle,
    id: String,
    timings: ConnectionTimings,
) {
    let mut deadline = Instant::now() + timings.read_deadline;

    loop {
        match timeout_at(deadline, source.next()).await {
            Err(_) => {
                tracing::info!("Connection {} read deadline expired", id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!("Connection {} read error: {}", id, e);
                break;
            }
            Ok(Some(Ok(Message::Pong(_)))) => {
                deadline = Instant::now() + timings.read_deadline;
            }
            Ok(Some(Ok(Message::Close(_)))) => {
                tracing::info!("Connection {} closed by peer", id);
                break;
            }
            // Send-only protocol: inbound content is discarded
            Ok(Some(Ok(_))) => {}
        }
    }

    hub.unregister(&id);
}
