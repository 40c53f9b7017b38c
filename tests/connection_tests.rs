//! Connection endpoint tests over a real WebSocket
//!
//! These bind an ephemeral listener, hand accepted sockets to the
//! connection handler, and drive a `tokio_tungstenite` client against it:
//! upgrade-time Origin enforcement, event delivery through the writer loop
//! (frames may arrive newline-coalesced), transport ping/pong liveness on a
//! busy connection, and the Close frame when the hub closes a mailbox.
//! Timings are shrunk so deadline behavior is observable in test time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pulseboard::hub::{
    handle_connection_with_timings, ConnectionTimings, EventKind, Hub, HubConfig, HubHandle,
    OriginPolicy,
};
use tokio::net::TcpListener;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Accept-loop serving every connection with the given policy and timings
async fn serve(hub: HubHandle, policy: OriginPolicy, timings: ConnectionTimings) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let policy = Arc::new(policy);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let hub = hub.clone();
            let policy = Arc::clone(&policy);
            tokio::spawn(handle_connection_with_timings(stream, hub, policy, timings));
        }
    });

    addr
}

async fn wait_for_count(hub: &HubHandle, expected: usize) {
    for _ in 0..200 {
        if hub.client_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "client_count never reached {} (currently {})",
        expected,
        hub.client_count()
    );
}

#[tokio::test]
async fn test_events_delivered_over_the_wire() {
    let hub = Hub::spawn(HubConfig::default());
    let addr = serve(
        hub.clone(),
        OriginPolicy::default(),
        ConnectionTimings::default(),
    )
    .await;

    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    wait_for_count(&hub, 1).await;

    for n in 0..8 {
        hub.broadcast(EventKind::ActivityLogged, Some(serde_json::json!({"n": n})));
    }

    // The writer may coalesce pending events into one newline-joined frame;
    // delivery order must hold across frame boundaries either way
    let mut seen = 0;
    while seen < 8 {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection ended early")
            .expect("read error");
        if let Message::Text(text) = msg {
            for line in text.lines() {
                let event: serde_json::Value = serde_json::from_str(line).unwrap();
                assert_eq!(event["type"], "activity_logged");
                assert_eq!(event["payload"]["n"], seen);
                seen += 1;
            }
        }
    }
}

#[tokio::test]
async fn test_upgrade_refused_for_disallowed_origin() {
    let hub = Hub::spawn(HubConfig::default());
    let policy = OriginPolicy::new(vec!["http://localhost:3000".to_string()]);
    let addr = serve(hub.clone(), policy, ConnectionTimings::default()).await;

    let mut request = format!("ws://{}", addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://evil.example".parse().unwrap());

    match connect_async(request).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 403),
        other => panic!("expected 403 refusal, got {:?}", other.map(|_| "connected")),
    }
    assert_eq!(hub.client_count(), 0);

    // The same listener accepts an allow-listed origin
    let mut request = format!("ws://{}", addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://localhost:3000".parse().unwrap());
    let (_ws, _) = connect_async(request).await.unwrap();
    wait_for_count(&hub, 1).await;
}

/// A client receiving steady traffic must still be pinged: pongs are the
/// only thing refreshing the read deadline, so without an unconditional
/// ping cadence the server would drop every healthy client at the deadline.
#[tokio::test]
async fn test_busy_connection_stays_alive_past_read_deadline() {
    let hub = Hub::spawn(HubConfig {
        // Steady application traffic, far more frequent than the ping
        heartbeat_interval: Duration::from_millis(100),
    });
    let timings = ConnectionTimings {
        write_deadline: Duration::from_secs(5),
        ping_interval: Duration::from_millis(200),
        read_deadline: Duration::from_secs(1),
    };
    let addr = serve(hub.clone(), OriginPolicy::default(), timings).await;

    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    wait_for_count(&hub, 1).await;

    // Poll well past several read-deadline windows; polling also answers
    // the server's pings with pongs
    let cutoff = Instant::now() + Duration::from_millis(2500);
    let mut pinged = false;
    let mut frames = 0;
    loop {
        match timeout_at(cutoff, ws.next()).await {
            Err(_) => break,
            Ok(Some(Ok(Message::Ping(_)))) => pinged = true,
            Ok(Some(Ok(Message::Text(_)))) => frames += 1,
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                panic!("server dropped an actively-receiving client after {} frames", frames)
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => panic!("read error on a healthy connection: {}", e),
        }
    }

    assert!(pinged, "busy connection was never pinged");
    assert!(frames >= 10, "expected steady heartbeats, got {}", frames);
    assert_eq!(hub.client_count(), 1);
}

/// When the reader deadline expires with no pong, the endpoint is
/// unregistered and the writer says goodbye with a Close frame.
#[tokio::test]
async fn test_silent_peer_gets_close_frame() {
    let hub = Hub::spawn(HubConfig::default());
    let timings = ConnectionTimings {
        write_deadline: Duration::from_secs(5),
        // Ping far beyond the deadline so the silent peer is never woken
        ping_interval: Duration::from_secs(30),
        read_deadline: Duration::from_millis(300),
    };
    let addr = serve(hub.clone(), OriginPolicy::default(), timings).await;

    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    wait_for_count(&hub, 1).await;

    // Not polling means no pongs; the server must give up on its own
    tokio::time::sleep(Duration::from_millis(600)).await;
    wait_for_count(&hub, 0).await;

    let mut got_close = false;
    loop {
        match timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Close(_))) => {
                got_close = true;
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(_)) | None => break,
        }
    }
    assert!(got_close, "expected a Close frame from the server");
}
