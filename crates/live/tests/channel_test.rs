//! Integration tests for `LiveChannel` against an in-process WebSocket hub.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use ticketflow_live::{LiveChannel, LiveConfig, TicketEvent};
use ticketflow_types::TokenStore;

/// What the fake hub hands the test for each accepted connection.
struct HubConn {
    /// Text frames received from the client.
    inbound: mpsc::UnboundedReceiver<String>,
    /// Directives back to the connection handler.
    control: mpsc::UnboundedSender<Directive>,
}

enum Directive {
    Send(String),
    Close,
}

/// Minimal WebSocket hub: accepts connections and exposes them to the test.
async fn start_hub() -> (String, mpsc::UnboundedReceiver<HubConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let conn_tx = conn_tx.clone();
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut sink, mut stream) = ws.split();
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();
                let _ = conn_tx.send(HubConn {
                    inbound: in_rx,
                    control: ctl_tx,
                });

                loop {
                    tokio::select! {
                        directive = ctl_rx.recv() => match directive {
                            Some(Directive::Send(text)) => {
                                if sink.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Directive::Close) | None => {
                                let _ = sink.send(Message::Close(None)).await;
                                break;
                            }
                        },
                        frame = stream.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                let _ = in_tx.send(text.to_string());
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), conn_rx)
}

fn fast_config() -> LiveConfig {
    LiveConfig {
        heartbeat_interval: Duration::from_secs(5),
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(200),
        credential_poll_interval: Duration::from_millis(50),
    }
}

async fn recv_text(conn: &mut HubConn) -> String {
    timeout(Duration::from_secs(2), conn.inbound.recv())
        .await
        .expect("timed out waiting for client frame")
        .expect("connection closed")
}

#[tokio::test]
async fn join_connects_and_sends_join_invocation() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::new(Some("tok".into())), fast_config());

    channel.join(7);

    let mut conn = timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("no connection")
        .unwrap();
    let frame = recv_text(&mut conn).await;
    assert_eq!(frame, r#"{"type":"joinTicket","ticketId":7}"#);
}

#[tokio::test]
async fn events_fan_out_to_subscribers() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::new(Some("tok".into())), fast_config());
    let mut events = channel.subscribe();

    channel.join(7);
    let mut conn = timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("no connection")
        .unwrap();
    let _join = recv_text(&mut conn).await;

    conn.control
        .send(Directive::Send(
            json!({
                "type": "attachmentDeleted",
                "data": 42
            })
            .to_string(),
        ))
        .unwrap();

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no event")
        .unwrap();
    assert_eq!(event, TicketEvent::AttachmentDeleted(42));
}

#[tokio::test]
async fn rejoins_remembered_ticket_after_reconnect() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::new(Some("tok".into())), fast_config());

    channel.join(9);

    let mut first = timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("no first connection")
        .unwrap();
    assert_eq!(recv_text(&mut first).await, r#"{"type":"joinTicket","ticketId":9}"#);

    // Kill the connection; the client must reconnect and rejoin on its own.
    first.control.send(Directive::Close).unwrap();

    let mut second = timeout(Duration::from_secs(5), conns.recv())
        .await
        .expect("no reconnect")
        .unwrap();
    assert_eq!(
        recv_text(&mut second).await,
        r#"{"type":"joinTicket","ticketId":9}"#
    );
}

#[tokio::test]
async fn leave_clears_rejoin_target() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::new(Some("tok".into())), fast_config());

    channel.join(5);
    let mut first = timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("no connection")
        .unwrap();
    let _join = recv_text(&mut first).await;

    channel.leave(5);
    assert_eq!(recv_text(&mut first).await, r#"{"type":"leaveTicket","ticketId":5}"#);

    // After a reconnect there is nothing to rejoin: the next frame the hub
    // sees from the new connection should not be a join for ticket 5.
    first.control.send(Directive::Close).unwrap();
    let mut second = timeout(Duration::from_secs(5), conns.recv())
        .await
        .expect("no reconnect")
        .unwrap();
    let nothing = timeout(Duration::from_millis(300), second.inbound.recv()).await;
    assert!(nothing.is_err(), "expected no frame, got {nothing:?}");
}

#[tokio::test]
async fn repeated_join_does_not_open_second_connection() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::new(Some("tok".into())), fast_config());

    channel.join(1);
    channel.join(1);
    channel.join(1);

    let _conn = timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("no connection")
        .unwrap();
    let extra = timeout(Duration::from_millis(300), conns.recv()).await;
    assert!(extra.is_err(), "expected a single connection");
}

#[tokio::test]
async fn dropping_all_handles_stops_reconnecting() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::new(Some("tok".into())), fast_config());

    channel.join(4);
    let mut conn = timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("no connection")
        .unwrap();
    let _join = recv_text(&mut conn).await;

    // No handles left: when the hub drops the connection, the task must
    // wind down instead of reconnecting.
    drop(channel);
    conn.control.send(Directive::Close).unwrap();

    let again = timeout(Duration::from_millis(500), conns.recv()).await;
    assert!(again.is_err(), "expected no reconnect after drop");
}

#[tokio::test]
async fn missing_credential_disables_live_updates() {
    let (url, mut conns) = start_hub().await;
    let channel = LiveChannel::with_config(url, TokenStore::default(), fast_config());

    channel.join(3);

    let conn = timeout(Duration::from_millis(300), conns.recv()).await;
    assert!(conn.is_err(), "expected no connection without a credential");
    assert!(!channel.is_connected());
}
