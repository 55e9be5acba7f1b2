use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use devconnect_net::{Transport, WsTransport};
use devconnect_relay::{serve_on, AppState, RelayConfig};
use devconnect_shared::{ChatId, EventKind, TransportEvent, UserId};

async fn start_relay() -> (String, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(RelayConfig::default());
    tokio::spawn(serve_on(listener, state.clone()));
    (format!("ws://{addr}"), state)
}

async fn wait_for_connections(state: &AppState, n: usize) {
    for _ in 0..100 {
        if state.hub.connection_count().await == n {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never reached {n} connections");
}

#[tokio::test]
async fn relays_events_and_presence_between_clients() {
    let (url, state) = start_relay().await;
    let alice = UserId::new();
    let bob = UserId::new();

    let a = WsTransport::connect(&url, alice).await.unwrap();
    let mut presence = a.on(&EventKind::PRESENCE);
    let mut chat = a.on(&EventKind::CHAT);
    wait_for_connections(&state, 1).await;

    let b = WsTransport::connect(&url, bob).await.unwrap();
    wait_for_connections(&state, 2).await;

    let online = timeout(Duration::from_secs(5), presence.recv()).await.unwrap();
    assert_eq!(online, Some(TransportEvent::UserOnline { user_id: bob }));

    let typing = TransportEvent::Typing {
        chat_id: ChatId::new(),
        user_id: bob,
    };
    b.emit(typing.clone()).await.unwrap();
    let received = timeout(Duration::from_secs(5), chat.recv()).await.unwrap();
    assert_eq!(received, Some(typing));

    drop(b);
    let offline = timeout(Duration::from_secs(5), presence.recv()).await.unwrap();
    assert_eq!(offline, Some(TransportEvent::UserOffline { user_id: bob }));
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (url, _state) = start_relay().await;
    let http = url.replacen("ws://", "", 1);

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut stream = tokio::net::TcpStream::connect(&http).await.unwrap();
    stream
        .write_all(format!("GET /health HTTP/1.1\r\nHost: {http}\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"status\":\"ok\""));
}
