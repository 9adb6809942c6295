use folio_server::connection::serve_connection;
use folio_server::Services;
use folio_storage::EntityStore;
use folio_sync::protocol::{ServerEvent, KEEP_ALIVE};
use folio_types::{Folder, RootIndex, SubscriberId};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spin up the websocket endpoint on an OS-assigned port.
async fn spawn_ws_server() -> (String, Arc<Services>) {
    let store = Arc::new(EntityStore::open_in_memory().unwrap());
    let services = Arc::new(Services::new(store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept_services = services.clone();
    tokio::spawn(async move {
        loop {
            let (stream, peer) = listener.accept().await.unwrap();
            tokio::spawn(serve_connection(accept_services.clone(), stream, peer));
        }
    });
    (format!("ws://127.0.0.1:{}", port), services)
}

async fn connect(url: &str, subscriber_id: Option<SubscriberId>) -> ClientWs {
    let mut request = url.into_client_request().unwrap();
    if let Some(id) = subscriber_id {
        request.headers_mut().insert(
            "sec-websocket-protocol",
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
    }
    let (ws, _) = connect_async(request).await.unwrap();
    ws
}

async fn next_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        match ws.next().await.expect("stream ended").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn first_frame_assigns_a_fresh_subscriber_id() {
    let (url, services) = spawn_ws_server().await;
    let mut ws = connect(&url, None).await;

    let id = match next_event(&mut ws).await {
        ServerEvent::SubId(id) => id,
        other => panic!("expected sub-id first, got {other:?}"),
    };

    // Exactly one durable record, keyed by the assigned id.
    let subs = services.store.all_subscriptions().unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id, id);
}

#[tokio::test]
async fn reconnect_with_presented_id_reuses_the_record() {
    let (url, services) = spawn_ws_server().await;

    let mut first = connect(&url, None).await;
    let id = match next_event(&mut first).await {
        ServerEvent::SubId(id) => id,
        other => panic!("expected sub-id, got {other:?}"),
    };
    first.close(None).await.unwrap();

    let mut second = connect(&url, Some(id)).await;
    match next_event(&mut second).await {
        ServerEvent::SubId(echoed) => assert_eq!(echoed, id),
        other => panic!("expected sub-id, got {other:?}"),
    }

    assert_eq!(services.store.all_subscriptions().unwrap().len(), 1);
}

#[tokio::test]
async fn snapshot_follows_the_root_index_order() {
    let (url, services) = spawn_ws_server().await;
    let a = Folder::new(Some("alpha".into()));
    let b = Folder::new(Some("beta".into()));
    services.store.put_folder(&a).unwrap();
    services.store.put_folder(&b).unwrap();
    services
        .store
        .put_root_index(&RootIndex {
            folder_ids: vec![b.id, a.id],
        })
        .unwrap();

    let mut ws = connect(&url, None).await;
    assert!(matches!(next_event(&mut ws).await, ServerEvent::SubId(_)));
    match next_event(&mut ws).await {
        ServerEvent::GetFolder(folder) => assert_eq!(folder.id, b.id),
        other => panic!("expected get_folder, got {other:?}"),
    }
    match next_event(&mut ws).await {
        ServerEvent::GetFolder(folder) => assert_eq!(folder.id, a.id),
        other => panic!("expected get_folder, got {other:?}"),
    }
}

#[tokio::test]
async fn folder_add_round_trips_through_the_socket() {
    let (url, services) = spawn_ws_server().await;
    let mut ws = connect(&url, None).await;
    assert!(matches!(next_event(&mut ws).await, ServerEvent::SubId(_)));

    // Keep-alives are accepted and ignored.
    ws.send(Message::Text(KEEP_ALIVE.to_string())).await.unwrap();

    ws.send(Message::Text(
        r#"{"type":"folder_add","payload":{"name":"work"}}"#.to_string(),
    ))
    .await
    .unwrap();

    let folder = match next_event(&mut ws).await {
        ServerEvent::AddFolder(folder) => folder,
        other => panic!("expected add_folder, got {other:?}"),
    };
    assert_eq!(folder.name.as_deref(), Some("work"));
    assert_eq!(
        services.store.root_index().unwrap().folder_ids,
        vec![folder.id]
    );
}

#[tokio::test]
async fn unparseable_frame_closes_the_connection() {
    let (url, _services) = spawn_ws_server().await;
    let mut ws = connect(&url, None).await;
    assert!(matches!(next_event(&mut ws).await, ServerEvent::SubId(_)));

    ws.send(Message::Text("{not json".to_string())).await.unwrap();

    loop {
        match ws.next().await {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(_)) => break,
        }
    }
}

#[tokio::test]
async fn binary_frame_closes_the_connection() {
    let (url, services) = spawn_ws_server().await;
    let mut ws = connect(&url, None).await;
    assert!(matches!(next_event(&mut ws).await, ServerEvent::SubId(_)));

    ws.send(Message::Binary(vec![0x01, 0x02])).await.unwrap();

    loop {
        match ws.next().await {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(_)) => break,
        }
    }

    // A validation failure never happened; the record from the handshake
    // remains.
    assert_eq!(services.store.all_subscriptions().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_protocol_header_gets_a_fresh_id() {
    let (url, _services) = spawn_ws_server().await;

    let mut request = url.into_client_request().unwrap();
    request.headers_mut().insert(
        "sec-websocket-protocol",
        HeaderValue::from_static("not-a-uuid"),
    );
    let (mut ws, _) = connect_async(request).await.unwrap();

    match next_event(&mut ws).await {
        ServerEvent::SubId(id) => {
            assert_ne!(id.to_string(), "not-a-uuid");
        }
        other => panic!("expected sub-id, got {other:?}"),
    }
}
