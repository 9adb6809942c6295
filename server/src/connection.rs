//! Per-connection websocket handling.
//!
//! Each accepted socket gets a writer task draining an unbounded frame
//! channel, and a read loop feeding the mutation engine. The first
//! outbound frame is always the `sub-id` assignment, followed by a
//! snapshot of every root-index folder, so a client can render without
//! issuing any request.

use crate::Services;
use folio_storage::StorageError;
use folio_sync::protocol::{ClientRequest, ServerEvent, KEEP_ALIVE};
use folio_sync::{now_ms, Admission, ConnectionCtx, FOLDERS_TOPIC};
use folio_types::{SubscriberId, Subscription};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::unbounded_channel;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, info, warn};

/// Handshake header carrying the client's persistent subscriber id.
const PROTOCOL_HEADER: &str = "sec-websocket-protocol";

#[derive(Debug, Error)]
enum ConnectionError {
    #[error(transparent)]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Serves one websocket connection to completion. Errors end the
/// connection and are logged here; they never take the process down.
pub async fn serve_connection(services: Arc<Services>, stream: TcpStream, peer: SocketAddr) {
    if let Err(err) = run(services, stream, peer).await {
        warn!(%peer, %err, "connection ended with error");
    }
}

async fn run(
    services: Arc<Services>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), ConnectionError> {
    // Handshakes count against the same window as messages.
    services.limiter.record_connect(peer.ip());

    // The client presents its persistent id as the websocket subprotocol;
    // RFC 6455 requires echoing the accepted value back. Absent or
    // malformed ids get a fresh identity.
    let mut presented: Option<SubscriberId> = None;
    let ws = accept_hdr_async(stream, |req: &Request, mut resp: Response| {
        if let Some(value) = req.headers().get(PROTOCOL_HEADER) {
            if let Ok(raw) = value.to_str() {
                presented = raw.trim().parse().ok();
            }
            resp.headers_mut().insert(PROTOCOL_HEADER, value.clone());
        }
        Ok(resp)
    })
    .await?;
    let subscriber_id = presented.unwrap_or_else(SubscriberId::new);

    let (mut sink, mut reader) = ws.split();
    let (tx, mut rx) = unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let conn_id = services.topics.register();
    let ctx = ConnectionCtx {
        conn_id,
        subscriber_id,
        outbound: tx,
    };

    let result = session(&services, &ctx, &mut reader, peer).await;

    services.topics.unsubscribe_all(conn_id);
    drop(ctx);
    let _ = writer.await;
    result
}

async fn session(
    services: &Services,
    ctx: &ConnectionCtx,
    reader: &mut SplitStream<WebSocketStream<TcpStream>>,
    peer: SocketAddr,
) -> Result<(), ConnectionError> {
    // A returning client keeps its single subscription record; a new
    // client gets exactly one.
    if services.store.get_subscription(&ctx.subscriber_id)?.is_some() {
        services
            .store
            .touch_subscription(&ctx.subscriber_id, now_ms())?;
    } else {
        services
            .store
            .put_subscription(&Subscription::new(ctx.subscriber_id, now_ms()))?;
    }

    // Identity first, then the folder snapshot.
    send(ctx, &ServerEvent::SubId(ctx.subscriber_id))?;
    services
        .topics
        .subscribe(FOLDERS_TOPIC, ctx.conn_id, ctx.outbound.clone());

    let index = services.store.root_index()?;
    for folder in services.store.folders_by_ids(&index.folder_ids)? {
        send(ctx, &ServerEvent::GetFolder(folder))?;
    }
    info!(%peer, subscriber = %ctx.subscriber_id, "client connected");

    while let Some(msg) = reader.next().await {
        match msg? {
            Message::Text(text) => {
                if services.limiter.record_message(peer.ip()) == Admission::Close {
                    info!(%peer, "closing blocked source");
                    break;
                }
                if text == KEEP_ALIVE {
                    continue;
                }
                match ClientRequest::decode(&text) {
                    Ok(request) => {
                        debug!(op = request.op_name(), "request");
                        services.engine.handle(ctx, request).await;
                    }
                    Err(err) => {
                        // Protocol errors are fatal for the connection.
                        warn!(%peer, %err, "unparseable frame, closing");
                        break;
                    }
                }
            }
            Message::Binary(_) => {
                warn!(%peer, "binary frame not supported, closing");
                break;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    info!(%peer, "client disconnected");
    Ok(())
}

fn send(ctx: &ConnectionCtx, event: &ServerEvent) -> Result<(), ConnectionError> {
    let frame = event.encode()?;
    // A send failure means the writer is gone; the read loop notices.
    let _ = ctx.outbound.send(frame);
    Ok(())
}
