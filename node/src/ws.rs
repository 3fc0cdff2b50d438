//! Live change channel over WebSocket
//!
//! Each connection is one observer session. Frames flow server to client
//! only; anything the client sends other than a close is ignored.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use ballotbox_broadcast::{ObserverError, Subscription};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tracing::{debug, error, warn};

use crate::api::{ApiResult, ApiState};

/// Upgrade to an observer session. Full nodes answer 503 before the upgrade.
pub async fn observe_changes(
    State(runtime): State<ApiState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    upgrade: WebSocketUpgrade,
) -> ApiResult<Response> {
    let remote = remote.map(|ConnectInfo(addr)| addr.to_string());
    let subscription = runtime.subscribe(remote)?;

    Ok(upgrade.on_upgrade(move |socket| forward_changes(socket, subscription)))
}

async fn forward_changes(socket: WebSocket, mut subscription: Subscription) {
    let session = subscription.session_id();
    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            next = subscription.recv() => match next {
                Ok(frame) => {
                    let text = match frame.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Cannot encode event #{}: {}", frame.sequence, e);
                            continue;
                        }
                    };
                    if outgoing.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(ObserverError::Lagged(missed)) => {
                    warn!("Observer {} lagged by {} events, closing", session, missed);
                    let _ = outgoing
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "lagged, reload the ballot".into(),
                        })))
                        .await;
                    break;
                }
                Err(ObserverError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Observer {} stream finished", session);
}
