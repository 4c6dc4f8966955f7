use std::sync::Arc;

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use devctl_protocol::{ErrorShape, RequestFrame, ResponseFrame, error_codes};

use crate::{
    methods::{MethodContext, MethodRegistry},
    state::GatewayState,
};

/// Keeps the open-connection count honest however the session ends.
struct ConnectionGuard {
    state: Arc<GatewayState>,
    conn_id: String,
}

impl ConnectionGuard {
    fn open(state: &Arc<GatewayState>, conn_id: &str) -> Self {
        let open = state.connection_opened();
        info!(conn_id = %conn_id, open, "ws: connection opened");
        Self {
            state: Arc::clone(state),
            conn_id: conn_id.to_string(),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.state.connection_closed();
        info!(conn_id = %self.conn_id, open, "ws: connection closed");
    }
}

/// Serve one WebSocket client until it disconnects or the gateway stops.
///
/// Every text frame is one request. Requests run concurrently, so replies
/// may arrive out of order; clients correlate them by `id`. Once the gateway
/// stops, no further frame is read.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    methods: Arc<MethodRegistry>,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let _guard = ConnectionGuard::open(&state, &conn_id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    // Writer task: forwards serialized frames to the socket, then closes it.
    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(text) = client_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write failed, closing writer");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let msg = tokio::select! {
            biased;
            () = state.shutdown.cancelled() => {
                debug!(conn_id = %conn_id, "ws: gateway stopping");
                break;
            },
            msg = ws_rx.next() => msg,
        };

        let text = match msg {
            Some(Ok(Message::Text(t))) => t.to_string(),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            },
        };

        let frame: RequestFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "ws: malformed frame");
                send_frame(
                    &client_tx,
                    &ResponseFrame::err(
                        "",
                        ErrorShape::new(
                            error_codes::INVALID_REQUEST,
                            format!("malformed request frame: {e}"),
                        ),
                    ),
                );
                continue;
            },
        };

        let ctx = MethodContext {
            request_id: frame.id,
            method: frame.method,
            params: frame.params,
            client_conn_id: conn_id.clone(),
            state: Arc::clone(&state),
        };
        let methods = Arc::clone(&methods);
        let tx = client_tx.clone();
        state.sessions.spawn(async move {
            let response = methods.dispatch(ctx).await;
            send_frame(&tx, &response);
        });
    }

    drop(client_tx);
    // In-flight calls hold their own senders; the writer drains them and exits.
    let _ = write_handle.await;
}

fn send_frame(tx: &mpsc::UnboundedSender<String>, frame: &ResponseFrame) {
    match serde_json::to_string(frame) {
        Ok(text) => {
            let _ = tx.send(text);
        },
        Err(e) => warn!(error = %e, "ws: failed to serialize response frame"),
    }
}
