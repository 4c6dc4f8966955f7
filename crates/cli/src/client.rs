//! One-shot WebSocket client for `devctl call`.

use {
    anyhow::{Context, bail},
    futures::{SinkExt, StreamExt},
    tokio_tungstenite::tungstenite::Message,
    tracing::debug,
};

use devctl_protocol::{RequestFrame, ResponseFrame};

/// Send one request frame to `url` and wait for the reply with the same id.
pub async fn call(
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<ResponseFrame> {
    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    let request = RequestFrame::new(uuid::Uuid::new_v4().to_string(), method, params);
    let text = serde_json::to_string(&request)?;
    debug!(id = %request.id, method, "sending request");
    ws.send(Message::Text(text.into()))
        .await
        .context("failed to send request")?;

    while let Some(msg) = ws.next().await {
        let Message::Text(text) = msg.context("connection error")? else {
            continue;
        };
        let frame: ResponseFrame =
            serde_json::from_str(&text).context("gateway sent a malformed frame")?;
        if frame.id == request.id {
            let _ = ws.close(None).await;
            return Ok(frame);
        }
        debug!(id = %frame.id, "ignoring unrelated frame");
    }

    bail!("connection closed before a reply arrived")
}
