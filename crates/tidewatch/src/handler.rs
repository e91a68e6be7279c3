//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]:
//!   1. Register an outbox with the hub → `Welcome` with the player id
//!   2. Spawn a writer task that drains the outbox into the socket
//!   3. Loop: receive frames → decode → dispatch through the hub
//!
//! The loop ends when the peer closes, sends `Disconnect`, errors, or
//! stays silent past the idle timeout. The player is then removed from
//! their session.

use std::sync::Arc;
use std::time::Duration;

use tidewatch_protocol::{
    ClientMessage, Codec, Envelope, ErrorKind, PlayerId, ProtocolError, ServerMessage,
    unix_millis,
};
use tokio::sync::mpsc;

use crate::TidewatchError;
use crate::hub::{Hub, Outbox};
use crate::transport::{FrameWriter, WebSocketConnection};

/// Drop guard that removes the player from the hub when the handler
/// exits, even on panic. `Drop` is synchronous, so the async cleanup is
/// spawned.
struct DepartureGuard {
    player_id: PlayerId,
    hub: Arc<Hub>,
}

impl Drop for DepartureGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            hub.disconnect(player_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec + Clone>(
    conn: WebSocketConnection,
    hub: Arc<Hub>,
    codec: C,
    idle_timeout: Duration,
) -> Result<(), TidewatchError> {
    let addr = conn.peer_addr();
    let (writer, mut reader) = conn.split();

    let (outbox, inbox) = mpsc::unbounded_channel();
    let player_id = hub.connect(outbox.clone()).await;
    let _guard = DepartureGuard {
        player_id,
        hub: Arc::clone(&hub),
    };
    tokio::spawn(write_loop(writer, inbox, codec.clone(), player_id));

    tracing::info!(%player_id, %addr, "player connected");

    loop {
        let data = match tokio::time::timeout(idle_timeout, reader.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let message: ClientMessage = match ensure_text(&data).and_then(|()| codec.decode(&data)) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode message");
                send_error(&outbox, 400, ErrorKind::BadRequest, "malformed message");
                continue;
            }
        };

        if let ClientMessage::Disconnect { reason } = &message {
            tracing::info!(%player_id, %reason, "client disconnected");
            break;
        }

        hub.dispatch(player_id, message).await;
    }

    // _guard drops here → the hub forgets the outbox, the writer task
    // drains what is queued, then closes the socket.
    Ok(())
}

/// Drains the outbox into the socket, wrapping each message in an
/// envelope. Ends once every sender is gone or the socket fails.
async fn write_loop<C: Codec>(
    mut writer: FrameWriter,
    mut inbox: mpsc::UnboundedReceiver<ServerMessage>,
    codec: C,
    player_id: PlayerId,
) {
    let mut seq: u64 = 1;
    while let Some(message) = inbox.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: unix_millis(),
            message,
        };
        let text = match codec.encode(&envelope) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = writer.send_text(text).await {
            tracing::debug!(%player_id, error = %e, "send failed, stopping writer");
            return;
        }
    }
    let _ = writer.close().await;
}

/// Frames must carry UTF-8 JSON even when sent as binary.
fn ensure_text(data: &[u8]) -> Result<(), ProtocolError> {
    std::str::from_utf8(data)
        .map(|_| ())
        .map_err(|e| ProtocolError::InvalidMessage(format!("frame is not UTF-8: {e}")))
}

fn send_error(outbox: &Outbox, code: u16, kind: ErrorKind, message: &str) {
    let _ = outbox.send(ServerMessage::error(code, kind, message));
}

fn next_seq(seq: &mut u64) -> u64 {
    let s = *seq;
    *seq += 1;
    s
}
