//! WebSocket listener and split connections, on `tokio-tungstenite`.
//!
//! An accepted socket is split into a [`FrameReader`] owned by the
//! connection handler and a [`FrameWriter`] owned by a writer task, so a
//! pending receive never blocks an outgoing broadcast.

use std::io;
use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

type WsStream = WebSocketStream<TcpStream>;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// Binding, accepting, or the WebSocket upgrade failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),
}

/// Listens for WebSocket upgrades on a TCP socket.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds to `addr`. Port `0` picks a free port; read it back with
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Waits for the next client and completes the WebSocket handshake.
    pub async fn accept(&self) -> Result<WebSocketConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            TransportError::AcceptFailed(io::Error::new(io::ErrorKind::ConnectionRefused, e))
        })?;

        tracing::debug!(%addr, "accepted WebSocket connection");
        Ok(WebSocketConnection { ws, addr })
    }
}

/// An upgraded connection, not yet split.
pub struct WebSocketConnection {
    ws: WsStream,
    addr: SocketAddr,
}

impl WebSocketConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn split(self) -> (FrameWriter, FrameReader) {
        let (sink, stream) = self.ws.split();
        (FrameWriter { sink }, FrameReader { stream })
    }
}

/// Outgoing half. Every frame is text; the codec produces strings.
pub struct FrameWriter {
    sink: SplitSink<WsStream, Message>,
}

impl FrameWriter {
    pub async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, e)))
    }

    /// Sends a close frame. Errors are expected if the peer already left.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, e)))
    }
}

/// Incoming half.
pub struct FrameReader {
    stream: SplitStream<WsStream>,
}

impl FrameReader {
    /// Next text or binary payload. `Ok(None)` once the peer closes.
    ///
    /// Ping and pong are answered by tungstenite itself and skipped here.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}
