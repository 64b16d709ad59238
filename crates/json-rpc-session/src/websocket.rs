//! WebSocket host driver
//!
//! Binds a [`Session`] to a tokio-tungstenite stream. The message size limit is
//! enforced by tungstenite while frames are read, and again before a message
//! reaches the session; writes go through a [`ChannelTransport`] drained by a
//! dedicated writer task.

use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::framing::MessageAssembler;
use crate::session::{CallHandler, Session};
use crate::transport::{ChannelTransport, OutboundFrame};

/// One WebSocket connection driving one session
pub struct WebSocketConnection<S> {
    session: Session,
    source: SplitStream<WebSocketStream<S>>,
    writer: JoinHandle<()>,
    assembler: MessageAssembler,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an established WebSocket. Must be called from within a tokio runtime.
    ///
    /// Streams set up by the caller should use [`websocket_config`] so oversized
    /// messages are refused before they are buffered.
    pub fn new(stream: WebSocketStream<S>, handler: Arc<dyn CallHandler>, config: SessionConfig) -> Self {
        let (sink, source) = stream.split();
        let (transport, outbound) = ChannelTransport::new();
        let assembler = MessageAssembler::new(config.max_message_bytes);
        let session = Session::with_shared_handler(transport, handler, config);
        let writer = tokio::spawn(write_frames(sink, outbound));

        Self {
            session,
            source,
            writer,
            assembler,
        }
    }

    /// The session, for issuing requests to the peer
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read until the peer disconnects, then close the session
    pub async fn run(mut self) {
        while let Some(message) = self.source.next().await {
            let message = match message {
                Ok(message) => message,
                Err(WsError::Capacity(e)) => {
                    warn!(error = %e, "Closing connection");
                    self.session.abort(&self.session.config().oversize_reason);
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket read failed");
                    break;
                }
            };

            let payload: &[u8] = match &message {
                Message::Binary(bytes) => bytes,
                Message::Text(text) => text.as_str().as_bytes(),
                Message::Close(_) => break,
                _ => continue,
            };

            match self.assembler.push(payload, true) {
                Ok(Some(bytes)) => self.session.receive_message(&bytes),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Closing connection");
                    self.session.abort(&self.session.config().oversize_reason);
                    break;
                }
            }
        }

        self.session.close();
        self.session.disconnect();
        if let Err(e) = self.writer.await {
            debug!(error = %e, "WebSocket writer task failed");
        }
    }
}

/// Transport limits matching the session's message size limit
pub fn websocket_config(config: &SessionConfig) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(config.max_message_bytes))
        .max_frame_size(Some(config.max_message_bytes))
}

/// Complete the WebSocket handshake on an accepted TCP connection
pub async fn accept(
    tcp: TcpStream,
    handler: Arc<dyn CallHandler>,
    config: SessionConfig,
) -> Result<WebSocketConnection<TcpStream>, SessionError> {
    let stream = tokio_tungstenite::accept_async_with_config(tcp, Some(websocket_config(&config)))
        .await
        .map_err(TransportError::from)?;
    Ok(WebSocketConnection::new(stream, handler, config))
}

async fn write_frames<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: UnboundedReceiver<OutboundFrame>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        let message = match frame {
            OutboundFrame::Binary(bytes) => Message::binary(bytes),
            OutboundFrame::Text(text) => Message::text(text),
            OutboundFrame::Close => {
                if let Err(e) = sink.close().await {
                    debug!(error = %e, "WebSocket close failed");
                }
                return;
            }
        };

        if let Err(e) = sink.send(message).await {
            debug!(error = %e, "WebSocket write failed");
            return;
        }
    }
}
