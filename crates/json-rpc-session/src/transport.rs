//! Transport seam for sessions
//!
//! The session never frames bytes itself. It hands complete messages to a
//! [`Transport`] and relies on it to deliver them as discrete units.

use tokio::sync::mpsc;

use crate::config::FrameKind;
use crate::error::TransportError;

/// One outbound unit handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Binary(Vec<u8>),
    Text(String),
    /// Close the connection after everything queued before it
    Close,
}

impl OutboundFrame {
    /// Wrap an encoded JSON message in the configured frame type
    pub fn message(kind: FrameKind, bytes: Vec<u8>) -> Self {
        match kind {
            FrameKind::Binary => OutboundFrame::Binary(bytes),
            // serde_json only produces UTF-8
            FrameKind::Text => match String::from_utf8(bytes) {
                Ok(text) => OutboundFrame::Text(text),
                Err(e) => OutboundFrame::Binary(e.into_bytes()),
            },
        }
    }

    /// Payload bytes of a data frame
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            OutboundFrame::Binary(bytes) => Some(bytes),
            OutboundFrame::Text(text) => Some(text.as_bytes()),
            OutboundFrame::Close => None,
        }
    }
}

/// Transport trait defining the interface a session writes through.
///
/// Calls are serialized by the session's transport lock, so implementations never
/// see two writes at once.
pub trait Transport: Send {
    /// Send one complete message
    fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError>;

    /// Close the connection
    fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the transport still accepts frames
    fn is_open(&self) -> bool {
        true
    }
}

/// Type alias for a boxed transport
pub type BoxedTransport = Box<dyn Transport>;

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Transport that queues frames on an unbounded channel.
///
/// A writer task on the other end drains the queue into the real connection, so
/// `send` never blocks on network I/O.
#[derive(Debug)]
pub struct ChannelTransport {
    sender: Option<mpsc::UnboundedSender<OutboundFrame>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let sender = self.sender.as_ref().ok_or(TransportError::Closed)?;
        sender.send(frame).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.sender.take() {
            Some(sender) => sender.send(OutboundFrame::Close).map_err(|_| TransportError::Closed),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.sender.as_ref().is_some_and(|sender| !sender.is_closed())
    }
}
