//! In-memory transport backed by a tokio unbounded channel.
//!
//! Emitted events land in the paired [`EventReceiver`]. The transport can
//! be detached to simulate a missing remote endpoint.
//!
//! # Example
//!
//! ```
//! use amlink::protocol::Frame;
//! use amlink::transport::{channel, Transport};
//!
//! let (transport, mut events) = channel();
//! transport.emit(Frame::from("hi")).unwrap();
//! assert_eq!(events.try_recv().unwrap(), Frame::from("hi"));
//!
//! transport.detach();
//! assert!(transport.emit(Frame::from("lost")).is_err());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::Transport;
use crate::error::{AmError, Result};
use crate::protocol::Frame;

/// Receiving end of a [`ChannelTransport`].
pub type EventReceiver = mpsc::UnboundedReceiver<Frame>;

/// Create a connected transport/receiver pair.
pub fn channel() -> (ChannelTransport, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = ChannelTransport {
        tx,
        attached: Arc::new(AtomicBool::new(true)),
    };
    (transport, rx)
}

/// Transport that forwards events into an in-process channel.
///
/// Clones share the channel and the attached flag.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Frame>,
    attached: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Mark the remote endpoint as present.
    pub fn attach(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Mark the remote endpoint as absent; later emits fail.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }
}

impl Transport for ChannelTransport {
    fn is_available(&self) -> bool {
        self.attached.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn emit(&self, event: Frame) -> Result<()> {
        if !self.attached.load(Ordering::Acquire) {
            return Err(AmError::TransportUnavailable);
        }
        self.tx
            .send(event)
            .map_err(|_| AmError::TransportUnavailable)
    }

    fn emit_message(&self, events: Vec<Frame>) -> Result<()> {
        if !self.is_available() {
            return Err(AmError::TransportUnavailable);
        }
        for event in events {
            self.tx
                .send(event)
                .map_err(|_| AmError::TransportUnavailable)?;
        }
        Ok(())
    }
}
