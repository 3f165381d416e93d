//! Event transport over a byte stream.
//!
//! Byte streams (Unix sockets, TCP, in-memory duplex) have no event
//! boundaries, so each event is prefixed with a 5-byte header:
//!
//! ```text
//! ┌───────┬──────────┬─────────────┐
//! │ Tag   │ Length   │ Payload     │
//! │ 1 byte│ uint32 BE│ Length bytes│
//! └───────┴──────────┴─────────────┘
//! ```
//!
//! Tag `0x01` is UTF-8 text, `0x02` is binary.
//!
//! # Architecture
//!
//! ```text
//! emit() ─► mpsc::UnboundedSender<Bytes> ─► Writer Task ─► AsyncWrite
//! AsyncRead ─► Reader Task ─► EventBuffer ─► on_event(Frame)
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Transport;
use crate::error::{AmError, Result};
use crate::protocol::Frame;

/// Event header size in bytes (tag + length).
pub const EVENT_HEADER_SIZE: usize = 5;

/// Tag for a text event.
pub const TAG_TEXT: u8 = 0x01;

/// Tag for a binary event.
pub const TAG_BINARY: u8 = 0x02;

/// Default maximum event payload size (64 MB).
pub const DEFAULT_MAX_EVENT_SIZE: u32 = 64 * 1024 * 1024;

/// Maximum events to batch in a single write.
const MAX_BATCH_SIZE: usize = 64;

/// Read buffer size for the reader task.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Encode one event with its tag and length prefix.
pub fn encode_event(event: &Frame) -> Result<Bytes> {
    let (tag, payload) = match event {
        Frame::Text(s) => (TAG_TEXT, s.as_bytes()),
        Frame::Binary(b) => (TAG_BINARY, &b[..]),
    };
    let len = u32::try_from(payload.len()).map_err(|_| {
        AmError::Protocol(format!("Event of {} bytes is too large", payload.len()))
    })?;

    let mut buf = BytesMut::with_capacity(EVENT_HEADER_SIZE + payload.len());
    buf.put_u8(tag);
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// State machine for event parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the 5-byte event header.
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { tag: u8, remaining: u32 },
}

/// Buffer for accumulating stream bytes and extracting whole events.
///
/// # Example
///
/// ```
/// use amlink::protocol::Frame;
/// use amlink::transport::{encode_event, EventBuffer};
///
/// let bytes = encode_event(&Frame::from("hello")).unwrap();
/// let mut buffer = EventBuffer::new();
///
/// assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
/// assert_eq!(buffer.push(&bytes[3..]).unwrap(), vec![Frame::from("hello")]);
/// ```
pub struct EventBuffer {
    buffer: BytesMut,
    state: State,
    max_event_size: u32,
}

impl EventBuffer {
    /// Create a buffer with the default maximum event size.
    pub fn new() -> Self {
        Self::with_max_event_size(DEFAULT_MAX_EVENT_SIZE)
    }

    /// Create a buffer rejecting events larger than `max_event_size`.
    pub fn with_max_event_size(max_event_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
            state: State::WaitingForHeader,
            max_event_size,
        }
    }

    /// Push raw bytes and extract all complete events.
    ///
    /// # Errors
    ///
    /// Returns error on an unknown tag, an oversize event, or a text event
    /// that is not valid UTF-8. The stream cannot be resynchronized after
    /// an error.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut events = Vec::new();
        while let Some(event) = self.try_extract_one()? {
            events.push(event);
        }
        Ok(events)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    if self.buffer.len() < EVENT_HEADER_SIZE {
                        return Ok(None);
                    }

                    let tag = self.buffer[0];
                    let len = u32::from_be_bytes([
                        self.buffer[1],
                        self.buffer[2],
                        self.buffer[3],
                        self.buffer[4],
                    ]);

                    if tag != TAG_TEXT && tag != TAG_BINARY {
                        return Err(AmError::Protocol(format!("Unknown event tag 0x{tag:02x}")));
                    }
                    if len > self.max_event_size {
                        return Err(AmError::Protocol(format!(
                            "Event size {} exceeds maximum {}",
                            len, self.max_event_size
                        )));
                    }

                    let _ = self.buffer.split_to(EVENT_HEADER_SIZE);
                    self.state = State::WaitingForPayload {
                        tag,
                        remaining: len,
                    };
                }

                State::WaitingForPayload { tag, remaining } => {
                    let remaining = remaining as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;

                    let event = if tag == TAG_TEXT {
                        let text = String::from_utf8(payload.to_vec()).map_err(|_| {
                            AmError::Protocol("Text event is not valid UTF-8".to_string())
                        })?;
                        Frame::Text(text)
                    } else {
                        Frame::Binary(payload)
                    };
                    return Ok(Some(event));
                }
            }
        }
    }

    /// Number of buffered bytes not yet returned as events.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport writing length-prefixed events to a byte stream.
///
/// Emitting never blocks: events are queued to a dedicated writer task. The
/// transport reports itself unavailable once the writer task has stopped.
#[derive(Debug, Clone)]
pub struct StreamTransport {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl StreamTransport {
    /// Spawn the writer task for `writer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<W>(writer: W) -> (Self, JoinHandle<Result<()>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(writer_loop(rx, writer));
        (Self { tx }, task)
    }
}

impl Transport for StreamTransport {
    fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }

    fn emit(&self, event: Frame) -> Result<()> {
        let encoded = encode_event(&event)?;
        self.tx
            .send(encoded)
            .map_err(|_| AmError::TransportUnavailable)
    }

    /// Encodes the whole message into one buffer so the writer task
    /// receives it as a single item.
    fn emit_message(&self, events: Vec<Frame>) -> Result<()> {
        let mut buf = BytesMut::new();
        for event in &events {
            buf.extend_from_slice(&encode_event(event)?);
        }
        self.tx
            .send(buf.freeze())
            .map_err(|_| AmError::TransportUnavailable)
    }
}

/// Writer loop - drains queued events in batches, one flush per batch.
async fn writer_loop<W>(mut rx: mpsc::UnboundedReceiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = BytesMut::new();

    while let Some(first) = rx.recv().await {
        batch.extend_from_slice(&first);

        let mut count = 1;
        while count < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(next) => {
                    batch.extend_from_slice(&next);
                    count += 1;
                }
                Err(_) => break,
            }
        }

        writer.write_all(&batch).await?;
        writer.flush().await?;
        batch.clear();
    }

    // All transports dropped, clean shutdown.
    writer.shutdown().await?;
    Ok(())
}

/// Spawn a reader task decoding events from `reader`.
///
/// Every decoded event is passed to `on_event` in stream order. The task
/// ends with `Ok(())` at end of stream and with an error on I/O failure,
/// a stream protocol error, or when `on_event` fails.
pub fn spawn_reader<R, F>(reader: R, on_event: F) -> JoinHandle<Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(Frame) -> Result<()> + Send + 'static,
{
    tokio::spawn(read_loop(reader, on_event))
}

async fn read_loop<R, F>(mut reader: R, mut on_event: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(Frame) -> Result<()>,
{
    let mut events = EventBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if !events.is_empty() {
                tracing::warn!(buffered = events.len(), "Stream closed mid-event");
            }
            return Ok(());
        }

        for event in events.push(&buf[..n])? {
            on_event(event)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_encode_layout() {
        let bytes = encode_event(&Frame::from("ab")).unwrap();
        assert_eq!(&bytes[..], &[TAG_TEXT, 0, 0, 0, 2, b'a', b'b']);

        let bytes = encode_event(&Frame::from(vec![9u8])).unwrap();
        assert_eq!(&bytes[..], &[TAG_BINARY, 0, 0, 0, 1, 9]);
    }

    #[test]
    fn test_multiple_events_in_one_push() {
        let mut data = Vec::new();
        data.extend_from_slice(&encode_event(&Frame::from("one")).unwrap());
        data.extend_from_slice(&encode_event(&Frame::from(vec![1u8, 2])).unwrap());
        data.extend_from_slice(&encode_event(&Frame::from("")).unwrap());

        let mut buffer = EventBuffer::new();
        let events = buffer.push(&data).unwrap();

        assert_eq!(
            events,
            vec![Frame::from("one"), Frame::from(vec![1u8, 2]), Frame::from("")]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let data = encode_event(&Frame::from("fragmented")).unwrap();
        let mut buffer = EventBuffer::new();
        let mut all = Vec::new();

        for byte in data.iter() {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all, vec![Frame::from("fragmented")]);
    }

    #[test]
    fn test_unknown_tag() {
        let mut buffer = EventBuffer::new();
        let result = buffer.push(&[0x7F, 0, 0, 0, 0]);
        assert!(result.unwrap_err().to_string().contains("Unknown event tag"));
    }

    #[test]
    fn test_max_event_size() {
        let mut buffer = EventBuffer::with_max_event_size(4);
        let data = encode_event(&Frame::from("too long")).unwrap();
        assert!(buffer
            .push(&data)
            .unwrap_err()
            .to_string()
            .contains("exceeds maximum"));
    }

    #[test]
    fn test_invalid_utf8_text() {
        let mut buffer = EventBuffer::new();
        let result = buffer.push(&[TAG_TEXT, 0, 0, 0, 2, 0xC3, 0x28]);
        assert!(matches!(result, Err(AmError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_stream_transport_round_trip() {
        let (client, server) = duplex(4096);
        let (transport, _writer) = StreamTransport::new(client);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = spawn_reader(server, move |event| {
            tx.send(event).map_err(|_| AmError::ConnectionClosed)
        });

        transport.emit(Frame::from(r#"{"cmd":"x"}"#)).unwrap();
        transport.emit(Frame::from_f32s(&[1.0, 2.0])).unwrap();

        assert_eq!(rx.recv().await.unwrap(), Frame::from(r#"{"cmd":"x"}"#));
        assert_eq!(rx.recv().await.unwrap().to_f32s(), Some(vec![1.0, 2.0]));

        drop(transport);
        assert!(reader.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_emit_message_after_writer_stopped() {
        let (client, _server) = duplex(4096);
        let (transport, task) = StreamTransport::new(client);
        task.abort();
        let _ = task.await;

        assert!(!transport.is_available());
        let result = transport.emit_message(vec![Frame::from("h"), Frame::from(vec![1u8])]);
        assert!(matches!(result, Err(AmError::TransportUnavailable)));
    }

    #[tokio::test]
    async fn test_emit_message_arrives_whole() {
        let (client, server) = duplex(4096);
        let (transport, _writer) = StreamTransport::new(client);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _reader = spawn_reader(server, move |event| {
            tx.send(event).map_err(|_| AmError::ConnectionClosed)
        });

        let events = vec![Frame::from("header"), Frame::from(vec![7u8; 3]), Frame::from("t")];
        transport.emit_message(events.clone()).unwrap();

        for expected in events {
            assert_eq!(rx.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_transport_drop() {
        let (client, _server) = duplex(4096);
        let (transport, task) = StreamTransport::new(client);

        drop(transport);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }
}
