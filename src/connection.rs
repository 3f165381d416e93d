//! Host connection builder and actor loop.
//!
//! The [`ConnectionBuilder`] configures frame limits, request expiry and the
//! log sink. [`ConnectionBuilder::open`] spawns a single actor task that owns
//! the [`Dispatcher`]; every handle talks to it through one unbounded queue:
//!
//! ```text
//! Connection::send() ──┐
//! Connection::call() ──┼─► mpsc::UnboundedSender<Command> ─► Actor ─► Transport::emit_message
//! InboundSink::deliver ┘                                       │
//!                                                              └─► Dispatcher ─► callbacks
//! ```
//!
//! Inbound events and outbound messages share the queue, so a callback
//! registered through [`Connection::call`] is always in place before the
//! response can be processed.
//!
//! # Example
//!
//! ```ignore
//! let (transport, events_to_module) = amlink::transport::channel();
//! let conn = Connection::builder()
//!     .request_timeout(Duration::from_secs(5))
//!     .open(transport);
//!
//! let reply = conn
//!     .request("floatsum", &json!({}), vec![Frame::from_f32s(&values)])
//!     .await?;
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::{AmError, Result};
use crate::handler::{
    CommandCallback, Dispatcher, LogSink, ResponseCallback, TracingLogSink,
};
use crate::protocol::{
    Frame, LogicalMessage, MessageAssembler, OutgoingMessage, RequestId, UNLIMITED_FRAMES,
};
use crate::transport::Transport;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Emit failures of callback-less sends remembered for a later
/// [`Connection::on_response`].
const MAX_FAILED_SENDS: usize = 64;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum frames per message, both directions.
    pub max_frames: u32,
    /// Time a request may stay pending before its callback fails with
    /// [`AmError::RequestExpired`]. `None` keeps requests forever.
    pub request_timeout: Option<Duration>,
    /// How often pending requests are checked for expiry.
    pub sweep_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frames: UNLIMITED_FRAMES,
            request_timeout: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Builder for a [`Connection`].
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    log_sink: Box<dyn LogSink>,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self {
            config: ConnectionConfig::default(),
            log_sink: Box::new(TracingLogSink),
        }
    }

    /// Set the frame limit.
    ///
    /// Incoming headers over the limit are dropped together with their
    /// frames. Default: unlimited
    pub fn max_frames(mut self, max_frames: u32) -> Self {
        self.config.max_frames = max_frames;
        self
    }

    /// Fail requests that get no response within `timeout`.
    ///
    /// Default: no timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Set the expiry sweep interval.
    ///
    /// Default: 100 ms
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set where diagnostic prints from the module go.
    ///
    /// Default: [`TracingLogSink`]
    pub fn log_sink<S: LogSink>(mut self, sink: S) -> Self {
        self.log_sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Spawn the connection actor over `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<T: Transport>(self, transport: T) -> Connection {
        Connection::spawn(Arc::new(transport), self.config, self.log_sink)
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback waiting to be registered by the actor.
struct PendingCallback {
    deadline: Option<Instant>,
    callback: ResponseCallback,
}

enum Command {
    Event(Frame),
    Outbound {
        request: RequestId,
        cmd: String,
        events: Vec<Frame>,
        pending: Option<PendingCallback>,
    },
    Register {
        request: RequestId,
        pending: PendingCallback,
    },
    Unregister(RequestId),
    Subscribe(String, CommandCallback),
    Unsubscribe(String),
    PendingRequests(oneshot::Sender<Vec<RequestId>>),
    Close(oneshot::Sender<()>),
}

struct Shared {
    queue: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    closed: AtomicBool,
}

/// Host side of a connection to a module.
///
/// Cloning is cheap; all clones share one request id counter and one actor.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

/// Where the transport adapter delivers inbound events.
#[derive(Clone)]
pub struct InboundSink {
    queue: mpsc::UnboundedSender<Command>,
}

impl InboundSink {
    /// Queue one event received from the module.
    pub fn deliver(&self, event: Frame) -> Result<()> {
        self.queue
            .send(Command::Event(event))
            .map_err(|_| AmError::ConnectionClosed)
    }
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Open a connection with the default configuration.
    pub fn open<T: Transport>(transport: T) -> Self {
        ConnectionBuilder::new().open(transport)
    }

    fn spawn(
        transport: Arc<dyn Transport>,
        config: ConnectionConfig,
        log_sink: Box<dyn LogSink>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();

        let sweep = config.request_timeout.map(|_| {
            let mut interval = tokio::time::interval(config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let actor = Actor {
            dispatcher: Dispatcher::new(
                MessageAssembler::with_max_frames(config.max_frames),
                log_sink,
            ),
            transport: transport.clone(),
            rx,
            sweep,
            failed_sends: VecDeque::new(),
        };
        let _task: JoinHandle<()> = tokio::spawn(actor.run());

        Self {
            shared: Arc::new(Shared {
                queue,
                next_id: AtomicU64::new(0),
                transport,
                config,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Handle for delivering inbound events.
    pub fn inbound(&self) -> InboundSink {
        InboundSink {
            queue: self.shared.queue.clone(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Send a message and return its request id.
    ///
    /// Validation, the availability check and id allocation happen before
    /// this returns; on error nothing is emitted and no id is consumed. The
    /// header and frames are emitted by the actor as one unit, so a
    /// transport failure at that point sends none of them.
    ///
    /// Such a late failure is not returned here. A callback later registered
    /// for the id with [`on_response`](Self::on_response) is invoked with
    /// the transport error (the last 64 failures are kept). Use
    /// [`call`](Self::call) to send and register atomically.
    pub fn send<A, I, T>(&self, cmd: &str, args: &A, frames: I) -> Result<RequestId>
    where
        A: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
        T: TryInto<Frame>,
        T::Error: Into<AmError>,
    {
        self.submit(cmd, args, frames, None)
    }

    /// Send a message with a one-shot callback for its response.
    ///
    /// The callback runs on the actor with `Ok(message)` for the response,
    /// or with an error if the request expires, the connection closes, or
    /// the transport fails while emitting. If this returns `Err` the callback
    /// is never invoked.
    pub fn call<A, I, T, F>(&self, cmd: &str, args: &A, frames: I, callback: F) -> Result<RequestId>
    where
        A: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
        T: TryInto<Frame>,
        T::Error: Into<AmError>,
        F: FnOnce(Result<LogicalMessage>) + Send + 'static,
    {
        self.submit(cmd, args, frames, Some(Box::new(callback)))
    }

    /// Send a message and wait for its response.
    ///
    /// The message is sent before the returned future is first polled.
    pub fn request<A, I, T>(
        &self,
        cmd: &str,
        args: &A,
        frames: I,
    ) -> impl Future<Output = Result<LogicalMessage>> + Send + 'static
    where
        A: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
        T: TryInto<Frame>,
        T::Error: Into<AmError>,
    {
        let (tx, rx) = oneshot::channel();
        let sent = self.call(cmd, args, frames, move |result| {
            let _ = tx.send(result);
        });

        async move {
            sent?;
            rx.await.map_err(|_| AmError::ConnectionClosed)?
        }
    }

    fn submit<A, I, T>(
        &self,
        cmd: &str,
        args: &A,
        frames: I,
        callback: Option<ResponseCallback>,
    ) -> Result<RequestId>
    where
        A: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
        T: TryInto<Frame>,
        T::Error: Into<AmError>,
    {
        if self.is_closed() {
            return Err(AmError::ConnectionClosed);
        }

        let message = OutgoingMessage::new(cmd, args, frames, self.shared.config.max_frames)?;

        if !self.shared.transport.is_available() {
            return Err(AmError::TransportUnavailable);
        }

        let request = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let events = message.into_events(request)?;
        let pending = callback.map(|callback| PendingCallback {
            deadline: self.deadline(),
            callback,
        });

        self.enqueue(Command::Outbound {
            request,
            cmd: cmd.to_string(),
            events,
            pending,
        })?;
        Ok(request)
    }

    /// Register a one-shot callback for an id returned by [`send`](Self::send).
    ///
    /// A callback already registered for `request` is replaced; it is
    /// invoked with [`AmError::CallbackReplaced`]. If the message for
    /// `request` could not be emitted, `callback` gets that error instead.
    pub fn on_response<F>(&self, request: RequestId, callback: F) -> Result<()>
    where
        F: FnOnce(Result<LogicalMessage>) + Send + 'static,
    {
        self.enqueue(Command::Register {
            request,
            pending: PendingCallback {
                deadline: self.deadline(),
                callback: Box::new(callback),
            },
        })
    }

    /// Remove a pending callback without calling it.
    pub fn remove_response(&self, request: RequestId) -> Result<()> {
        self.enqueue(Command::Unregister(request))
    }

    /// Receive every message for `cmd` that no one-shot callback claims.
    pub fn on_command<F>(&self, cmd: &str, callback: F) -> Result<()>
    where
        F: FnMut(LogicalMessage) + Send + 'static,
    {
        self.enqueue(Command::Subscribe(cmd.to_string(), Box::new(callback)))
    }

    pub fn remove_command(&self, cmd: &str) -> Result<()> {
        self.enqueue(Command::Unsubscribe(cmd.to_string()))
    }

    /// Ids with a callback still registered, in ascending order.
    pub async fn pending_requests(&self) -> Result<Vec<RequestId>> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Command::PendingRequests(tx))?;
        rx.await.map_err(|_| AmError::ConnectionClosed)
    }

    /// Stop the actor.
    ///
    /// Every pending callback is invoked with [`AmError::ConnectionClosed`]
    /// before this returns. Later sends fail with the same error.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (tx, rx) = oneshot::channel();
        if self.shared.queue.send(Command::Close(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.shared
            .config
            .request_timeout
            .map(|timeout| Instant::now() + timeout)
    }

    fn enqueue(&self, command: Command) -> Result<()> {
        if self.is_closed() {
            return Err(AmError::ConnectionClosed);
        }
        self.shared
            .queue
            .send(command)
            .map_err(|_| AmError::ConnectionClosed)
    }
}

/// Single owner of the dispatcher.
struct Actor {
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
    rx: mpsc::UnboundedReceiver<Command>,
    sweep: Option<Interval>,
    failed_sends: VecDeque<(RequestId, AmError)>,
}

impl Actor {
    async fn run(mut self) {
        let closer = loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Close(ack)) => break Some(ack),
                    Some(command) => self.apply(command),
                    None => break None,
                },
                now = next_sweep(&mut self.sweep) => {
                    let expired = self.dispatcher.expire(now);
                    if expired > 0 {
                        tracing::debug!(expired, "Expired pending requests");
                    }
                }
            }
        };

        // Commands queued behind the close still hold callbacks.
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Outbound {
                    pending: Some(pending),
                    ..
                }
                | Command::Register { pending, .. } => {
                    (pending.callback)(Err(AmError::ConnectionClosed));
                }
                _ => {}
            }
        }

        let failed = self.dispatcher.shutdown();
        tracing::debug!(failed, "Connection closed");

        if let Some(ack) = closer {
            let _ = ack.send(());
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Event(event) => {
                let outcome = self.dispatcher.handle_event(event);
                tracing::trace!(?outcome, "Inbound event");
            }
            Command::Outbound {
                request,
                cmd,
                events,
                pending,
            } => self.emit(request, &cmd, events, pending),
            Command::Register { request, pending } => {
                match self.failed_sends.iter().position(|(id, _)| *id == request) {
                    Some(index) => {
                        if let Some((_, error)) = self.failed_sends.remove(index) {
                            (pending.callback)(Err(error));
                        }
                    }
                    None => {
                        self.dispatcher
                            .register(request, "", pending.deadline, pending.callback)
                    }
                }
            }
            Command::Unregister(request) => {
                self.dispatcher.unregister(request);
            }
            Command::Subscribe(cmd, callback) => self.dispatcher.subscribe(&cmd, callback),
            Command::Unsubscribe(cmd) => {
                self.dispatcher.unsubscribe(&cmd);
            }
            Command::PendingRequests(reply) => {
                let _ = reply.send(self.dispatcher.registry().pending_ids());
            }
            // Handled by the run loop.
            Command::Close(_) => {}
        }
    }

    fn emit(
        &mut self,
        request: RequestId,
        cmd: &str,
        events: Vec<Frame>,
        pending: Option<PendingCallback>,
    ) {
        if let Some(pending) = pending {
            self.dispatcher
                .register(request, cmd, pending.deadline, pending.callback);
        }

        let count = events.len();
        if let Err(e) = self.transport.emit_message(events) {
            tracing::error!(request, cmd, error = %e, "Failed to emit message");
            match self.dispatcher.take(request) {
                Some(callback) => callback(Err(e)),
                None => {
                    if self.failed_sends.len() == MAX_FAILED_SENDS {
                        self.failed_sends.pop_front();
                    }
                    self.failed_sends.push_back((request, e));
                }
            }
            return;
        }
        tracing::debug!(request, cmd, events = count, "Message sent");
    }
}

async fn next_sweep(sweep: &mut Option<Interval>) -> Instant {
    match sweep {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}
