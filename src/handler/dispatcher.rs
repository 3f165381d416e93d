//! Dispatcher - routes assembled messages to their callbacks.
//!
//! Owns the assembler, the request registry, the command subscriptions and
//! the log sink. It is a plain single-threaded value; the connection actor
//! is the only owner at runtime.
//!
//! Routing order for a completed message:
//! 1. pending one-shot callback for its request id
//! 2. persistent subscription for its command
//! 3. dropped

use tokio::time::Instant;

use super::{CommandCallback, CommandSubscriptions, LogSink, RequestRegistry, ResponseCallback};
use crate::error::AmError;
use crate::protocol::{Assembled, Frame, LogicalMessage, MessageAssembler, RequestId};

/// What happened to an event or message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Event consumed, message not complete yet (or event discarded).
    Pending,
    /// Diagnostic line forwarded to the log sink.
    Diagnostic,
    /// Delivered to the one-shot callback for this request.
    Response(RequestId),
    /// Delivered to the subscription for this command.
    Subscription(String),
    /// Nobody was waiting; message dropped.
    Dropped(RequestId),
}

/// Single owner of all inbound routing state.
pub struct Dispatcher {
    assembler: MessageAssembler,
    responses: RequestRegistry,
    commands: CommandSubscriptions,
    log_sink: Box<dyn LogSink>,
}

impl Dispatcher {
    /// Create a dispatcher around an assembler and a log sink.
    pub fn new(assembler: MessageAssembler, log_sink: Box<dyn LogSink>) -> Self {
        Self {
            assembler,
            responses: RequestRegistry::new(),
            commands: CommandSubscriptions::new(),
            log_sink,
        }
    }

    /// Feed one transport event through the assembler and route the result.
    pub fn handle_event(&mut self, event: Frame) -> Dispatch {
        match self.assembler.push(event) {
            None => Dispatch::Pending,
            Some(Assembled::Diagnostic(diagnostic)) => {
                self.log_sink.log(&diagnostic.text);
                Dispatch::Diagnostic
            }
            Some(Assembled::Message(message)) => self.dispatch_or_drop(message),
        }
    }

    /// Route a completed message.
    pub fn dispatch_or_drop(&mut self, message: LogicalMessage) -> Dispatch {
        let id = message.request_id();

        let message = match self.responses.complete(message) {
            Ok(()) => return Dispatch::Response(id),
            Err(message) => message,
        };

        let cmd = message.cmd().to_string();
        match self.commands.deliver(message) {
            Ok(()) => Dispatch::Subscription(cmd),
            Err(_) => {
                tracing::debug!(request = id, cmd = %cmd, "No callback for message, dropping");
                Dispatch::Dropped(id)
            }
        }
    }

    /// Register a one-shot response callback.
    ///
    /// A callback already waiting on `id` is invoked with
    /// [`AmError::CallbackReplaced`].
    pub fn register(
        &mut self,
        id: RequestId,
        cmd: &str,
        deadline: Option<Instant>,
        callback: ResponseCallback,
    ) {
        if let Some(displaced) = self.responses.register(id, cmd, deadline, callback) {
            displaced(Err(AmError::CallbackReplaced(id)));
        }
    }

    pub fn unregister(&mut self, id: RequestId) -> bool {
        self.responses.unregister(id)
    }

    /// Remove a pending callback and hand it back uninvoked.
    pub fn take(&mut self, id: RequestId) -> Option<ResponseCallback> {
        self.responses.take(id)
    }

    pub fn subscribe(&mut self, cmd: &str, callback: CommandCallback) {
        self.commands.subscribe(cmd, callback);
    }

    pub fn unsubscribe(&mut self, cmd: &str) -> bool {
        self.commands.unsubscribe(cmd)
    }

    /// Fail requests whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> usize {
        self.responses.expire(now)
    }

    /// Fail every outstanding request and drop any partial message.
    pub fn shutdown(&mut self) -> usize {
        self.assembler.reset();
        self.responses.fail_all(|_| AmError::ConnectionClosed)
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.responses
    }

    pub fn assembler(&self) -> &MessageAssembler {
        &self.assembler
    }
}
