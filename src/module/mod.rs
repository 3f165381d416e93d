//! Module endpoint - the remote side of the protocol.
//!
//! A [`Module`] assembles incoming requests with the same state machine the
//! host uses, routes each complete message to a handler registered for its
//! command, and lets the handler reply with the request id preserved.
//! Unknown commands are answered with a diagnostic print.
//!
//! # Example
//!
//! ```
//! use amlink::module::Module;
//! use amlink::protocol::Frame;
//! use amlink::transport::channel;
//! use serde_json::json;
//!
//! let (transport, mut to_host) = channel();
//! let mut module = Module::new(transport).on("floatsum", |msg, responder| {
//!     let sum: f32 = msg.frame(0).and_then(Frame::to_f32s).unwrap_or_default().iter().sum();
//!     responder.reply("floatsum", &json!({ "sum": sum }), Vec::<Frame>::new())
//! });
//!
//! module.handle_event(Frame::from(r#"{"cmd":"floatsum","frames":1,"request":1}"#)).unwrap();
//! module.handle_event(Frame::from_f32s(&[1.0, 2.0])).unwrap();
//!
//! let reply = to_host.try_recv().unwrap();
//! assert!(reply.as_text().unwrap().contains("\"sum\":3"));
//! ```

mod context;

pub use context::Responder;

use std::collections::HashMap;
use std::sync::Arc;

use context::print_to;

use crate::error::Result;
use crate::protocol::{Assembled, Frame, LogicalMessage, MessageAssembler, DEFAULT_MAX_FRAMES};
use crate::transport::Transport;

/// Handler for one command on the module side.
pub type CommandHandler =
    Box<dyn FnMut(&LogicalMessage, &Responder<'_>) -> Result<()> + Send + 'static>;

/// Remote endpoint routing requests by command name.
pub struct Module {
    transport: Arc<dyn Transport>,
    assembler: MessageAssembler,
    handlers: HashMap<String, CommandHandler>,
    max_frames: u32,
}

impl Module {
    /// Create a module replying over `transport`.
    pub fn new<T: Transport>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            assembler: MessageAssembler::with_max_frames(DEFAULT_MAX_FRAMES),
            handlers: HashMap::new(),
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }

    /// Set the frame limit for both incoming requests and replies.
    pub fn max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = max_frames;
        self.assembler = MessageAssembler::with_max_frames(max_frames);
        self
    }

    /// Register a handler for `cmd`.
    pub fn on<F>(mut self, cmd: &str, handler: F) -> Self
    where
        F: FnMut(&LogicalMessage, &Responder<'_>) -> Result<()> + Send + 'static,
    {
        self.handlers.insert(cmd.to_string(), Box::new(handler));
        self
    }

    /// Consume one event from the host.
    ///
    /// # Errors
    ///
    /// Returns the error of the handler that ran, or a transport error if
    /// the "not understood" print could not be sent.
    pub fn handle_event(&mut self, event: Frame) -> Result<()> {
        match self.assembler.push(event) {
            None => Ok(()),
            Some(Assembled::Diagnostic(diagnostic)) => {
                tracing::info!(target: "amlink::remote", "{}", diagnostic.text);
                Ok(())
            }
            Some(Assembled::Message(message)) => self.route(&message),
        }
    }

    fn route(&mut self, message: &LogicalMessage) -> Result<()> {
        let responder = Responder::new(
            self.transport.as_ref(),
            message.request_id(),
            self.max_frames,
        );

        match self.handlers.get_mut(message.cmd()) {
            Some(handler) => {
                tracing::debug!(cmd = message.cmd(), request = message.request_id(), "Handling request");
                handler(message, &responder)
            }
            None => responder.print(&format!(
                "Got message I don't understand: {}",
                message.cmd()
            )),
        }
    }

    /// Send a diagnostic line to the host.
    pub fn print(&self, text: &str) -> Result<()> {
        print_to(self.transport.as_ref(), text)
    }

    pub fn handles(&self, cmd: &str) -> bool {
        self.handlers.contains_key(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmError;
    use crate::protocol::{Header, ParsedHeader};
    use crate::transport::channel;
    use serde_json::json;

    fn request(cmd: &str, frames: u32, id: u64) -> Frame {
        Frame::Text(json!({"cmd": cmd, "frames": frames, "request": id, "args": {}}).to_string())
    }

    fn parse(event: Frame) -> ParsedHeader {
        Header::parse(event.as_text().unwrap(), DEFAULT_MAX_FRAMES).unwrap()
    }

    #[test]
    fn test_floatsum_reply() {
        let (transport, mut rx) = channel();
        let mut module = Module::new(transport).on("floatsum", |msg, responder| {
            let sum: f32 = msg
                .frame(0)
                .and_then(Frame::to_f32s)
                .unwrap_or_default()
                .iter()
                .sum();
            responder.reply("floatsum", &json!({ "sum": sum }), Vec::<Frame>::new())
        });

        let values: Vec<f32> = (0..=10).map(|i| i as f32).collect();
        module.handle_event(request("floatsum", 1, 3)).unwrap();
        assert!(rx.try_recv().is_err());
        module.handle_event(Frame::from_f32s(&values)).unwrap();

        match parse(rx.try_recv().unwrap()) {
            ParsedHeader::Message(header) => {
                assert_eq!(header.request, 3);
                assert_eq!(header.frames, 0);
                assert_eq!(header.args["sum"], json!(55.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_command_prints() {
        let (transport, mut rx) = channel();
        let mut module = Module::new(transport);

        module.handle_event(request("teleport", 0, 1)).unwrap();

        match parse(rx.try_recv().unwrap()) {
            ParsedHeader::Diagnostic(d) => {
                assert_eq!(d.text, "Got message I don't understand: teleport")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_handler_error_propagates() {
        let (transport, _rx) = channel();
        let mut module = Module::new(transport)
            .on("fail", |_, _| Err(AmError::Protocol("scene not loaded".into())));

        let result = module.handle_event(request("fail", 0, 1));
        assert!(matches!(result, Err(AmError::Protocol(_))));
    }

    #[test]
    fn test_module_print() {
        let (transport, mut rx) = channel();
        let module = Module::new(transport).on("noop", |_, _| Ok(()));
        assert!(module.handles("noop"));

        module.print("Bullet AM Running.").unwrap();
        assert!(matches!(parse(rx.try_recv().unwrap()), ParsedHeader::Diagnostic(_)));
    }

    #[test]
    fn test_max_frames_applies_to_requests() {
        let (transport, mut rx) = channel();
        let mut module = Module::new(transport)
            .max_frames(1)
            .on("x", |_, responder| responder.reply("x", &(), Vec::<Frame>::new()));

        module.handle_event(request("x", 2, 1)).unwrap();
        module.handle_event(request("x", 0, 2)).unwrap();
        module.handle_event(Frame::from("tail")).unwrap();
        assert!(rx.try_recv().is_err());

        module.handle_event(request("x", 0, 3)).unwrap();
        match parse(rx.try_recv().unwrap()) {
            ParsedHeader::Message(header) => assert_eq!(header.request, 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
