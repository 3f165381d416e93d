//! Handler module - response correlation and dispatch.
//!
//! Provides:
//! - [`RequestRegistry`] - one-shot callbacks keyed by request id
//! - [`CommandSubscriptions`] - persistent callbacks keyed by command name
//! - [`Dispatcher`] - assembles inbound events and routes complete messages
//! - [`LogSink`] - destination for diagnostic lines from the module
//!
//! # Example
//!
//! ```
//! use amlink::handler::{Dispatch, Dispatcher, TracingLogSink};
//! use amlink::protocol::{Frame, MessageAssembler};
//!
//! let mut dispatcher = Dispatcher::new(MessageAssembler::new(), Box::new(TracingLogSink));
//!
//! dispatcher.register(1, "stepscene", None, Box::new(|res| {
//!     assert!(res.is_ok());
//! }));
//!
//! let reply = Frame::from(r#"{"cmd":"noscene","frames":0,"request":1}"#);
//! assert_eq!(dispatcher.handle_event(reply), Dispatch::Response(1));
//! ```

mod dispatcher;
mod log_sink;
mod registry;
mod subscriptions;

pub use dispatcher::{Dispatch, Dispatcher};
pub use log_sink::{LogSink, TracingLogSink};
pub use registry::{RequestRegistry, ResponseCallback};
pub use subscriptions::{CommandCallback, CommandSubscriptions};
