//! # amlink
//!
//! Message layer between a host application and a remote acceleration
//! module, over a transport that only delivers whole, ordered text or
//! binary events.
//!
//! A logical message is one JSON header event followed by the number of
//! text/binary frame events the header announces. The host tags each
//! request with a per-connection request id and routes the module's reply
//! back to the callback waiting for that id.
//!
//! ## Architecture
//!
//! - **Protocol**: header format, message assembler, outgoing builder
//! - **Handler**: request registry, command subscriptions, dispatcher
//! - **Connection**: host-side actor owning the dispatcher
//! - **Module**: remote-side endpoint routing requests by command
//! - **Transport**: in-memory channel and length-prefixed byte streams
//!
//! ## Example
//!
//! ```ignore
//! use amlink::{Connection, Frame};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> amlink::Result<()> {
//!     let (transport, to_module) = amlink::transport::channel();
//!     let conn = Connection::open(transport);
//!     // Feed the module's events into `conn.inbound()`.
//!
//!     let values: Vec<f32> = (0..=10).map(|i| i as f32).collect();
//!     let reply = conn
//!         .request("floatsum", &json!({}), vec![Frame::from_f32s(&values)])
//!         .await?;
//!     println!("sum = {}", reply.field("sum").unwrap());
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod handler;
pub mod module;
pub mod protocol;
pub mod transport;

pub use connection::{Connection, ConnectionBuilder, ConnectionConfig, InboundSink};
pub use error::{AmError, HeaderError, Result};
pub use module::{Module, Responder};
pub use protocol::{Frame, LogicalMessage, RequestId};
