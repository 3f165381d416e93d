//! Host and module in one process, joined by an in-memory byte stream.
//!
//! The host sends eleven floats, the module replies with their sum.
//!
//! Run with: `cargo run --example floatsum`

use amlink::transport::{spawn_reader, StreamTransport};
use amlink::{Connection, Frame, LogicalMessage, Module, Responder};
use serde_json::json;

fn floatsum(msg: &LogicalMessage, responder: &Responder<'_>) -> amlink::Result<()> {
    let values = msg.frame(0).and_then(Frame::to_f32s).unwrap_or_default();
    let sum: f32 = values.iter().sum();
    responder.reply("floatsum", &json!({ "sum": sum }), Vec::<Frame>::new())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> amlink::Result<()> {
    let (host_io, module_io) = tokio::io::duplex(64 * 1024);
    let (host_read, host_write) = tokio::io::split(host_io);
    let (module_read, module_write) = tokio::io::split(module_io);

    let (module_transport, _module_writer) = StreamTransport::new(module_write);
    let mut module = Module::new(module_transport).on("floatsum", floatsum);
    module.print("floatsum module running")?;
    let _module_reader = spawn_reader(module_read, move |event| module.handle_event(event));

    let (host_transport, _host_writer) = StreamTransport::new(host_write);
    let conn = Connection::builder()
        .log_sink(|line: &str| println!("[module] {line}"))
        .open(host_transport);
    let inbound = conn.inbound();
    let _host_reader = spawn_reader(host_read, move |event| inbound.deliver(event));

    let values: Vec<f32> = (0..=10).map(|i| i as f32).collect();
    let reply = conn
        .request("floatsum", &json!({}), vec![Frame::from_f32s(&values)])
        .await?;

    match reply.field("sum") {
        Some(sum) => println!("request {} -> sum = {}", reply.request_id(), sum),
        None => println!("request {} -> reply without a sum", reply.request_id()),
    }

    let unknown = conn.send("teleport", &json!({}), Vec::<Frame>::new())?;
    println!("sent request {unknown} for an unknown command");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    conn.close().await;
    Ok(())
}
