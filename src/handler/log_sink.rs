//! Log sink for diagnostic lines printed by the module.

/// Receives diagnostic lines sent with the reserved print command.
///
/// Any `FnMut(&str)` closure is a log sink.
pub trait LogSink: Send + 'static {
    fn log(&mut self, line: &str);
}

impl<F> LogSink for F
where
    F: FnMut(&str) + Send + 'static,
{
    fn log(&mut self, line: &str) {
        self(line)
    }
}

/// Default sink: forwards lines to `tracing` on target `amlink::remote`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&mut self, line: &str) {
        tracing::info!(target: "amlink::remote", "{}", line);
    }
}
