//! Phase-transition event stream consumed by logging and report layers.

use reaper_core::TransitionEvent;
use tokio::sync::mpsc;

/// Receives every phase transition the orchestrator performs.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TransitionEvent);
}

/// Logs each transition as a structured tracing event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &TransitionEvent) {
        tracing::info!(
            run_id = %event.run_id,
            account = %event.key.account,
            region = %event.key.region,
            kind = %event.key.kind,
            resource_id = %event.key.resource_id,
            from = event.from.map(|p| p.as_str()).unwrap_or("-"),
            to = event.to.as_str(),
            reason = %event.reason,
            "phase transition"
        );
    }
}

/// Forwards transitions to an unbounded channel, for report collectors and
/// tests. Send failures (receiver dropped) are ignored.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TransitionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &TransitionEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Fans one event out to several sinks.
pub struct FanoutSink(pub Vec<std::sync::Arc<dyn EventSink>>);

impl EventSink for FanoutSink {
    fn emit(&self, event: &TransitionEvent) {
        for sink in &self.0 {
            sink.emit(event);
        }
    }
}
