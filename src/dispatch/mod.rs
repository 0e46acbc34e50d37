// Event dispatch pipeline
//
// One worker owns the Context and walks every inbound envelope through a fixed handler
// chain. The first handler reporting "handled" ends the chain.
pub mod quote;
pub mod strategy;
pub mod trade;

pub use quote::QuoteHandler;
pub use strategy::StrategyHandler;
pub use trade::TradeHandler;

use crate::engine::Context;
use crate::protocol::Envelope;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};

/// One link of the dispatch chain
pub trait Handler: Send {
    fn name(&self) -> &str;

    /// Called once before the first envelope
    fn start(&mut self, _ctx: &mut Context) {}

    /// Returns true when the envelope was consumed and the chain must stop
    fn handle(&mut self, ctx: &mut Context, envelope: &Envelope) -> bool;

    /// Called once after the last envelope
    fn stop(&mut self, _ctx: &mut Context) {}
}

/// Decode a payload, logging failures
///
/// Callers treat None as handled: the message is dropped, never re-enqueued.
pub(crate) fn decode_or_log<T: DeserializeOwned>(handler: &str, envelope: &Envelope) -> Option<T> {
    match envelope.decode() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(
                handler,
                msg_type = envelope.msg_type,
                req_serial = envelope.req_serial,
                source = %envelope.source,
                "Dropping undecodable payload: {}",
                e
            );
            None
        }
    }
}

/// Ordered handler chain
pub struct Dispatcher {
    handlers: Vec<Box<dyn Handler>>,
    processed: u64,
}

impl Dispatcher {
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Self {
        Self {
            handlers,
            processed: 0,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn start(&mut self, ctx: &mut Context) {
        for handler in self.handlers.iter_mut() {
            handler.start(ctx);
        }
    }

    pub fn stop(&mut self, ctx: &mut Context) {
        for handler in self.handlers.iter_mut() {
            handler.stop(ctx);
        }
    }

    /// Run one envelope through the chain; returns the name of the handler that claimed it
    pub fn dispatch(&mut self, ctx: &mut Context, envelope: &Envelope) -> Option<&str> {
        self.processed += 1;
        for handler in self.handlers.iter_mut() {
            if handler.handle(ctx, envelope) {
                return Some(handler.name());
            }
        }

        tracing::debug!(
            msg_type = envelope.msg_type,
            req_serial = envelope.req_serial,
            "No handler claimed envelope"
        );
        None
    }

    /// Consume `inbound` until it closes or `shutdown` turns true
    ///
    /// Shutdown is observed only between envelopes, so the envelope being dispatched
    /// always completes. Handlers are stopped before returning.
    pub async fn run(
        &mut self,
        ctx: &mut Context,
        mut inbound: mpsc::Receiver<Envelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.start(ctx);
        tracing::info!(handlers = self.handlers.len(), "Dispatch worker started");

        let mut shutdown_open = true;
        loop {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested");
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed(), if shutdown_open => {
                    // a dropped sender can no longer request shutdown
                    if changed.is_err() {
                        shutdown_open = false;
                    }
                }
                envelope = inbound.recv() => {
                    let Some(envelope) = envelope else {
                        tracing::info!("Inbound queue closed");
                        break;
                    };
                    self.dispatch(ctx, &envelope);
                }
            }
        }

        self.stop(ctx);
        tracing::info!(processed = self.processed, "Dispatch worker stopped");
    }
}
