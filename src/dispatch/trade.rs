use super::{decode_or_log, Handler};
use crate::engine::Context;
use crate::models::{InstrumentKey, Tick};
use crate::protocol::{
    Envelope, MessageType, RspCancelOrders, RspQryMoney, RspQryOrders, RspQryPos, RspSetOrder,
    RspTransferMoney,
};

const NAME: &str = "trade";

/// Applies venue confirmations to the Keeper before any strategy sees the tick
#[derive(Debug, Default)]
pub struct TradeHandler;

impl TradeHandler {
    pub fn new() -> Self {
        Self
    }

    fn on_tick(&self, ctx: &mut Context, envelope: &Envelope) -> bool {
        let Some(tick) = decode_or_log::<Tick>(NAME, envelope) else {
            return true;
        };
        ctx.apply_tick(&tick);
        false
    }

    fn on_set_order(&self, ctx: &mut Context, envelope: &Envelope, rsp: RspSetOrder) {
        let exchange = envelope.source.as_str();
        let key = InstrumentKey::new(exchange, rsp.symbol.as_str(), rsp.contract_type.as_str());

        // balance and position change whatever the outcome
        ctx.query_account(exchange);
        ctx.query_position(&key);

        if !rsp.status.is_ok() {
            tracing::warn!(
                instrument = %key,
                req_serial = envelope.req_serial,
                error_id = rsp.status.error_id,
                "Order rejected: {}",
                rsp.status.error_msg
            );
            return;
        }

        ctx.keeper_mut().feedback_mut().remove(envelope.req_serial);
        tracing::info!(instrument = %key, order_id = %rsp.order_id, "Order accepted");
        ctx.query_order(&key, &rsp.order_id);
    }

    fn on_cancel(&self, ctx: &mut Context, envelope: &Envelope, rsp: RspCancelOrders) {
        let key = InstrumentKey::new(
            envelope.source.as_str(),
            rsp.symbol.as_str(),
            rsp.contract_type.as_str(),
        );
        if !rsp.status.is_ok() {
            tracing::warn!(
                instrument = %key,
                req_serial = envelope.req_serial,
                error_id = rsp.status.error_id,
                "Cancel rejected: {}",
                rsp.status.error_msg
            );
            return;
        }

        ctx.keeper_mut().feedback_mut().remove(envelope.req_serial);
        for order_id in rsp.success.iter().chain(rsp.errors.iter()) {
            ctx.query_order(&key, order_id);
        }
    }
}

impl Handler for TradeHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn handle(&mut self, ctx: &mut Context, envelope: &Envelope) -> bool {
        let Some(kind) = envelope.kind() else {
            return false;
        };
        if kind == MessageType::Tick {
            return self.on_tick(ctx, envelope);
        }

        let is_response = matches!(
            kind,
            MessageType::RspQryMoney
                | MessageType::RspQryPos
                | MessageType::RspSetOrder
                | MessageType::RspQryOrders
                | MessageType::RspCancelOrders
                | MessageType::RspTransferMoney
        );
        if !is_response {
            return false;
        }
        if !ctx.has_trader(&envelope.source) {
            tracing::debug!(source = %envelope.source, ?kind, "Response from unknown exchange");
            return true;
        }

        let exchange = envelope.source.as_str();
        match kind {
            MessageType::RspQryMoney => {
                if let Some(rsp) = decode_or_log::<RspQryMoney>(NAME, envelope) {
                    ctx.keeper_mut().apply_money_update(exchange, &rsp);
                }
            }
            MessageType::RspQryPos => {
                if let Some(rsp) = decode_or_log::<RspQryPos>(NAME, envelope) {
                    ctx.keeper_mut().apply_position_update(exchange, &rsp);
                }
            }
            MessageType::RspQryOrders => {
                if let Some(rsp) = decode_or_log::<RspQryOrders>(NAME, envelope) {
                    ctx.keeper_mut().apply_order_updates(exchange, &rsp);
                }
            }
            MessageType::RspSetOrder => {
                if let Some(rsp) = decode_or_log::<RspSetOrder>(NAME, envelope) {
                    self.on_set_order(ctx, envelope, rsp);
                }
            }
            MessageType::RspCancelOrders => {
                if let Some(rsp) = decode_or_log::<RspCancelOrders>(NAME, envelope) {
                    self.on_cancel(ctx, envelope, rsp);
                }
            }
            MessageType::RspTransferMoney => {
                if let Some(rsp) = decode_or_log::<RspTransferMoney>(NAME, envelope) {
                    if !rsp.status.is_ok() {
                        tracing::warn!(exchange, "Transfer failed: {}", rsp.status.error_msg);
                    }
                    ctx.query_account(exchange);
                }
            }
            _ => return false,
        }
        true
    }
}
