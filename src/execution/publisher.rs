use super::{CancelCommand, ExchangeTrade, OrderCommand};
use crate::models::{InstrumentKey, OrderStatus, Position, PositionSide, Tick, TransferDirection};
use crate::protocol::{Envelope, MessageType, ReqQryMoney, ReqQryOrders, ReqQryPos, ReqTransferMoney};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Exchange adapter front that publishes requests as envelopes for an order gateway
///
/// Pricing uses inverse contracts: each contract is worth a fixed face value in the
/// quote currency and profit is settled in coins.
pub struct PublishingTrader {
    exchange: String,
    face_values: HashMap<String, f64>,
    outbound: UnboundedSender<Envelope>,
}

impl PublishingTrader {
    pub fn new(
        exchange: impl Into<String>,
        face_values: HashMap<String, f64>,
        outbound: UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            face_values,
            outbound,
        }
    }

    pub fn face_value(&self, symbol: &str) -> Option<f64> {
        self.face_values.get(symbol).copied()
    }

    fn publish<T: Serialize>(&self, msg_type: MessageType, serial: u32, payload: &T) {
        let envelope = match Envelope::encode(msg_type, serial, self.exchange.as_str(), payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(exchange = %self.exchange, "Failed to encode request: {}", e);
                return;
            }
        };

        if self.outbound.send(envelope).is_err() {
            tracing::warn!(
                exchange = %self.exchange,
                msg_type = ?msg_type,
                req_serial = serial,
                "Outbound channel closed, request dropped"
            );
        }
    }
}

impl ExchangeTrade for PublishingTrader {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    fn query_account(&self, serial: u32) {
        let req = ReqQryMoney {
            exchange: self.exchange.clone(),
        };
        self.publish(MessageType::ReqQryMoney, serial, &req);
    }

    fn query_position(&self, serial: u32, key: &InstrumentKey) {
        let req = ReqQryPos { key: key.clone() };
        self.publish(MessageType::ReqQryPos, serial, &req);
    }

    fn place_order(&self, serial: u32, cmd: &OrderCommand) {
        self.publish(MessageType::ReqSetOrder, serial, cmd);
    }

    fn query_order(&self, serial: u32, key: &InstrumentKey, order_id: &str) {
        let req = ReqQryOrders {
            key: key.clone(),
            order_id: Some(order_id.to_string()),
            status: None,
        };
        self.publish(MessageType::ReqQryOrders, serial, &req);
    }

    fn query_orders_by_status(&self, serial: u32, key: &InstrumentKey, status: OrderStatus) {
        let req = ReqQryOrders {
            key: key.clone(),
            order_id: None,
            status: Some(status),
        };
        self.publish(MessageType::ReqQryOrders, serial, &req);
    }

    fn cancel_orders(&self, serial: u32, cmd: &CancelCommand) {
        self.publish(MessageType::ReqCancelOrders, serial, cmd);
    }

    fn transfer_money(&self, serial: u32, symbol: &str, direction: TransferDirection, amount: f64) {
        let req = ReqTransferMoney {
            exchange: self.exchange.clone(),
            symbol: symbol.to_string(),
            direction,
            amount,
        };
        self.publish(MessageType::ReqTransferMoney, serial, &req);
    }

    fn compute_contract_amount(&self, symbol: &str, price: f64, vol: f64) -> Option<i64> {
        let face = self.face_value(symbol)?;
        let contracts = (price * vol / face).floor();
        if contracts < 1.0 {
            return None;
        }
        Some(contracts as i64)
    }

    fn compute_position_profit(&self, position: &mut Position, tick: &Tick) {
        for side in [&mut position.long, &mut position.short] {
            side.float_profit = 0.0;
            side.float_profit_rate = 0.0;
        }

        let Some(face) = self.face_value(&position.key.symbol) else {
            return;
        };
        let last = tick.last;
        if last <= 0.0 {
            return;
        }

        // long gains when the coin value of one contract shrinks
        update_side(&mut position.long, |cost| face / cost - face / last);
        update_side(&mut position.short, |cost| face / last - face / cost);
    }
}

fn update_side(side: &mut PositionSide, per_contract: impl Fn(f64) -> f64) {
    if side.amount <= 0.0 || side.price_cost <= 0.0 || side.bond <= 0.0 {
        return;
    }
    side.float_profit = per_contract(side.price_cost) * side.amount;
    side.float_profit_rate = side.float_profit / side.bond;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, PriceType};
    use crate::protocol::MessageType;
    use tokio::sync::mpsc;

    fn trader() -> (PublishingTrader, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let faces = HashMap::from([("btc_usd".to_string(), 100.0), ("ltc_usd".to_string(), 10.0)]);
        (PublishingTrader::new("okex", faces, tx), rx)
    }

    fn key() -> InstrumentKey {
        InstrumentKey::new("okex", "btc_usd", "quarter")
    }

    fn tick(last: f64) -> Tick {
        serde_json::from_value(serde_json::json!({
            "exchange": "okex",
            "symbol": "btc_usd",
            "contract_type": "quarter",
            "timestamp": 1000,
            "last": last
        }))
        .unwrap()
    }

    #[test]
    fn test_contract_amount() {
        let (trader, _rx) = trader();
        assert_eq!(trader.compute_contract_amount("btc_usd", 6400.0, 0.5), Some(32));
        assert_eq!(trader.compute_contract_amount("ltc_usd", 95.0, 1.0), Some(9));
        assert_eq!(trader.compute_contract_amount("ltc_usd", 5.0, 1.0), None);
        assert_eq!(trader.compute_contract_amount("xrp_usd", 1.0, 1000.0), None);
    }

    #[test]
    fn test_long_and_short_profit() {
        let (trader, _rx) = trader();
        let mut position = Position::new(key());
        position.long = PositionSide {
            amount: 10.0,
            price_cost: 5000.0,
            bond: 0.02,
            ..Default::default()
        };
        position.short = PositionSide {
            amount: 4.0,
            price_cost: 5000.0,
            bond: 0.01,
            ..Default::default()
        };

        trader.compute_position_profit(&mut position, &tick(6250.0));

        // 100/5000 - 100/6250 = 0.004 coins per contract
        assert!((position.long.float_profit - 0.04).abs() < 1e-12);
        assert!((position.long.float_profit_rate - 2.0).abs() < 1e-9);
        assert!((position.short.float_profit + 0.016).abs() < 1e-12);
        assert!((position.short.float_profit_rate + 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_profit_cleared_without_price() {
        let (trader, _rx) = trader();
        let mut position = Position::new(key());
        position.long = PositionSide {
            amount: 1.0,
            price_cost: 5000.0,
            bond: 0.01,
            float_profit: 9.0,
            ..Default::default()
        };

        trader.compute_position_profit(&mut position, &tick(0.0));
        assert_eq!(position.long.float_profit, 0.0);
    }

    #[test]
    fn test_place_order_publishes_envelope() {
        let (trader, mut rx) = trader();
        let cmd = OrderCommand {
            key: key(),
            order_type: OrderType::OpenLong,
            price_type: PriceType::Market,
            price: 6400.0,
            amount: 3,
            vol: 0.05,
            lever: 10,
        };

        trader.place_order(11, &cmd);

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.kind(), Some(MessageType::ReqSetOrder));
        assert_eq!(envelope.req_serial, 11);
        assert_eq!(envelope.source, "okex");
        let decoded: OrderCommand = envelope.decode().unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (trader, rx) = trader();
        drop(rx);
        trader.query_account(1);
    }
}
