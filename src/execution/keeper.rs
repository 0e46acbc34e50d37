use super::feedback::Feedback;
use super::ExchangeTrade;
use crate::models::{InstrumentKey, Money, Order, Position, Tick};
use crate::protocol::{OrderInfo, RspQryMoney, RspQryOrders, RspQryPos};
use std::collections::HashMap;

/// Authoritative in-memory view of trading state
///
/// Open orders, positions, balances and pending-request feedback. Only the dispatch
/// worker mutates it.
#[derive(Debug, Default)]
pub struct Keeper {
    orders: Vec<Order>, // only waiting or partially filled orders
    positions: HashMap<InstrumentKey, Position>,
    money: HashMap<(String, String), Money>,
    feedback: Feedback,
}

impl Keeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert balances from an account query response
    ///
    /// Returns false and changes nothing when the response carries an error.
    pub fn apply_money_update(&mut self, exchange: &str, rsp: &RspQryMoney) -> bool {
        if !rsp.status.is_ok() {
            tracing::warn!(
                exchange,
                error_id = rsp.status.error_id,
                "Account query failed: {}",
                rsp.status.error_msg
            );
            return false;
        }

        for item in &rsp.items {
            let money = self.get_or_create_money(exchange, &item.symbol);
            money.balance = item.balance;
            money.rights = item.rights;
        }
        true
    }

    /// Track non-terminal orders and forget orders reaching a terminal status
    pub fn apply_order_updates(&mut self, exchange: &str, rsp: &RspQryOrders) -> bool {
        if !rsp.status.is_ok() {
            tracing::warn!(
                exchange,
                error_id = rsp.status.error_id,
                "Order query failed: {}",
                rsp.status.error_msg
            );
            return false;
        }

        for info in &rsp.orders {
            let cached = self.orders.iter().position(|o| o.order_id == info.order_id);
            match (cached, info.status.is_open()) {
                (None, true) => {
                    tracing::info!(
                        exchange,
                        order_id = %info.order_id,
                        status = ?info.status,
                        "Tracking order"
                    );
                    self.orders.push(order_from_info(exchange, info));
                }
                (Some(idx), true) => {
                    self.orders[idx] = order_from_info(exchange, info);
                }
                (Some(idx), false) => {
                    let order = self.orders.remove(idx);
                    tracing::info!(
                        exchange,
                        order_id = %order.order_id,
                        status = ?info.status,
                        "Order finished"
                    );
                }
                (None, false) => {}
            }
        }
        true
    }

    /// Overwrite the cached position from a position query response
    ///
    /// An empty list zeroes an existing position without creating one.
    pub fn apply_position_update(&mut self, exchange: &str, rsp: &RspQryPos) -> bool {
        if !rsp.status.is_ok() {
            tracing::warn!(
                exchange,
                error_id = rsp.status.error_id,
                "Position query failed: {}",
                rsp.status.error_msg
            );
            return false;
        }

        let key = InstrumentKey::new(exchange, rsp.symbol.as_str(), rsp.contract_type.as_str());
        match rsp.positions.first() {
            None => {
                if let Some(position) = self.positions.get_mut(&key) {
                    position.reset();
                }
            }
            Some(detail) => {
                let position = self.get_or_create_position(&key);
                position.valid = true;
                position.long.apply_venue(&detail.long);
                position.short.apply_venue(&detail.short);
            }
        }
        true
    }

    /// Recompute floating profit of the position the tick is quoting
    ///
    /// Only the position keyed by the tick's instrument is touched; pricing every cached
    /// position and balance off one instrument's last price would mix symbols. Without a
    /// trader for the exchange nothing changes.
    pub fn on_tick(&mut self, tick: &Tick, trader: Option<&dyn ExchangeTrade>) {
        let Some(trader) = trader else {
            return;
        };
        if let Some(position) = self.positions.get_mut(&tick.key) {
            trader.compute_position_profit(position, tick);
        }
    }

    pub fn position(&self, key: &InstrumentKey) -> Option<&Position> {
        self.positions.get(key)
    }

    /// Cached position, created zeroed and valid on first access
    pub fn get_or_create_position(&mut self, key: &InstrumentKey) -> &mut Position {
        self.positions
            .entry(key.clone())
            .or_insert_with(|| Position::new(key.clone()))
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn money(&self, exchange: &str, symbol: &str) -> Option<&Money> {
        self.money.get(&(exchange.to_string(), symbol.to_string()))
    }

    pub fn get_or_create_money(&mut self, exchange: &str, symbol: &str) -> &mut Money {
        self.money
            .entry((exchange.to_string(), symbol.to_string()))
            .or_insert_with(|| Money::new(exchange, symbol))
    }

    pub fn order_by_id(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn orders_by_instrument(&self, key: &InstrumentKey) -> Vec<&Order> {
        self.orders.iter().filter(|o| &o.key == key).collect()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut Feedback {
        &mut self.feedback
    }
}

fn order_from_info(exchange: &str, info: &OrderInfo) -> Order {
    Order {
        key: InstrumentKey::new(exchange, info.symbol.as_str(), info.contract_type.as_str()),
        order_id: info.order_id.clone(),
        amount: info.amount,
        deal_amount: info.deal_amount,
        price: info.price,
        price_avg: info.price_avg,
        fee: info.fee,
        status: info.status,
        order_type: info.order_type,
        unit_amount: info.unit_amount,
        lever: info.lever,
        contract_name: info.contract_name.clone(),
        created_at: info.created_at.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{CancelCommand, OrderCommand};
    use crate::models::{OrderStatus, OrderType, PositionSide, TransferDirection};
    use crate::protocol::{ApiStatus, MoneyItem, PositionDetail};
    use std::cell::Cell;

    fn key() -> InstrumentKey {
        InstrumentKey::new("okex", "btc_usd", "quarter")
    }

    fn order_info(id: &str, status: OrderStatus) -> OrderInfo {
        OrderInfo {
            symbol: "btc_usd".to_string(),
            contract_type: "quarter".to_string(),
            order_id: id.to_string(),
            amount: 10.0,
            deal_amount: 4.0,
            price: 6400.0,
            price_avg: 6399.0,
            fee: 0.0,
            status,
            order_type: OrderType::OpenLong,
            unit_amount: 100.0,
            lever: 10,
            contract_name: "BTC0928".to_string(),
            created_at: "2018-06-26 10:00:00".to_string(),
        }
    }

    fn orders_rsp(orders: Vec<OrderInfo>) -> RspQryOrders {
        RspQryOrders {
            status: ApiStatus::ok(),
            orders,
        }
    }

    fn pos_rsp(positions: Vec<PositionDetail>) -> RspQryPos {
        RspQryPos {
            status: ApiStatus::ok(),
            symbol: "btc_usd".to_string(),
            contract_type: "quarter".to_string(),
            positions,
        }
    }

    #[test]
    fn test_order_lifecycle() {
        let mut keeper = Keeper::new();

        keeper.apply_order_updates("okex", &orders_rsp(vec![order_info("42", OrderStatus::PartiallyFilled)]));
        let order = keeper.order_by_id("42").unwrap();
        assert_eq!(order.key, key());
        assert_eq!(keeper.orders_by_instrument(&key()).len(), 1);

        keeper.apply_order_updates("okex", &orders_rsp(vec![order_info("42", OrderStatus::Complete)]));
        assert!(keeper.order_by_id("42").is_none());
        assert!(keeper.orders().is_empty());
    }

    #[test]
    fn test_terminal_order_never_inserted() {
        let mut keeper = Keeper::new();
        keeper.apply_order_updates("okex", &orders_rsp(vec![order_info("1", OrderStatus::Canceled)]));
        assert!(keeper.orders().is_empty());
    }

    #[test]
    fn test_open_order_updated_in_place() {
        let mut keeper = Keeper::new();
        keeper.apply_order_updates("okex", &orders_rsp(vec![order_info("7", OrderStatus::Waiting)]));

        let mut update = order_info("7", OrderStatus::PartiallyFilled);
        update.deal_amount = 9.0;
        keeper.apply_order_updates("okex", &orders_rsp(vec![update]));

        assert_eq!(keeper.orders().len(), 1);
        let order = keeper.order_by_id("7").unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.deal_amount, 9.0);
    }

    #[test]
    fn test_error_response_is_noop() {
        let mut keeper = Keeper::new();
        let rsp = RspQryOrders {
            status: ApiStatus::error(20001, "user does not exist"),
            orders: vec![order_info("1", OrderStatus::Waiting)],
        };
        assert!(!keeper.apply_order_updates("okex", &rsp));
        assert!(keeper.orders().is_empty());

        let rsp = RspQryMoney {
            status: ApiStatus::error(1, "boom"),
            items: vec![MoneyItem {
                symbol: "btc".to_string(),
                balance: 1.0,
                rights: 1.0,
            }],
        };
        assert!(!keeper.apply_money_update("okex", &rsp));
        assert!(keeper.money("okex", "btc").is_none());
    }

    #[test]
    fn test_money_upsert() {
        let mut keeper = Keeper::new();
        let item = |balance| MoneyItem {
            symbol: "btc".to_string(),
            balance,
            rights: balance * 2.0,
        };

        keeper.apply_money_update("okex", &RspQryMoney { status: ApiStatus::ok(), items: vec![item(1.0)] });
        keeper.apply_money_update("okex", &RspQryMoney { status: ApiStatus::ok(), items: vec![item(3.0)] });

        let money = keeper.money("okex", "btc").unwrap();
        assert_eq!(money.balance, 3.0);
        assert_eq!(money.rights, 6.0);
    }

    #[test]
    fn test_empty_position_response_resets_without_creating() {
        let mut keeper = Keeper::new();

        keeper.apply_position_update("okex", &pos_rsp(vec![]));
        assert!(keeper.position(&key()).is_none());

        let detail = PositionDetail {
            long: PositionSide {
                amount: 5.0,
                available: 5.0,
                bond: 0.1,
                price_cost: 6000.0,
                ..Default::default()
            },
            short: PositionSide::default(),
        };
        keeper.get_or_create_position(&key()).disable();
        keeper.apply_position_update("okex", &pos_rsp(vec![detail]));
        let position = keeper.position(&key()).unwrap();
        assert!(position.valid);
        assert_eq!(position.long.amount, 5.0);

        keeper.apply_position_update("okex", &pos_rsp(vec![]));
        let position = keeper.position(&key()).unwrap();
        assert!(position.is_flat());
        assert!(position.valid);
    }

    #[test]
    fn test_partial_position_response_keeps_float_profit() {
        let mut keeper = Keeper::new();
        let side = &mut keeper.get_or_create_position(&key()).long;
        side.float_profit = 0.02;
        side.float_profit_rate = 0.2;

        let rsp: RspQryPos = serde_json::from_value(serde_json::json!({
            "symbol": "btc_usd",
            "contract_type": "quarter",
            "positions": [{"long": {"amount": 5, "available": 5, "bond": 0.1, "price_cost": 6000}}]
        }))
        .unwrap();
        assert!(keeper.apply_position_update("okex", &rsp));

        let long = keeper.position(&key()).unwrap().long;
        assert_eq!(long.amount, 5.0);
        assert_eq!(long.bond, 0.1);
        assert_eq!(long.float_profit, 0.02);
        assert_eq!(long.float_profit_rate, 0.2);
    }

    #[test]
    fn test_lazy_creation_defaults() {
        let mut keeper = Keeper::new();
        let position = keeper.get_or_create_position(&key());
        assert!(position.valid);
        assert!(position.is_flat());

        let money = keeper.get_or_create_money("okex", "btc");
        assert_eq!(money.balance, 0.0);
        assert_eq!(keeper.positions().count(), 1);
    }

    struct ProfitCounter {
        calls: Cell<u32>,
    }

    impl ExchangeTrade for ProfitCounter {
        fn exchange(&self) -> &str {
            "okex"
        }
        fn query_account(&self, _: u32) {}
        fn query_position(&self, _: u32, _: &InstrumentKey) {}
        fn place_order(&self, _: u32, _: &OrderCommand) {}
        fn query_order(&self, _: u32, _: &InstrumentKey, _: &str) {}
        fn query_orders_by_status(&self, _: u32, _: &InstrumentKey, _: OrderStatus) {}
        fn cancel_orders(&self, _: u32, _: &CancelCommand) {}
        fn transfer_money(&self, _: u32, _: &str, _: TransferDirection, _: f64) {}
        fn compute_contract_amount(&self, _: &str, _: f64, _: f64) -> Option<i64> {
            None
        }
        fn compute_position_profit(&self, position: &mut Position, tick: &Tick) {
            self.calls.set(self.calls.get() + 1);
            position.long.float_profit = tick.last;
        }
    }

    #[test]
    fn test_on_tick_only_touches_matching_position() {
        let mut keeper = Keeper::new();
        let ltc = InstrumentKey::new("okex", "ltc_usd", "quarter");
        keeper.get_or_create_position(&key());
        keeper.get_or_create_position(&ltc);

        let tick: Tick = serde_json::from_str(
            r#"{"exchange":"okex","symbol":"btc_usd","contract_type":"quarter","timestamp":1,"last":6400.0}"#,
        )
        .unwrap();
        let trader = ProfitCounter { calls: Cell::new(0) };

        keeper.on_tick(&tick, Some(&trader));
        keeper.on_tick(&tick, None);

        assert_eq!(trader.calls.get(), 1);
        assert_eq!(keeper.position(&key()).unwrap().long.float_profit, 6400.0);
        assert_eq!(keeper.position(&ltc).unwrap().long.float_profit, 0.0);
    }
}
