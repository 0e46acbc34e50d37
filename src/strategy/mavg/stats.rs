use std::collections::HashMap;

/// Counters of one symbol, or of all symbols together
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SymbolStats {
    pub operations: u32,
    pub opens: u32,
    pub closes: u32,
    pub wins: u32,
    pub win_volume: f64, // coins
    pub losses: u32,
    pub loss_volume: f64, // coins
}

/// Trade statistics backing the loss limit
///
/// Only symbols named at construction are counted.
#[derive(Debug, Clone)]
pub struct TradeStats {
    totals: SymbolStats,
    symbols: HashMap<String, SymbolStats>,
    loss_limit: u32,
    loss_limit_step: u32,
}

impl TradeStats {
    pub fn new<I, S>(symbols: I, loss_limit_step: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            totals: SymbolStats::default(),
            symbols: symbols
                .into_iter()
                .map(|s| (s.into(), SymbolStats::default()))
                .collect(),
            loss_limit: loss_limit_step,
            loss_limit_step,
        }
    }

    pub fn record_open(&mut self, symbol: &str) {
        let Some(stats) = self.symbols.get_mut(symbol) else {
            return;
        };
        stats.operations += 1;
        stats.opens += 1;
        self.totals.operations += 1;
        self.totals.opens += 1;
    }

    /// Count a close; `profit` is the realized coin profit, zero counts as a loss
    pub fn record_close(&mut self, symbol: &str, profit: f64) {
        let Some(stats) = self.symbols.get_mut(symbol) else {
            return;
        };
        for s in [&mut *stats, &mut self.totals] {
            s.operations += 1;
            s.closes += 1;
            if profit > 0.0 {
                s.wins += 1;
                s.win_volume += profit;
            } else {
                s.losses += 1;
                s.loss_volume -= profit;
            }
        }

        tracing::info!(
            symbol,
            wins = stats.wins,
            win_volume = stats.win_volume,
            losses = stats.losses,
            loss_volume = stats.loss_volume,
            "Trade statistics"
        );
    }

    /// Loss count has reached the current limit
    pub fn over_loss_limit(&self) -> bool {
        self.totals.losses >= self.loss_limit
    }

    pub fn raise_loss_limit(&mut self) {
        self.loss_limit += self.loss_limit_step;
    }

    pub fn loss_limit(&self) -> u32 {
        self.loss_limit
    }

    pub fn totals(&self) -> &SymbolStats {
        &self.totals
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolStats> {
        self.symbols.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_outcomes() {
        let mut stats = TradeStats::new(["ltc_usd"], 5);
        stats.record_open("ltc_usd");
        stats.record_close("ltc_usd", 0.25);
        stats.record_close("ltc_usd", -0.5);
        stats.record_close("ltc_usd", 0.0);

        let ltc = stats.symbol("ltc_usd").unwrap();
        assert_eq!(ltc.opens, 1);
        assert_eq!(ltc.closes, 3);
        assert_eq!(ltc.operations, 4);
        assert_eq!(ltc.wins, 1);
        assert_eq!(ltc.losses, 2);
        assert!((ltc.loss_volume - 0.5).abs() < 1e-12);
        assert_eq!(stats.totals(), ltc);
    }

    #[test]
    fn test_untracked_symbol_ignored() {
        let mut stats = TradeStats::new(["ltc_usd"], 5);
        stats.record_close("btc_usd", -1.0);
        assert_eq!(stats.totals().losses, 0);
    }

    #[test]
    fn test_loss_limit_steps() {
        let mut stats = TradeStats::new(["etc_usd"], 2);
        stats.record_close("etc_usd", -1.0);
        assert!(!stats.over_loss_limit());
        stats.record_close("etc_usd", -1.0);
        assert!(stats.over_loss_limit());

        stats.raise_loss_limit();
        assert_eq!(stats.loss_limit(), 4);
        assert!(!stats.over_loss_limit());
    }
}
