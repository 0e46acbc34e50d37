use super::compose::EventCompose;
use crate::engine::Context;
use crate::error::EngineError;
use crate::models::Tick;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Closed set of state identifiers of one state machine
pub trait StateId: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + 'static {
    /// Every identifier; each must have a registered state
    const ALL: &'static [Self];
}

/// One behavioural mode of a strategy
///
/// `D` is data shared by all states of the machine (statistics, policy).
pub trait FsmState<S: StateId, D>: Send {
    fn id(&self) -> S;

    /// Called once when the machine is built
    fn init(&mut self, _data: &mut D) {}

    /// Called when the machine switches into this state
    fn enter(&mut self, _ctx: &mut Context, _data: &mut D) {}

    /// Pick the next state from the fully populated compose record
    fn decide(&mut self, ctx: &mut Context, tick: &Tick, compose: &EventCompose, data: &mut D) -> S;
}

/// Contributes derived fields to the compose record; never changes state
pub trait FsmHandler: Send {
    fn name(&self) -> &str;

    fn on_tick(&mut self, ctx: &mut Context, tick: &Tick, compose: &mut EventCompose);
}

/// Assembles a state machine, validating the wiring once
pub struct FsmBuilder<S: StateId, D> {
    name: String,
    states: HashMap<S, Box<dyn FsmState<S, D>>>,
    handlers: Vec<Box<dyn FsmHandler>>,
    initial: Option<S>,
    error: Option<EngineError>,
}

impl<S: StateId, D> FsmBuilder<S, D> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: HashMap::new(),
            handlers: Vec::new(),
            initial: None,
            error: None,
        }
    }

    pub fn state(mut self, state: Box<dyn FsmState<S, D>>) -> Self {
        let id = state.id();
        if self.states.contains_key(&id) {
            self.error
                .get_or_insert(EngineError::DuplicateState(id.to_string()));
            return self;
        }
        self.states.insert(id, state);
        self
    }

    /// Handlers run in registration order
    pub fn handler(mut self, handler: Box<dyn FsmHandler>) -> Self {
        let name = handler.name().to_string();
        if name.is_empty() {
            self.error.get_or_insert(EngineError::InvalidRegistration(
                "handler with empty name".to_string(),
            ));
            return self;
        }
        if self.handlers.iter().any(|h| h.name() == name) {
            self.error.get_or_insert(EngineError::DuplicateHandler(name));
            return self;
        }
        self.handlers.push(handler);
        self
    }

    pub fn initial(mut self, id: S) -> Self {
        self.initial = Some(id);
        self
    }

    /// Fails on duplicate registrations, a missing initial state or an unregistered id
    pub fn build(self, mut data: D) -> Result<Fsm<S, D>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let initial = self
            .initial
            .ok_or_else(|| EngineError::NoInitialState(self.name.clone()))?;

        let registered: HashSet<S> = self.states.keys().copied().collect();
        if let Some(missing) = S::ALL.iter().find(|id| !registered.contains(id)) {
            return Err(EngineError::MissingState(missing.to_string()));
        }

        let mut states = self.states;
        for state in states.values_mut() {
            state.init(&mut data);
        }

        Ok(Fsm {
            name: self.name,
            states,
            handlers: self.handlers,
            current: initial,
            compose: EventCompose::new(),
            data,
        })
    }
}

/// Strategy state machine: ordered handlers feeding one current state
pub struct Fsm<S: StateId, D> {
    name: String,
    states: HashMap<S, Box<dyn FsmState<S, D>>>,
    handlers: Vec<Box<dyn FsmHandler>>,
    current: S,
    compose: EventCompose,
    data: D,
}

impl<S: StateId, D> Fsm<S, D> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> S {
        self.current
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// Compose record of the last evaluation
    pub fn compose(&self) -> &EventCompose {
        &self.compose
    }

    /// Evaluate one tick
    ///
    /// Returns `(from, to)` when the current state changed.
    pub fn call(&mut self, ctx: &mut Context, tick: &Tick) -> Option<(S, S)> {
        self.compose.reset(&tick.key);
        for handler in self.handlers.iter_mut() {
            handler.on_tick(ctx, tick, &mut self.compose);
        }

        let from = self.current;
        let to = self
            .states
            .get_mut(&from)?
            .decide(ctx, tick, &self.compose, &mut self.data);
        if to == from {
            return None;
        }

        // every id is registered at build time
        let state = self.states.get_mut(&to)?;
        state.enter(ctx, &mut self.data);
        self.current = to;

        tracing::info!(fsm = %self.name, %from, %to, "State transition");
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::CandleBuffer;
    use crate::models::{InstrumentKey, Signal, Timeframe};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Green,
        Red,
    }

    impl fmt::Display for Light {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl StateId for Light {
        const ALL: &'static [Self] = &[Light::Green, Light::Red];
    }

    #[derive(Default)]
    struct Counters {
        inits: u32,
        green_enters: u32,
        red_enters: u32,
    }

    /// Goes red on a Sell signal, green on Buy, otherwise stays
    struct LightState(Light);

    impl FsmState<Light, Counters> for LightState {
        fn id(&self) -> Light {
            self.0
        }

        fn init(&mut self, data: &mut Counters) {
            data.inits += 1;
        }

        fn enter(&mut self, _ctx: &mut Context, data: &mut Counters) {
            match self.0 {
                Light::Green => data.green_enters += 1,
                Light::Red => data.red_enters += 1,
            }
        }

        fn decide(&mut self, _: &mut Context, _: &Tick, compose: &EventCompose, _: &mut Counters) -> Light {
            match compose.signal(Timeframe::Min1) {
                Signal::Buy => Light::Green,
                Signal::Sell => Light::Red,
                Signal::Hold => self.0,
            }
        }
    }

    /// Derives the signal from the tick price
    struct PriceHandler;

    impl FsmHandler for PriceHandler {
        fn name(&self) -> &str {
            "price"
        }

        fn on_tick(&mut self, _: &mut Context, tick: &Tick, compose: &mut EventCompose) {
            let signal = if tick.last > 100.0 {
                Signal::Buy
            } else if tick.last < 50.0 {
                Signal::Sell
            } else {
                Signal::Hold
            };
            compose.signals.insert(Timeframe::Min1, signal);
        }
    }

    fn ctx() -> Context {
        Context::new(Vec::new(), CandleBuffer::new(&[Timeframe::Min1], 10), 3)
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

    fn machine() -> Fsm<Light, Counters> {
        FsmBuilder::new("lights")
            .state(Box::new(LightState(Light::Green)))
            .state(Box::new(LightState(Light::Red)))
            .handler(Box::new(PriceHandler))
            .initial(Light::Green)
            .build(Counters::default())
            .unwrap()
    }

    #[test]
    fn test_build_runs_init_once_per_state() {
        let fsm = machine();
        assert_eq!(fsm.data().inits, 2);
        assert_eq!(fsm.current(), Light::Green);
        assert_eq!(fsm.data().green_enters, 0);
    }

    #[test]
    fn test_transition_enters_new_state_once() {
        let mut fsm = machine();
        let mut ctx = ctx();

        assert_eq!(fsm.call(&mut ctx, &tick(75.0)), None);
        assert_eq!(fsm.data().red_enters, 0);

        assert_eq!(fsm.call(&mut ctx, &tick(20.0)), Some((Light::Green, Light::Red)));
        assert_eq!(fsm.data().red_enters, 1);

        // unchanged decision, no enter
        assert_eq!(fsm.call(&mut ctx, &tick(10.0)), None);
        assert_eq!(fsm.data().red_enters, 1);
        assert_eq!(fsm.data().green_enters, 0);

        assert_eq!(fsm.call(&mut ctx, &tick(150.0)), Some((Light::Red, Light::Green)));
        assert_eq!(fsm.data().green_enters, 1);
    }

    #[test]
    fn test_compose_seeded_with_tick_identity() {
        let mut fsm = machine();
        let mut ctx = ctx();
        fsm.call(&mut ctx, &tick(75.0));
        assert_eq!(fsm.compose().key, InstrumentKey::new("okex", "btc_usd", "quarter"));
        assert_eq!(fsm.compose().signal(Timeframe::Min1), Signal::Hold);
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let result = FsmBuilder::new("lights")
            .state(Box::new(LightState(Light::Green)))
            .state(Box::new(LightState(Light::Green)))
            .state(Box::new(LightState(Light::Red)))
            .initial(Light::Green)
            .build(Counters::default());
        assert!(matches!(result, Err(EngineError::DuplicateState(name)) if name == "Green"));
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let result = FsmBuilder::new("lights")
            .state(Box::new(LightState(Light::Green)))
            .state(Box::new(LightState(Light::Red)))
            .handler(Box::new(PriceHandler))
            .handler(Box::new(PriceHandler))
            .initial(Light::Green)
            .build(Counters::default());
        assert!(matches!(result, Err(EngineError::DuplicateHandler(_))));
    }

    #[test]
    fn test_unregistered_state_rejected() {
        let result = FsmBuilder::new("lights")
            .state(Box::new(LightState(Light::Green)))
            .initial(Light::Green)
            .build(Counters::default());
        assert!(matches!(result, Err(EngineError::MissingState(name)) if name == "Red"));
    }

    #[test]
    fn test_missing_initial_rejected() {
        let result = FsmBuilder::<Light, Counters>::new("lights")
            .state(Box::new(LightState(Light::Green)))
            .state(Box::new(LightState(Light::Red)))
            .build(Counters::default());
        assert!(matches!(result, Err(EngineError::NoInitialState(_))));
    }
}
