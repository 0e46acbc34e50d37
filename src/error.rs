use thiserror::Error;

/// Errors surfaced by the decision engine.
///
/// Wiring problems (registration, settings) are reported once at startup. Runtime
/// input problems (bad payloads) are logged by the handler that hit them and never
/// stop the dispatch worker.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to decode payload for message type {msg_type}: {source}")]
    Decode {
        msg_type: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode payload for message type {msg_type}: {source}")]
    Encode {
        msg_type: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("state '{0}' registered twice")]
    DuplicateState(String),

    #[error("handler '{0}' registered twice")]
    DuplicateHandler(String),

    #[error("state '{0}' is reachable but was never registered")]
    MissingState(String),

    #[error("state machine '{0}' has no initial state")]
    NoInitialState(String),

    #[error("strategy '{0}' registered twice")]
    DuplicateStrategy(String),

    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("exchange '{0}' is not configured")]
    UnknownExchange(String),

    #[error("failed to load settings: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid settings: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
