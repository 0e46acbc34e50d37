// Core modules
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod market;
pub mod models;
pub mod protocol;
pub mod series;
pub mod strategy;

// Re-export commonly used types
pub use engine::{Context, Engine};
pub use error::EngineError;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, EngineError>;
