//! Execution module - trade lifecycle coordination
//!
//! Sequences signal -> deferred entry -> order submission -> settlement
//! through a pluggable broker connector.

mod connector;
mod engine;

pub use connector::{ConnectorError, OrderConnector, SimulatedConnector};
pub use engine::{EngineConfig, ExecutionEngine, SubmitOutcome, TickEvent};
