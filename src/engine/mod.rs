//! Drain engine: single-flight guard, processing wrapper, drain loop.

pub mod drain;
pub mod single_flight;
pub mod wrapper;

pub use drain::{DrainConfig, DrainLoop, DrainOutcome};
pub use single_flight::{FlightGuard, SingleFlight};
pub use wrapper::ProcessingWrapper;
