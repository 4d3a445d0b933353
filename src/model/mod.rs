//! Core data model.

pub mod workitem;

pub use workitem::{ErrorType, State, Workitem};
