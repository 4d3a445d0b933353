//! # workitem-agent
//!
//! Drains a work-item queue: pops each pending workitem, runs it through a
//! processor, and reports the result (plus any files the processor wrote)
//! back to the queue service.
//!
//! The queue service is reached through the [`client::QueueClient`] trait;
//! [`engine::DrainLoop`] does the popping under a single-flight guard and
//! [`agent::Agent`] wires the two together at startup.

pub mod agent;
pub mod client;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod processor;
pub mod snapshot;
pub mod telemetry;
