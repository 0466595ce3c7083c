//! HTTP operator API for the conveyor pipeline.

pub mod api;
pub mod metrics;
pub mod state;
