pub mod adapters;
pub mod consensus;
pub mod decide;
pub mod drift_monitor;
pub mod fan_out;
pub mod safety_gate;
pub mod settle;
pub mod snapshot_builder;
