//! Application layer
//!
//! Wires concrete adapters from configuration and exposes the commands the
//! CLI runs.

pub mod harvest_service;

pub use harvest_service::HarvestService;
