//! Miniface Harvester - eFootball player portrait harvesting
//!
//! Walks the catalog league → team → player → card, fetches each card's
//! portrait (falling back across mirrors), composites it over its event
//! background and writes DDS textures into a per-group folder tree. Progress
//! survives restarts through a durable skip-list and the output tree itself.

pub mod application;
pub mod cli;
pub mod crawling;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;
