//! Domain module - pure types and rules of the harvest
//!
//! Nothing in here touches the network or the filesystem.

pub mod asset;
pub mod errors;
pub mod source_chain;
pub mod value_objects;

pub use asset::{AssetKind, AssetReference, CandidateSourceList, Card, LeagueRef};
pub use errors::HarvestError;
pub use source_chain::{MirrorRule, SourceChain};
pub use value_objects::{EntityKey, TeamId};
