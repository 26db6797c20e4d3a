//! HTML parsing infrastructure
//!
//! The scheduler only sees the `PageParser` trait. Documents are parsed
//! synchronously into owned values, so no parser state is ever held across
//! an await point.

pub mod pesmaster;

pub use pesmaster::PesmasterParser;

use crate::domain::{AssetReference, Card, HarvestError, LeagueRef};

pub trait PageParser: Send + Sync {
    /// Leagues listed on the edition root page, in catalog order
    fn parse_league_list(&self, html: &str) -> Result<Vec<LeagueRef>, HarvestError>;

    /// Absolute team page URLs on a league page
    fn parse_team_list(&self, html: &str) -> Result<Vec<String>, HarvestError>;

    /// Absolute player page URLs on a team page or the updates feed
    fn parse_card_list(&self, html: &str) -> Result<Vec<String>, HarvestError>;

    /// Cards shown on a player's detail page
    fn parse_player_cards(&self, html: &str) -> Result<Vec<Card>, HarvestError>;

    /// Classifies the image references of one card
    fn parse_card(&self, card: &Card) -> Vec<AssetReference>;
}
