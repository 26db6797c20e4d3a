//! Page parser for the pesmaster.com catalog layout
//!
//! Edition root → `div.team-block-container` blocks (leagues live in block 1
//! since the 2022 layout), league page → team blocks, team page / updates
//! feed → `div.player-card-container` links, player page → `figure.player-card`
//! cards whose `img[data-src]` attributes carry the crest and portrait paths.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::PageParser;
use crate::domain::{AssetKind, AssetReference, Card, EntityKey, HarvestError, LeagueRef};

const VARIATION_MARKER: &str = "/Variation2022/";
const PLAYER_GRAPHICS_MARKER: &str = "graphics/players/";
const TEAM_LOGO_MARKER: &str = "teamlogos";
const BACKGROUND_MARKER: &str = "_b02";

pub struct PesmasterParser {
    base_url: Url,
    league_block_index: usize,
    block_container: Selector,
    block_name: Selector,
    team_block_link: Selector,
    anchor: Selector,
    card_container: Selector,
    card_figure: Selector,
    card_image: Selector,
}

impl PesmasterParser {
    pub fn new(base_url: &str, league_block_index: usize) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow!("Invalid catalog base URL '{}': {}", base_url, e))?;

        Ok(Self {
            base_url,
            league_block_index,
            block_container: compile("div.team-block-container")?,
            block_name: compile("span.team-block-name")?,
            team_block_link: compile("div.team-block a[href]")?,
            anchor: compile("a[href]")?,
            card_container: compile("div.player-card-container")?,
            card_figure: compile("figure.player-card")?,
            card_image: compile("img[data-src]")?,
        })
    }

    fn absolute(&self, href: &str) -> Option<String> {
        match self.base_url.join(href.trim()) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Ignoring unresolvable link '{}': {}", href, e);
                None
            }
        }
    }

    fn hrefs<'a>(&self, scope: ElementRef<'a>, selector: &Selector) -> Vec<&'a str> {
        scope
            .select(selector)
            .filter_map(|a| a.value().attr("href"))
            .collect()
    }

    fn classify_image(&self, src: &str) -> Option<AssetReference> {
        if src.contains(TEAM_LOGO_MARKER) {
            let name = src
                .split_once("/teamlogos/")
                .map_or(src, |(_, rest)| rest)
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string();
            return Some(AssetReference {
                kind: AssetKind::TeamCrest,
                entity: None,
                name,
                url: self.absolute(src)?,
                is_default_variant: false,
            });
        }

        if !src.contains("graphics/players") {
            return None;
        }

        let (name, is_default_variant) = match src.split_once(VARIATION_MARKER) {
            Some((_, rest)) => (first_segment(rest), false),
            None => (
                first_segment(src.rsplit_once(PLAYER_GRAPHICS_MARKER).map_or(src, |(_, rest)| rest)),
                true,
            ),
        };
        let url = self.absolute(src)?;

        if !name.contains('b') && !name.contains("dummy") {
            let entity = match EntityKey::canonicalize(name) {
                Ok(key) => Some(key),
                Err(e) => {
                    debug!("Portrait without a usable id: {}", e);
                    None
                }
            };
            Some(AssetReference {
                kind: AssetKind::ForegroundPortrait,
                entity,
                name: name.to_string(),
                url,
                is_default_variant,
            })
        } else if name.contains(BACKGROUND_MARKER) {
            Some(AssetReference {
                kind: AssetKind::BackgroundEvent,
                entity: None,
                name: name.to_string(),
                url,
                is_default_variant,
            })
        } else {
            None
        }
    }
}

impl PageParser for PesmasterParser {
    fn parse_league_list(&self, html: &str) -> Result<Vec<LeagueRef>, HarvestError> {
        let document = Html::parse_document(html);
        let block = document
            .select(&self.block_container)
            .nth(self.league_block_index)
            .ok_or_else(|| {
                HarvestError::structure(
                    "league list",
                    format!("no team-block-container at index {}", self.league_block_index),
                )
            })?;

        let names: Vec<String> = block
            .select(&self.block_name)
            .map(|span| span.text().collect::<String>().trim().to_string())
            .collect();
        let links = self.hrefs(block, &self.anchor);

        let leagues: Vec<LeagueRef> = links
            .into_iter()
            .enumerate()
            .filter_map(|(idx, href)| {
                let url = self.absolute(href)?;
                let key = league_key(href);
                let name = names.get(idx).cloned().unwrap_or_else(|| key.clone());
                Some(LeagueRef { key, name, url })
            })
            .collect();

        debug!("Found {} leagues", leagues.len());
        Ok(leagues)
    }

    fn parse_team_list(&self, html: &str) -> Result<Vec<String>, HarvestError> {
        let document = Html::parse_document(html);
        let block = document
            .select(&self.block_container)
            .next()
            .ok_or_else(|| HarvestError::structure("team list", "no team-block-container"))?;

        Ok(dedup(
            self.hrefs(block, &self.team_block_link)
                .into_iter()
                .filter_map(|href| self.absolute(href)),
        ))
    }

    fn parse_card_list(&self, html: &str) -> Result<Vec<String>, HarvestError> {
        let document = Html::parse_document(html);
        let containers: Vec<ElementRef> = document.select(&self.card_container).collect();
        if containers.is_empty() {
            return Err(HarvestError::structure("player list", "no player-card-container"));
        }

        Ok(dedup(
            containers
                .into_iter()
                .flat_map(|container| self.hrefs(container, &self.anchor))
                .filter(|href| href.contains("/player/"))
                .filter_map(|href| self.absolute(href)),
        ))
    }

    fn parse_player_cards(&self, html: &str) -> Result<Vec<Card>, HarvestError> {
        let document = Html::parse_document(html);
        let container = document
            .select(&self.card_container)
            .last()
            .ok_or_else(|| HarvestError::structure("player page", "no player-card-container"))?;

        let cards: Vec<Card> = container
            .select(&self.card_figure)
            .enumerate()
            .map(|(index, figure)| Card {
                index,
                image_sources: figure
                    .select(&self.card_image)
                    .filter_map(|img| img.value().attr("data-src"))
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        // A container without figures means the card markup changed, not
        // that the player has no cards.
        if cards.is_empty() {
            return Err(HarvestError::structure("player page", "no player-card figure"));
        }
        Ok(cards)
    }

    fn parse_card(&self, card: &Card) -> Vec<AssetReference> {
        card.image_sources
            .iter()
            .filter_map(|src| self.classify_image(src))
            .collect()
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Failed to compile selector '{}': {}", selector, e))
}

fn first_segment(path: &str) -> &str {
    path.split(['/', '?', '#']).next().unwrap_or_default()
}

/// `/league/<key>/` segment of a league link, else its last path segment
fn league_key(href: &str) -> String {
    let key = match href.rsplit_once("/league/") {
        Some((_, rest)) => rest.split('/').find(|segment| !segment.is_empty()),
        None => href.split('/').filter(|segment| !segment.is_empty()).next_back(),
    };
    key.unwrap_or_default().to_string()
}

fn dedup(urls: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}
