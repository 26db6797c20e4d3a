//! Hierarchical scheduler
//!
//! League → team → player → card, each level a bounded pool:
//! - leagues are walked one at a time (club leagues first, national last)
//! - up to `workers.teams` teams per league
//! - up to `workers.players` players per team
//! - up to `workers.images` image fetches per player
//!
//! Every task's result is collected independently; a failing or panicking
//! task is counted and never aborts its siblings.

#![allow(clippy::uninlined_format_args)]

use chrono::Local;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use url::Url;

use super::acquisition::{AcquireFailure, Acquired};
use super::state::{HarvestContext, RunStats, RunSummary};
use crate::domain::{AssetKind, AssetReference, Card, EntityKey, HarvestError, LeagueRef, TeamId};
use crate::infrastructure::output_writer::{MaterializeOutcome, OutputPath};

/// Work derived from one card: the texture to produce and its sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPlan {
    pub team: TeamId,
    pub entity: EntityKey,
    pub foreground: AssetReference,
    pub background: Option<AssetReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardOutcome {
    Committed,
    AlreadyPresent,
    /// Portrait absent on every mirror
    Absent,
    /// Transient or codec failure; retry on a later run
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerOutcome {
    Done,
    Skipped,
    KnownSkipped,
    Duplicate,
    Malformed,
    Failed,
}

pub struct Scheduler {
    ctx: Arc<HarvestContext>,
}

impl Scheduler {
    pub fn new(ctx: Arc<HarvestContext>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<HarvestContext> {
        &self.ctx
    }

    /// Leagues of the configured edition, in catalog order
    pub async fn list_leagues(&self) -> Result<Vec<LeagueRef>, HarvestError> {
        let root = self.ctx.config.catalog.edition_url();
        let page = self.ctx.fetcher.fetch_document(&root).await?;
        self.ctx
            .parser
            .parse_league_list(&String::from_utf8_lossy(&page.bytes))
    }

    /// Full catalog run. `filters` restricts to leagues matching by key or
    /// name; empty means every league.
    pub async fn run_catalog(&self, filters: &[String]) -> Result<RunSummary, HarvestError> {
        let leagues = order_leagues(self.list_leagues().await?, filters);
        info!("🚀 Harvesting {} leagues", leagues.len());

        for league in &leagues {
            RunStats::bump(&self.ctx.stats.leagues);
            info!("📋 League {} ({})", league.name, league.key);
            if let Err(e) = self.run_league(league).await {
                RunStats::bump(&self.ctx.stats.leagues_failed);
                error!("❌ League {} failed: {}", league.name, e);
            }
        }

        let summary = self.ctx.stats.summary();
        info!(
            "🎯 Catalog run complete ({} backgrounds fetched)",
            self.ctx.acquirer.cached_backgrounds()
        );
        Ok(summary)
    }

    /// Updates-only run over the catalog's featured feed
    pub async fn run_updates(&self) -> Result<RunSummary, HarvestError> {
        let feed_url = self.ctx.config.catalog.updates_url();
        let feed = self.ctx.fetcher.fetch_document(&feed_url).await?;
        let group = updates_group(&feed.final_url);
        let players = self
            .ctx
            .parser
            .parse_card_list(&String::from_utf8_lossy(&feed.bytes))?;

        info!("🚀 Harvesting {} updated players into {}", players.len(), group);
        process_players(&self.ctx, players, &group).await;

        let summary = self.ctx.stats.summary();
        info!(
            "🎯 Updates run complete ({} backgrounds fetched)",
            self.ctx.acquirer.cached_backgrounds()
        );
        Ok(summary)
    }

    async fn run_league(&self, league: &LeagueRef) -> Result<(), HarvestError> {
        let page = self.ctx.fetcher.fetch_document(&league.url).await?;
        let teams = self
            .ctx
            .parser
            .parse_team_list(&String::from_utf8_lossy(&page.bytes))?;
        info!("Found {} teams in {}", teams.len(), league.name);

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.workers.teams));
        let tasks: Vec<_> = teams
            .into_iter()
            .map(|team_url| {
                let ctx = Arc::clone(&self.ctx);
                let semaphore = Arc::clone(&semaphore);
                let group = league.name.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    RunStats::bump(&ctx.stats.teams);
                    let result = process_team(&ctx, &team_url, &group).await;
                    (team_url, result)
                })
            })
            .collect();

        for result in join_all(tasks).await {
            match result {
                Ok((_, Ok(()))) => {}
                Ok((team_url, Err(e))) => {
                    RunStats::bump(&self.ctx.stats.teams_failed);
                    error!("❌ Team {} failed: {}", team_url, e);
                }
                Err(e) => {
                    RunStats::bump(&self.ctx.stats.teams_failed);
                    error!("❌ Team task join failed: {}", e);
                }
            }
        }
        Ok(())
    }
}

async fn process_team(ctx: &Arc<HarvestContext>, team_url: &str, group: &str) -> Result<(), HarvestError> {
    let page = ctx.fetcher.fetch_document(team_url).await?;
    let players = ctx
        .parser
        .parse_card_list(&String::from_utf8_lossy(&page.bytes))?;
    debug!("Team {}: {} players", team_url, players.len());
    process_players(ctx, players, group).await;
    Ok(())
}

async fn process_players(ctx: &Arc<HarvestContext>, players: Vec<String>, group: &str) {
    let semaphore = Arc::new(Semaphore::new(ctx.config.workers.players));
    let tasks: Vec<_> = players
        .into_iter()
        .map(|player_url| {
            let ctx = Arc::clone(ctx);
            let semaphore = Arc::clone(&semaphore);
            let group = group.to_string();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                process_player(&ctx, &player_url, &group).await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        if let Err(e) = result {
            RunStats::bump(&ctx.stats.failed);
            error!("❌ Player task join failed: {}", e);
        }
    }
}

/// Processes one player end to end and records the outcome in the ledger
/// and the statistics. Never fails: every error becomes an outcome.
pub async fn process_player(ctx: &Arc<HarvestContext>, player_url: &str, group: &str) -> PlayerOutcome {
    let stats = &ctx.stats;
    RunStats::bump(&stats.players_seen);

    let key = match EntityKey::canonicalize(player_url) {
        Ok(key) => key,
        Err(e) => {
            RunStats::bump(&stats.malformed);
            warn!("Skipping player: {}", e);
            return PlayerOutcome::Malformed;
        }
    };

    if ctx.ledger.is_skipped(key) {
        RunStats::bump(&stats.skipped_known);
        debug!("Player {} is on the skip list", key);
        return PlayerOutcome::KnownSkipped;
    }
    if !ctx.ledger.claim(key) {
        RunStats::bump(&stats.duplicates);
        debug!("Player {} already handled through another path", key);
        return PlayerOutcome::Duplicate;
    }

    let page = match ctx.fetcher.fetch_document(player_url).await {
        Ok(page) => page,
        Err(HarvestError::NotFound { .. }) => return skip(ctx, key).await,
        Err(e) => {
            RunStats::bump(&stats.failed);
            error!("❌ Player {} ({}): {}", key, e.kind(), e);
            return PlayerOutcome::Failed;
        }
    };

    let cards = match ctx
        .parser
        .parse_player_cards(&String::from_utf8_lossy(&page.bytes))
    {
        Ok(cards) => cards,
        Err(e) => {
            RunStats::bump(&stats.failed);
            error!("❌ Player {} ({}): {}", key, e.kind(), e);
            return PlayerOutcome::Failed;
        }
    };

    let plans = match plan_cards(ctx, &cards) {
        Ok(plans) => plans,
        Err(e) => {
            RunStats::bump(&stats.failed);
            error!("❌ Player {} ({}): {}", key, e.kind(), e);
            return PlayerOutcome::Failed;
        }
    };
    if plans.is_empty() {
        debug!("Player {} has no acquirable card", key);
        return skip(ctx, key).await;
    }

    let images = Semaphore::new(ctx.config.workers.images);
    let outcomes = join_all(plans.iter().map(|plan| process_card(ctx, &images, plan, group))).await;

    if outcomes.contains(&CardOutcome::Failed) {
        RunStats::bump(&stats.failed);
        warn!("Player {} left unresolved for a later run", key);
        PlayerOutcome::Failed
    } else if outcomes
        .iter()
        .any(|o| matches!(o, CardOutcome::Committed | CardOutcome::AlreadyPresent))
    {
        ctx.ledger.mark_done(key);
        RunStats::bump(&stats.players_done);
        debug!("✅ Player {} done", key);
        PlayerOutcome::Done
    } else {
        skip(ctx, key).await
    }
}

/// Persists a permanent skip on the blocking pool; the skip-list append
/// ends with an fsync.
async fn skip(ctx: &Arc<HarvestContext>, key: EntityKey) -> PlayerOutcome {
    let persist = Arc::clone(ctx);
    let result = tokio::task::spawn_blocking(move || persist.ledger.mark_skipped(key))
        .await
        .unwrap_or_else(|e| Err(HarvestError::io("persisting skip", std::io::Error::other(e))));

    match result {
        Ok(_) => {
            RunStats::bump(&ctx.stats.permanently_skipped);
            debug!("Player {} permanently skipped", key);
            PlayerOutcome::Skipped
        }
        Err(e) => {
            RunStats::bump(&ctx.stats.failed);
            error!("❌ Could not persist skip for {}: {}", key, e);
            PlayerOutcome::Failed
        }
    }
}

/// One plan per distinct output path.
///
/// A card's team comes from its own crest, else from the closest crest seen
/// earlier on the page, else from the first crest after it. A portrait with
/// no crest anywhere on the page is a structure mismatch: the player stays
/// unresolved instead of being skipped.
fn plan_cards(ctx: &HarvestContext, cards: &[Card]) -> Result<Vec<CardPlan>, HarvestError> {
    let references: Vec<Vec<AssetReference>> = cards.iter().map(|card| ctx.parser.parse_card(card)).collect();
    let crests: Vec<Option<TeamId>> = references
        .iter()
        .map(|refs| {
            refs.iter()
                .filter(|r| r.kind == AssetKind::TeamCrest)
                .find_map(|r| r.team_id().ok())
        })
        .collect();

    let mut plans: Vec<CardPlan> = Vec::new();

    for (idx, (card, refs)) in cards.iter().zip(&references).enumerate() {
        let foreground = refs
            .iter()
            .rfind(|r| r.kind == AssetKind::ForegroundPortrait && r.is_acquirable());
        let (Some(foreground), Some(entity)) = (foreground, foreground.and_then(|r| r.entity)) else {
            continue;
        };

        let team = crests[idx]
            .or_else(|| crests[..idx].iter().rev().flatten().next().copied())
            .or_else(|| crests[idx + 1..].iter().flatten().next().copied());
        let Some(team) = team else {
            return Err(HarvestError::structure(
                "player page",
                format!("card {} has a portrait but no team crest on the page", card.index),
            ));
        };
        if crests[idx].is_none() {
            debug!("Card {} has no crest, using team {} from the page", card.index, team);
        }

        let background = refs
            .iter()
            .rfind(|r| r.kind == AssetKind::BackgroundEvent)
            .cloned();

        if plans.iter().any(|p| p.team == team && p.entity == entity) {
            continue;
        }
        plans.push(CardPlan {
            team,
            entity,
            foreground: foreground.clone(),
            background,
        });
    }

    Ok(plans)
}

async fn acquire_limited(ctx: &HarvestContext, images: &Semaphore, reference: &AssetReference) -> Acquired {
    let _permit = images.acquire().await.ok();
    ctx.acquirer.acquire(reference).await
}

async fn process_card(
    ctx: &Arc<HarvestContext>,
    images: &Semaphore,
    plan: &CardPlan,
    group: &str,
) -> CardOutcome {
    let path = OutputPath::new(group, plan.team, plan.entity);
    if ctx.writer.exists(&path) {
        let writer = Arc::clone(&ctx.writer);
        let target = path.clone();
        match tokio::task::spawn_blocking(move || writer.record(&target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("❌ Recording {} in manifests: {}", plan.entity, e);
                return CardOutcome::Failed;
            }
            Err(e) => {
                error!("❌ Manifest task join failed: {}", e);
                return CardOutcome::Failed;
            }
        }
        RunStats::bump(&ctx.stats.textures_present);
        debug!("{} already materialized", ctx.writer.texture_path(&path).display());
        return CardOutcome::AlreadyPresent;
    }

    let (foreground, background) = tokio::join!(
        acquire_limited(ctx, images, &plan.foreground),
        async {
            match &plan.background {
                Some(reference) => Some(acquire_limited(ctx, images, reference).await),
                None => None,
            }
        }
    );

    let foreground = match foreground {
        Ok(bytes) => bytes,
        Err(AcquireFailure::NotFound) => {
            debug!("Portrait {} absent on every mirror", plan.foreground.name);
            return CardOutcome::Absent;
        }
        Err(failure) => {
            error!("❌ {}", failure.into_error(&plan.foreground.url));
            return CardOutcome::Failed;
        }
    };

    let background = match background {
        None => None,
        Some(Ok(bytes)) => Some(bytes),
        Some(Err(AcquireFailure::NotFound)) => {
            debug!("Background for {} absent, writing portrait only", plan.entity);
            None
        }
        Some(Err(failure)) => {
            let reference = plan.background.as_ref().map_or("", |r| r.url.as_str());
            error!("❌ {}", failure.into_error(reference));
            return CardOutcome::Failed;
        }
    };

    let writer = Arc::clone(&ctx.writer);
    let target = path.clone();
    let result = tokio::task::spawn_blocking(move || {
        writer.materialize(&target, &foreground, background.as_deref().map(Vec::as_slice))
    })
    .await;

    match result {
        Ok(Ok(MaterializeOutcome::Committed)) => {
            RunStats::bump(&ctx.stats.textures_written);
            debug!("✅ Wrote {}", ctx.writer.texture_path(&path).display());
            CardOutcome::Committed
        }
        Ok(Ok(MaterializeOutcome::AlreadyExists)) => {
            RunStats::bump(&ctx.stats.textures_present);
            CardOutcome::AlreadyPresent
        }
        Ok(Err(e)) => {
            error!("❌ Materializing {} ({}): {}", plan.entity, e.kind(), e);
            CardOutcome::Failed
        }
        Err(e) => {
            error!("❌ Codec task join failed: {}", e);
            CardOutcome::Failed
        }
    }
}

/// Applies the league filter, then moves national-team leagues to the end
/// while keeping catalog order within each class.
#[must_use]
pub fn order_leagues(leagues: Vec<LeagueRef>, filters: &[String]) -> Vec<LeagueRef> {
    let selected = leagues
        .into_iter()
        .filter(|league| filters.is_empty() || filters.iter().any(|f| league.matches(f)));
    let (national, clubs): (Vec<_>, Vec<_>) = selected.partition(LeagueRef::is_national);
    clubs.into_iter().chain(national).collect()
}

/// Group name for an updates run: the feed's `date` query parameter, else
/// today's local date.
#[must_use]
pub fn updates_group(final_url: &str) -> String {
    Url::parse(final_url)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(name, _)| name == "date")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|date| !date.trim().is_empty())
        .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string())
}
