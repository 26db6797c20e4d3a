//! Harvest service
//!
//! Builds one run's `HarvestContext` (transport, fetcher, parser, codec,
//! writer, ledger) and drives the scheduler. Errors returned from here are
//! top-level failures: the run could not start or its entry page could not
//! be read. Per-entity failures only show up in the summary.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::crawling::{AssetAcquirer, HarvestContext, Ledger, RunStats, RunSummary, Scheduler};
use crate::domain::{LeagueRef, SourceChain};
use crate::infrastructure::{
    DdsCodec, FetchPolicy, Fetcher, HarvestConfig, HttpTransport, ImageCodec, OutputWriter,
    PageParser, PesmasterParser, ReqwestTransport,
};

pub struct HarvestService {
    scheduler: Scheduler,
}

impl HarvestService {
    /// Production wiring: reqwest transport, pesmaster parser, DDS codec
    pub fn from_config(config: HarvestConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.network)?);
        let parser = Arc::new(
            PesmasterParser::new(&config.catalog.base_url, config.catalog.league_block_index)
                .context("Failed to build page parser")?,
        );
        Self::with_adapters(config, transport, parser, Arc::new(DdsCodec))
    }

    pub fn with_adapters(
        config: HarvestConfig,
        transport: Arc<dyn HttpTransport>,
        parser: Arc<dyn PageParser>,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<Self> {
        let writer = OutputWriter::new(
            config.output.root_dir.clone(),
            &config.output.texture_extension,
            codec,
        );
        writer
            .ensure_root()
            .context("Output root is not usable")?;

        let ledger = Ledger::load(&config.output.skip_list_path())
            .context("Skip list could not be opened")?;

        let fetcher = Arc::new(Fetcher::new(
            transport,
            FetchPolicy::from_network(&config.network),
        ));
        let acquirer = AssetAcquirer::new(Arc::clone(&fetcher), SourceChain::default());

        info!(
            "✅ Harvester ready: output {}, workers {}/{}/{}",
            config.output.root_dir.display(),
            config.workers.teams,
            config.workers.players,
            config.workers.images
        );

        let ctx = HarvestContext {
            config,
            fetcher,
            parser,
            acquirer,
            ledger,
            writer: Arc::new(writer),
            stats: RunStats::default(),
        };
        Ok(Self {
            scheduler: Scheduler::new(Arc::new(ctx)),
        })
    }

    #[must_use]
    pub fn context(&self) -> &Arc<HarvestContext> {
        self.scheduler.context()
    }

    pub async fn run_catalog(&self, league_filters: &[String]) -> Result<RunSummary> {
        self.scheduler
            .run_catalog(league_filters)
            .await
            .context("Catalog run failed")
    }

    pub async fn run_updates(&self) -> Result<RunSummary> {
        self.scheduler
            .run_updates()
            .await
            .context("Updates run failed")
    }

    pub async fn list_leagues(&self) -> Result<Vec<LeagueRef>> {
        self.scheduler
            .list_leagues()
            .await
            .context("Could not read the league list")
    }

    /// Writes the livecpk lines for every group under the output root
    pub fn write_sider_ini(&self) -> Result<(PathBuf, usize)> {
        Ok(self.context().writer.write_sider_ini()?)
    }
}
