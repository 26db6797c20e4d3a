use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};

use miniface_harvester_lib::application::HarvestService;
use miniface_harvester_lib::cli::{Cli, Command};
use miniface_harvester_lib::crawling::RunSummary;
use miniface_harvester_lib::infrastructure::{HarvestConfig, init_logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match HarvestConfig::load(cli.global.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.global.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("❌ {e}");
        return ExitCode::FAILURE;
    }

    // Held until exit so the file writer flushes
    let _logging = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = HarvestConfig::source_file(cli.global.config.as_deref()) {
        info!("📄 Loaded configuration from {}", path.display());
    }
    debug!("Effective configuration: {:?}", config);

    match run(cli.command, cli.global.json_summary, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, json_summary: bool, config: HarvestConfig) -> Result<()> {
    let service = HarvestService::from_config(config)?;

    match command {
        Command::Catalog { leagues } => {
            let summary = service.run_catalog(&leagues).await?;
            print_summary(&summary, json_summary)
        }
        Command::Updates => {
            let summary = service.run_updates().await?;
            print_summary(&summary, json_summary)
        }
        Command::Leagues => {
            for league in service.list_leagues().await? {
                println!("{},{},{}", league.key, league.name, league.url);
            }
            Ok(())
        }
        Command::SiderIni => {
            let (path, groups) = service.write_sider_ini()?;
            println!("Wrote {} livecpk line(s) to {}", groups, path.display());
            Ok(())
        }
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}
