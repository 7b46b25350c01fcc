mod cli;
mod config;
mod error;
mod loader;
mod logging;
mod narrator;
mod report;
mod store;
mod supervisor;
mod ui;
mod worker;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, RunOpts};
use config::MarkingConfig;
use store::{ExamRecord, RubricLine};
use supervisor::Supervisor;
use ui::Summary;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    ExitCode::from(exit_status(run(cli).await))
}

/// 0 when the command completed, 1 after printing the error.
fn exit_status(result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            Summary::default().print_error(&e);
            1
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = MarkingConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }

    match cli.command {
        Command::Run {
            rubric,
            exams,
            opts,
        } => {
            let rubric = loader::load_rubric(&rubric)?;
            let catalog = loader::load_exam_list(&exams)?;
            execute(config, opts, rubric, catalog).await
        }
        Command::Demo { opts } => {
            let (rubric, catalog) = loader::demo_inputs();
            execute(config, opts, rubric, catalog).await
        }
        Command::Check { rubric, exams } => {
            let rubric = loader::load_rubric(&rubric)?;
            let catalog = loader::load_exam_list(&exams)?;
            Summary::default().print_inputs(&rubric, &catalog);
            Ok(())
        }
    }
}

async fn execute(
    mut config: MarkingConfig,
    opts: RunOpts,
    rubric: Vec<RubricLine>,
    catalog: Vec<ExamRecord>,
) -> Result<()> {
    if let Some(scale) = opts.time_scale {
        config.time_scale = scale;
        config.validate()?;
    }
    let workers = opts.tas.unwrap_or(config.workers);
    let supervisor = Supervisor::new(config, workers)?;

    let report = supervisor
        .run_variant(opts.variant.into(), rubric, catalog, Box::new(std::io::stdout()))
        .await?;

    let summary = Summary::default();
    summary.print(&report);
    if opts.json {
        summary.print_json(&report);
    }
    Ok(())
}
