#![allow(clippy::result_large_err)]

use std::sync::Arc;

use clap::Parser;
use miette::Diagnostic;
use miette::Result;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tracing::Level;

use crate::asserter::Asserter;
use crate::asserter::AsserterError;
use crate::asserter::CaseReport;
use crate::cli::Cli;
use crate::expander::ResolvedInstance;
use crate::outputter::OutPutter;
use crate::outputter::Summary;
use crate::parser::DdtQuest;
use crate::runner::Dispatcher;
use crate::runner::RunnerError;
use crate::runner::RunnerResult;
use crate::runner::run_cases;
use crate::validator::RunConfig;
use crate::validator::ValidationError;
use crate::validator::Validator;
use crate::validator::discover_cases;
use crate::validator::load_case;

mod asserter;
mod cli;
mod error;
mod expander;
mod extractor;
mod outputter;
mod parser;
mod runner;
mod validator;

#[derive(Error, Debug, Diagnostic)]
pub enum DdtQuestError {
    #[error("Failed to read settings file {path}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file")]
    TomlParsing(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Failed in the runner stage: {0}")]
    RunnerError(#[from] RunnerError),

    #[error("Failed in the assert stage: {0}")]
    AssertError(#[from] AsserterError),

    #[error("A pipeline task stopped unexpectedly: {0}")]
    TaskError(#[from] JoinError),

    #[error("{failed} of {total} case instances failed")]
    CasesFailed { failed: usize, total: usize },
}

/// Loads the settings file and every case file it points at.
///
/// This function:
/// - Reads and deserializes the settings file from TOML.
/// - Applies the CLI overrides and validates the result.
/// - Discovers the case files and expands each of them into its instances.
///
/// # Errors
/// Returns a `DdtQuestError` if the settings cannot be read, parsed or
/// validated, or if any case file is broken. Nothing has been sent yet at that
/// point.
fn load_and_validate_config(cli: &Cli) -> Result<(RunConfig, Vec<ResolvedInstance>), DdtQuestError> {
    let contents = std::fs::read_to_string(&cli.config).map_err(|source| {
        DdtQuestError::FileError {
            path: cli.config.clone(),
            source,
        }
    })?;
    let mut settings: DdtQuest = toml::from_str(&contents).map_err(DdtQuestError::TomlParsing)?;

    if let Some(base_url) = &cli.base_url {
        settings.setup.base_url = base_url.clone();
    }
    if let Some(jobs) = cli.jobs {
        settings.setup.concurrency = Some(jobs);
    }

    let config = Validator::new(&settings, &contents, &cli.config).validate()?;

    let mut instances = vec![];
    for path in discover_cases(&config.case_dir, &cli.cases)? {
        instances.extend(load_case(&path)?);
    }

    Ok((config, instances))
}

/// Spawns the concurrent pipeline tasks: runner, asserter, and outputter.
///
/// - **Runner:** Sends every instance and forwards the responses.
/// - **Asserter:** Turns each response into a verdict.
/// - **Outputter:** Prints verdicts as they arrive and the final summary.
///
/// The stages talk over unbounded flume channels, and each one finishes once
/// the stage before it has dropped its sender.
fn run_pipeline_tasks(
    config: RunConfig,
    instances: Vec<ResolvedInstance>,
) -> (
    JoinHandle<Result<(), RunnerError>>,
    JoinHandle<Result<(), AsserterError>>,
    JoinHandle<Summary>,
) {
    let (runner_tx, asserter_rx) = flume::unbounded::<RunnerResult>();
    let (asserter_tx, outputter_rx) = flume::unbounded::<CaseReport>();

    let n_instances = instances.len();
    let case_dir = config.case_dir.display().to_string();

    let outputter_handle =
        tokio::spawn(async move { OutPutter::start(outputter_rx, &case_dir, n_instances).await });

    let dispatcher = Arc::new(Dispatcher::new(config.dispatch));
    let concurrency = config.concurrency;
    let runner_jh =
        tokio::spawn(async move { run_cases(instances, dispatcher, concurrency, runner_tx).await });

    let asserter_jh = tokio::spawn(async move { Asserter::run(asserter_rx, asserter_tx).await });

    (runner_jh, asserter_jh, outputter_handle)
}

/// Case starts are logged by default, `--verbose` adds the raw responses.
fn log_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::INFO }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Settings and case files are fully validated and expanded before the
    // first request, a broken file never leaves a run half done.
    let (config, instances) = load_and_validate_config(&cli)?;
    let total = instances.len();

    let (runner_jh, asserter_jh, outputter_handle) = run_pipeline_tasks(config, instances);
    let (runner, asserter, summary) = futures::join!(runner_jh, asserter_jh, outputter_handle);

    finish(runner, asserter, summary, total)?;

    Ok(())
}

/// Folds the joined stage results into the outcome of the whole run.
fn finish(
    runner: Result<Result<(), RunnerError>, JoinError>,
    asserter: Result<Result<(), AsserterError>, JoinError>,
    summary: Result<Summary, JoinError>,
    total: usize,
) -> Result<(), DdtQuestError> {
    runner?.map_err(DdtQuestError::RunnerError)?;
    asserter?.map_err(DdtQuestError::AssertError)?;
    let summary = summary?;

    if summary.failed > 0 {
        return Err(DdtQuestError::CasesFailed {
            failed: summary.failed,
            total,
        });
    }

    Ok(())
}
