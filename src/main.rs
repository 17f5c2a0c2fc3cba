//! Extracts the Intel image classification archive, resizes it into a train/test tree and versions
//! that tree with DVC on a git branch.

mod config;
mod error;
mod extract;
mod materialize;
mod partition;
mod pull;
mod tracker;
mod vcs;

use crate::config::{Cli, Command, Layout, PrepareArgs, DATASET_DIR_NAME};
use crate::error::Result;
use crate::partition::Partition;
use crate::vcs::{CommandRunner, Git, SyncOutcome, Synchronizer, SystemRunner};
use clap::Parser;
use log::info;
use simple_logger::SimpleLogger;
use std::time::SystemTime;

fn main() -> Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new().with_level(cli.log_level.into()).init()?;

    let time = SystemTime::now();
    let runner = SystemRunner;

    match cli.command {
        Command::Prepare(args) => {
            prepare(&runner, &args)?;
        }
        Command::Pull(args) => {
            pull::pull(&runner, &args)?;
        }
    }

    if let Ok(elapsed) = time.elapsed() {
        info!("Finished in {:.3}s", elapsed.as_millis() as f64 / 1000.0);
    }
    Ok(())
}

/// Runs the whole preparation: identity, clone, extract, resize, sync and record.
pub fn prepare<R: CommandRunner>(runner: &R, args: &PrepareArgs) -> Result<SyncOutcome> {
    let layout = Layout::new(&args.repo.ml_root);

    if args.skip_git_config {
        info!(":: Keeping existing git identity");
    } else {
        info!(":: Configuring Git");
        Git::configure_identity(runner, &args.git_user, &args.git_email)?;
    }

    info!(":: Cloning Git");
    info!("\t:: Cloning repo: {}", args.repo.repo_url);
    let git = Git::clone_repo(runner, &args.repo.repo_url, &layout.repo_dir())?;

    info!(":: Generate Train Test Split");
    extract::extract_fresh(layout.archive(), layout.extract_dir())?;
    let partition = Partition::from_extracted(layout.extract_dir())?;
    info!(":: Found {} images", partition.total());
    materialize::materialize(&partition, layout.dataset_dir(), args.resize())?;

    info!(":: Sync Processed Data to Git & DVC");
    let outcome = Synchronizer::new(git).sync(&args.repo.branch, DATASET_DIR_NAME)?;

    tracker::record_commit(args.tracker_dir(), &outcome.commit)?;
    Ok(outcome)
}
