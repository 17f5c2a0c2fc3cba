use crate::config::{Layout, RepoArgs};
use crate::error::Result;
use crate::partition::Split;
use crate::vcs::{CommandRunner, Dvc, Git};
use log::info;
use std::fs::read_dir;
use std::path::Path;

/// Class directories present under `<dataset root>/<split>`, sorted.
pub fn classes<A: AsRef<Path>>(dataset_root: A, split: Split) -> Result<Vec<String>> {
	let split_dir = dataset_root.as_ref().join(split.dir_name());
	if !split_dir.is_dir() {
		return Ok(Vec::new());
	}

	let mut classes = Vec::new();
	for entry in read_dir(split_dir)? {
		let entry = entry?;
		if entry.file_type()?.is_dir() {
			classes.push(entry.file_name().to_string_lossy().into_owned());
		}
	}
	classes.sort();
	Ok(classes)
}

/// Fetches the dataset version stored on `args.branch` into the processing root.
pub fn pull<R: CommandRunner>(runner: &R, args: &RepoArgs) -> Result<Vec<String>> {
	let layout = Layout::new(&args.ml_root);
	let repo_dir = layout.repo_dir();

	info!(":: Cloning repo: {}, git branch: {}", args.repo_url, args.branch);
	Git::shallow_clone_branch(runner, &args.repo_url, &args.branch, &repo_dir)?;

	info!(":: Pull from DVC");
	Dvc::new(runner, &repo_dir).pull()?;

	let classes = classes(layout.dataset_dir(), Split::Train)?;
	info!(":: Classnames: {classes:?}");
	Ok(classes)
}
