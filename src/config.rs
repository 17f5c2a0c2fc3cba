use crate::materialize::Resize;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::{Path, PathBuf};

pub const DEFAULT_ML_ROOT: &str = "/opt/ml/processing";
pub const ARCHIVE_NAME: &str = "intel_images.zip";
pub const REPO_DIR_NAME: &str = "sagemaker-intel-images";
pub const DATASET_DIR_NAME: &str = "dataset";
pub const SIDE: u32 = 224;

#[derive(Debug, Parser)]
#[command(
	name = "intel-dvc-prep",
	version,
	about = "Prepare the Intel image dataset and version it with DVC"
)]
pub struct Cli {
	#[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
	pub log_level: LogLevel,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
	Error,
	Warn,
	Info,
	Debug,
	Trace,
}

impl From<LogLevel> for LevelFilter {
	fn from(level: LogLevel) -> Self {
		match level {
			LogLevel::Error => LevelFilter::Error,
			LogLevel::Warn => LevelFilter::Warn,
			LogLevel::Info => LevelFilter::Info,
			LogLevel::Debug => LevelFilter::Debug,
			LogLevel::Trace => LevelFilter::Trace,
		}
	}
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Extract, resize and push the dataset to the DVC backed branch
	Prepare(PrepareArgs),
	/// Clone the dataset branch and pull its data from DVC storage
	Pull(RepoArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RepoArgs {
	/// Remote URL of the git repository tracking the dataset
	#[arg(long, env = "DVC_REPO_URL")]
	pub repo_url: String,

	#[arg(long, env = "DVC_BRANCH")]
	pub branch: String,

	#[arg(long, env = "ML_ROOT", default_value = DEFAULT_ML_ROOT)]
	pub ml_root: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PrepareArgs {
	#[command(flatten)]
	pub repo: RepoArgs,

	#[arg(long, env = "GIT_USER", default_value = "sagemaker")]
	pub git_user: String,

	#[arg(long, env = "GIT_EMAIL", default_value = "sagemaker-processing@example.com")]
	pub git_email: String,

	/// Leave the global git identity untouched
	#[arg(long)]
	pub skip_git_config: bool,

	#[arg(long, default_value_t = SIDE)]
	pub width: u32,

	#[arg(long, default_value_t = SIDE)]
	pub height: u32,

	/// Directory of the experiment run the commit hash is recorded to
	/// (default: <ml-root>/experiment)
	#[arg(long, env = "TRACKER_RUN_DIR")]
	pub tracker_dir: Option<PathBuf>,
}

impl PrepareArgs {
	pub fn resize(&self) -> Resize {
		Resize::new(self.width, self.height)
	}

	pub fn tracker_dir(&self) -> PathBuf {
		self.tracker_dir
			.clone()
			.unwrap_or_else(|| self.repo.ml_root.join("experiment"))
	}
}

/// Paths every step works with, all derived from the processing root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
	pub root: PathBuf,
}

impl Layout {
	pub fn new<A: AsRef<Path>>(root: A) -> Self {
		Self { root: root.as_ref().to_path_buf() }
	}

	pub fn archive(&self) -> PathBuf {
		self.root.join("input").join(ARCHIVE_NAME)
	}

	pub fn extract_dir(&self) -> PathBuf {
		self.root.join("tmp")
	}

	pub fn repo_dir(&self) -> PathBuf {
		self.root.join(REPO_DIR_NAME)
	}

	pub fn dataset_dir(&self) -> PathBuf {
		self.repo_dir().join(DATASET_DIR_NAME)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	const BASE: [&str; 6] = [
		"intel-dvc-prep",
		"prepare",
		"--repo-url",
		"https://git.example.com/data.git",
		"--branch",
		"v1",
	];

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn prepare_defaults() {
		let cli = Cli::try_parse_from(BASE).unwrap();
		let Command::Prepare(args) = cli.command else {
			panic!("expected prepare");
		};

		assert_eq!(args.repo.repo_url, "https://git.example.com/data.git");
		assert_eq!(args.repo.branch, "v1");
		assert_eq!(args.repo.ml_root, PathBuf::from(DEFAULT_ML_ROOT));
		assert_eq!(args.resize(), Resize::new(224, 224));
		assert_eq!(args.tracker_dir(), PathBuf::from("/opt/ml/processing/experiment"));
		assert!(!args.skip_git_config);
		assert_eq!(LevelFilter::from(cli.log_level), LevelFilter::Info);
	}

	#[test]
	fn prepare_overrides() {
		let mut argv = BASE.to_vec();
		argv.extend([
			"--git-user",
			"ci",
			"--git-email",
			"ci@example.com",
			"--width",
			"128",
			"--height",
			"96",
			"--ml-root",
			"/data",
			"--skip-git-config",
			"--log-level",
			"debug",
		]);
		let cli = Cli::try_parse_from(argv).unwrap();
		let Command::Prepare(args) = cli.command else {
			panic!("expected prepare");
		};

		assert_eq!(args.git_user, "ci");
		assert_eq!(args.git_email, "ci@example.com");
		assert_eq!(args.resize(), Resize::new(128, 96));
		assert_eq!(args.tracker_dir(), PathBuf::from("/data/experiment"));
		assert!(args.skip_git_config);
		assert_eq!(LevelFilter::from(cli.log_level), LevelFilter::Debug);
	}

	#[test]
	fn layout_paths() {
		let layout = Layout::new("/opt/ml/processing");

		assert_eq!(layout.archive(), PathBuf::from("/opt/ml/processing/input/intel_images.zip"));
		assert_eq!(layout.extract_dir(), PathBuf::from("/opt/ml/processing/tmp"));
		assert_eq!(layout.repo_dir(), PathBuf::from("/opt/ml/processing/sagemaker-intel-images"));
		assert_eq!(
			layout.dataset_dir(),
			PathBuf::from("/opt/ml/processing/sagemaker-intel-images/dataset")
		);
	}
}
