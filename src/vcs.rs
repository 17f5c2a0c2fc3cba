use crate::error::{PrepError, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	pub success: bool,
	pub status: String,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	/// Turns a non-zero exit into [`PrepError::CommandFailed`].
	pub fn check(self, program: &str, args: &[&str]) -> Result<Self> {
		if self.success {
			return Ok(self);
		}

		Err(PrepError::CommandFailed {
			program: program.to_string(),
			args: args.iter().map(|arg| arg.to_string()).collect(),
			status: self.status,
			stderr: self.stderr.trim().to_string(),
		})
	}
}

/// Seam between the synchronizer and the processes it drives.
pub trait CommandRunner {
	fn run(&self, cwd: Option<&Path>, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands as child processes, blocking until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
	fn run(&self, cwd: Option<&Path>, program: &str, args: &[&str]) -> Result<CommandOutput> {
		let mut command = Command::new(program);
		command.args(args);
		if let Some(cwd) = cwd {
			command.current_dir(cwd);
		}

		debug!("$ {program} {}", args.join(" "));
		let output = command.output().map_err(|source| PrepError::CommandSpawn {
			program: program.to_string(),
			source,
		})?;

		Ok(CommandOutput {
			success: output.status.success(),
			status: output.status.to_string(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}
}

fn path_arg(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}

/// How the target branch ended up checked out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BranchResolution {
	Created,
	Existing,
}

/// Git commands bound to one work tree.
pub struct Git<'r, R: CommandRunner> {
	runner: &'r R,
	work_tree: PathBuf,
}

impl<'r, R: CommandRunner> Git<'r, R> {
	pub const PROGRAM: &'static str = "git";

	pub fn new<A: AsRef<Path>>(runner: &'r R, work_tree: A) -> Self {
		Self {
			runner,
			work_tree: work_tree.as_ref().to_path_buf(),
		}
	}

	pub fn work_tree(&self) -> &Path {
		&self.work_tree
	}

	fn raw(&self, args: &[&str]) -> Result<CommandOutput> {
		self.runner.run(Some(&self.work_tree), Self::PROGRAM, args)
	}

	fn git(&self, args: &[&str]) -> Result<CommandOutput> {
		self.raw(args)?.check(Self::PROGRAM, args)
	}

	/// Sets the committer identity in the global git config.
	pub fn configure_identity(runner: &R, user: &str, email: &str) -> Result<()> {
		let settings = [("user.email", email), ("user.name", user)];
		for (key, value) in settings {
			let args = ["config", "--global", key, value];
			runner.run(None, Self::PROGRAM, &args)?.check(Self::PROGRAM, &args)?;
		}
		Ok(())
	}

	fn ensure_empty_target(dest: &Path) -> Result<()> {
		if dest.exists() && dest.read_dir()?.next().is_some() {
			return Err(PrepError::CloneTargetNotEmpty(dest.to_path_buf()));
		}
		Ok(())
	}

	pub fn clone_repo(runner: &'r R, url: &str, dest: &Path) -> Result<Self> {
		Self::ensure_empty_target(dest)?;

		let dest_arg = path_arg(dest);
		let args = ["clone", url, dest_arg.as_str()];
		runner.run(None, Self::PROGRAM, &args)?.check(Self::PROGRAM, &args)?;

		Ok(Self::new(runner, dest))
	}

	/// Clones only the tip of `branch`.
	pub fn shallow_clone_branch(
		runner: &'r R,
		url: &str,
		branch: &str,
		dest: &Path,
	) -> Result<Self> {
		Self::ensure_empty_target(dest)?;

		let dest_arg = path_arg(dest);
		let args = ["clone", "--depth", "1", "--branch", branch, url, dest_arg.as_str()];
		runner.run(None, Self::PROGRAM, &args)?.check(Self::PROGRAM, &args)?;

		Ok(Self::new(runner, dest))
	}

	pub fn validate_branch_name(&self, branch: &str) -> Result<()> {
		if self.raw(&["check-ref-format", "--branch", branch])?.success {
			Ok(())
		} else {
			Err(PrepError::InvalidBranchName(branch.to_string()))
		}
	}

	fn has_ref(&self, reference: &str) -> Result<bool> {
		Ok(self.raw(&["rev-parse", "--verify", "--quiet", reference])?.success)
	}

	/// Switches to `branch` when it exists locally or on `origin` (tracking the remote one),
	/// otherwise creates it from the current HEAD.
	pub fn resolve_branch(&self, branch: &str) -> Result<BranchResolution> {
		self.validate_branch_name(branch)?;

		let checkout = if self.has_ref(&format!("refs/heads/{branch}"))? {
			self.raw(&["checkout", branch])?
		} else if self.has_ref(&format!("refs/remotes/origin/{branch}"))? {
			let upstream = format!("origin/{branch}");
			self.raw(&["checkout", "-b", branch, "--track", &upstream])?
		} else {
			self.git(&["checkout", "-b", branch])?;
			return Ok(BranchResolution::Created);
		};

		if !checkout.success {
			return Err(PrepError::BranchCheckout {
				branch: branch.to_string(),
				stderr: checkout.stderr.trim().to_string(),
			});
		}
		Ok(BranchResolution::Existing)
	}

	pub fn add_all(&self) -> Result<()> {
		self.git(&["add", "--all"]).map(|_| ())
	}

	pub fn commit(&self, message: &str) -> Result<()> {
		self.git(&["commit", "-m", message]).map(|_| ())
	}

	pub fn head_commit(&self) -> Result<String> {
		Ok(self.git(&["rev-parse", "HEAD"])?.stdout.trim().to_string())
	}

	/// Hash `origin` currently holds for `branch`, if the branch exists there.
	pub fn remote_head(&self, branch: &str) -> Result<Option<String>> {
		let reference = format!("refs/heads/{branch}");
		let output = self.git(&["ls-remote", "origin", &reference])?;

		Ok(output
			.stdout
			.lines()
			.find_map(|line| line.split_whitespace().next())
			.map(str::to_string))
	}

	pub fn push_force_upstream(&self, branch: &str) -> Result<()> {
		self.git(&["push", "--set-upstream", "origin", branch, "--force"]).map(|_| ())
	}
}

/// DVC commands bound to one repository.
pub struct Dvc<'r, R: CommandRunner> {
	runner: &'r R,
	repo: PathBuf,
}

impl<'r, R: CommandRunner> Dvc<'r, R> {
	pub const PROGRAM: &'static str = "dvc";

	pub fn new<A: AsRef<Path>>(runner: &'r R, repo: A) -> Self {
		Self {
			runner,
			repo: repo.as_ref().to_path_buf(),
		}
	}

	fn dvc(&self, args: &[&str]) -> Result<()> {
		self.runner
			.run(Some(&self.repo), Self::PROGRAM, args)?
			.check(Self::PROGRAM, args)
			.map(|_| ())
	}

	/// Tracks `target` (relative to the repository), writing its `.dvc` pointer file.
	pub fn add(&self, target: &str) -> Result<()> {
		self.dvc(&["add", target])
	}

	pub fn push(&self) -> Result<()> {
		self.dvc(&["push"])
	}

	pub fn pull(&self) -> Result<()> {
		self.dvc(&["pull"])
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
	pub resolution: BranchResolution,
	pub commit: String,
}

pub fn commit_message(branch: &str) -> String {
	format!("add data for {branch}")
}

pub struct Synchronizer<'r, R: CommandRunner> {
	git: Git<'r, R>,
	dvc: Dvc<'r, R>,
}

impl<'r, R: CommandRunner> Synchronizer<'r, R> {
	pub fn new(git: Git<'r, R>) -> Self {
		let dvc = Dvc::new(git.runner, git.work_tree());
		Self { git, dvc }
	}

	/// Commits the tracked dataset directory on `branch` and pushes data and metadata.
	pub fn sync(&self, branch: &str, dataset_dir: &str) -> Result<SyncOutcome> {
		info!(":: Create branch {branch}");
		let resolution = self.git.resolve_branch(branch)?;
		match resolution {
			BranchResolution::Created => info!("\t:: Create a new branch: {branch}"),
			BranchResolution::Existing => info!("\t:: Checkout existing branch: {branch}"),
		}

		info!(":: Add files to DVC");
		self.dvc.add(dataset_dir)?;
		self.git.add_all()?;
		self.git.commit(&commit_message(branch))?;

		info!("\t:: Push data to DVC");
		self.dvc.push()?;

		if let Some(remote) = self.git.remote_head(branch)? {
			warn!("\t:: Force push overwrites origin/{branch} at {remote}");
		}

		info!("\t:: Push dvc metadata to git");
		self.git.push_force_upstream(branch)?;

		let commit = self.git.head_commit()?;
		info!(":: Commit Hash: {commit}");

		Ok(SyncOutcome { resolution, commit })
	}
}
