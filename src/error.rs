use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, PrepError>;

#[derive(Debug, Error)]
pub enum PrepError {
	#[error("Std IO error")]
	StdIoError(#[from] std::io::Error),
	#[error("Could not decode image {path}")]
	Decode {
		path: PathBuf,
		#[source]
		source: image::ImageError,
	},
	#[error("Could not encode image {path}")]
	Encode {
		path: PathBuf,
		#[source]
		source: image::ImageError,
	},
	#[error(transparent)]
	Zip(#[from] zip::result::ZipError),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Logger already initialised")]
	SetLogger(#[from] log::SetLoggerError),
	#[error("Archive not found: {0}")]
	ArchiveNotFound(PathBuf),
	#[error("Archive entry escapes the destination: {0}")]
	UnsafeArchiveEntry(String),
	#[error("Unsupported archive format: {0}")]
	UnsupportedArchive(PathBuf),
	#[error("Split directory not found: {0}")]
	MissingSplit(PathBuf),
	#[error("Could not start {program}")]
	CommandSpawn {
		program: String,
		#[source]
		source: std::io::Error,
	},
	#[error("`{program} {}` exited with {status}: {stderr}", args.join(" "))]
	CommandFailed {
		program: String,
		args: Vec<String>,
		status: String,
		stderr: String,
	},
	#[error("Clone target is not empty: {0}")]
	CloneTargetNotEmpty(PathBuf),
	#[error("Invalid branch name: {0}")]
	InvalidBranchName(String),
	#[error("Could not check out branch {branch}: {stderr}")]
	BranchCheckout { branch: String, stderr: String },
	#[error("Tracker run is locked: {0}")]
	TrackerLocked(PathBuf),
	#[error("Parameter {key} already set to {existing}")]
	ParameterAlreadySet { key: String, existing: String },
}
