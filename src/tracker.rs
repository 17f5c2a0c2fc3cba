use crate::error::{PrepError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, remove_file, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const COMMIT_PARAMETER: &str = "data_commit_hash";
const PARAMETERS_FILE: &str = "parameters.json";
const LOCK_FILE: &str = ".tracker.lock";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
	pub parameters: BTreeMap<String, String>,
}

/// Handle on the current experiment run. Holding it keeps the run locked; dropping it releases
/// the lock.
#[derive(Debug)]
pub struct RunTracker {
	dir: PathBuf,
	params: RunParameters,
}

impl RunTracker {
	pub fn load<A: AsRef<Path>>(dir: A) -> Result<Self> {
		let dir = dir.as_ref().to_path_buf();
		create_dir_all(&dir)?;

		let lock = dir.join(LOCK_FILE);
		OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&lock)
			.map_err(|err| match err.kind() {
				ErrorKind::AlreadyExists => PrepError::TrackerLocked(lock.clone()),
				_ => PrepError::StdIoError(err),
			})?;

		// the lock is released by Drop from here on, even if reading fails
		let mut tracker = Self { dir, params: RunParameters::default() };
		let file = tracker.parameters_file();
		if file.is_file() {
			tracker.params = serde_json::from_reader(File::open(file)?)?;
		}

		Ok(tracker)
	}

	pub fn parameters_file(&self) -> PathBuf {
		self.dir.join(PARAMETERS_FILE)
	}

	pub fn parameters(&self) -> &BTreeMap<String, String> {
		&self.params.parameters
	}

	/// Adds parameters to the run and persists them. A key keeps the first value it was given.
	pub fn log_parameters<I, K, V>(&mut self, params: I) -> Result<()>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let mut next = self.params.clone();
		for (key, value) in params {
			let (key, value) = (key.into(), value.into());
			match next.parameters.get(&key) {
				Some(existing) if *existing != value => {
					return Err(PrepError::ParameterAlreadySet { key, existing: existing.clone() });
				}
				_ => {
					next.parameters.insert(key, value);
				}
			}
		}

		serde_json::to_writer_pretty(File::create(self.parameters_file())?, &next)?;
		self.params = next;
		Ok(())
	}
}

impl Drop for RunTracker {
	fn drop(&mut self) {
		if let Err(err) = remove_file(self.dir.join(LOCK_FILE)) {
			warn!("Could not release tracker lock in {}: {err}", self.dir.display());
		}
	}
}

/// Records the data commit on the run stored in `dir`.
pub fn record_commit<A: AsRef<Path>>(dir: A, commit: &str) -> Result<()> {
	let mut tracker = RunTracker::load(dir)?;
	tracker.log_parameters([(COMMIT_PARAMETER, commit)])?;
	info!(
		":: Recorded {COMMIT_PARAMETER}={commit} to {} ({} parameters)",
		tracker.parameters_file().display(),
		tracker.parameters().len()
	);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn records_commit_hash() {
		let dir = tempfile::tempdir().unwrap();
		record_commit(dir.path(), "abc123").unwrap();

		let bytes = fs::read(dir.path().join(PARAMETERS_FILE)).unwrap();
		let stored: RunParameters = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(stored.parameters.get(COMMIT_PARAMETER).map(String::as_str), Some("abc123"));
		assert!(!dir.path().join(LOCK_FILE).exists());
	}

	#[test]
	fn handle_is_exclusive_while_held() {
		let dir = tempfile::tempdir().unwrap();
		let held = RunTracker::load(dir.path()).unwrap();

		assert!(matches!(RunTracker::load(dir.path()), Err(PrepError::TrackerLocked(_))));

		drop(held);
		assert!(RunTracker::load(dir.path()).is_ok());
	}

	#[test]
	fn lock_released_after_failed_write() {
		let dir = tempfile::tempdir().unwrap();
		record_commit(dir.path(), "abc123").unwrap();

		let result = record_commit(dir.path(), "def456");

		assert!(matches!(
			result,
			Err(PrepError::ParameterAlreadySet { ref existing, .. }) if existing == "abc123"
		));
		assert!(!dir.path().join(LOCK_FILE).exists());
	}

	#[test]
	fn same_value_can_be_logged_twice() {
		let dir = tempfile::tempdir().unwrap();
		record_commit(dir.path(), "abc123").unwrap();
		record_commit(dir.path(), "abc123").unwrap();
	}

	#[test]
	fn keeps_parameters_of_other_steps() {
		let dir = tempfile::tempdir().unwrap();
		{
			let mut tracker = RunTracker::load(dir.path()).unwrap();
			tracker.log_parameters([("epochs", "2")]).unwrap();
		}

		record_commit(dir.path(), "abc123").unwrap();

		let tracker = RunTracker::load(dir.path()).unwrap();
		assert_eq!(tracker.parameters().len(), 2);
		assert_eq!(tracker.parameters()["epochs"], "2");
	}

	#[test]
	fn corrupt_parameters_file_releases_lock() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(PARAMETERS_FILE), b"{not json").unwrap();

		assert!(matches!(RunTracker::load(dir.path()), Err(PrepError::SerdeJson(_))));
		assert!(!dir.path().join(LOCK_FILE).exists());
	}
}
