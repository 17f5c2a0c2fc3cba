use crate::error::{PrepError, Result};
use log::info;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::read_dir;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSION: &str = "jpg";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
	Train,
	Test,
}

impl Split {
	pub const ALL: [Split; 2] = [Split::Train, Split::Test];

	/// Location of the split inside the extracted archive.
	pub fn source_subdir(&self) -> &'static str {
		match self {
			Split::Train => "seg_train/seg_train",
			Split::Test => "seg_test/seg_test",
		}
	}

	/// Directory name of the split in the dataset tree.
	pub fn dir_name(&self) -> &'static str {
		match self {
			Split::Train => "train",
			Split::Test => "test",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
	pub path: PathBuf,
	pub label: String,
	pub split: Split,
}

impl ImageRecord {
	pub fn new(path: PathBuf, split: Split) -> Option<Self> {
		let label = label_of(&path)?;
		Some(Self { path, label, split })
	}

	pub fn file_name(&self) -> Option<&OsStr> {
		self.path.file_name()
	}
}

/// The class label of an image is the name of the directory holding it.
pub fn label_of<A: AsRef<Path>>(path: A) -> Option<String> {
	path.as_ref()
		.parent()?
		.file_name()
		.map(|name| name.to_string_lossy().into_owned())
}

/// Finds `<split subdir>/*/*.jpg` below `extract_root`, sorted by path.
pub fn discover<A: AsRef<Path>>(extract_root: A, split: Split) -> Result<Vec<ImageRecord>> {
	let split_root = extract_root.as_ref().join(split.source_subdir());
	if !split_root.is_dir() {
		return Err(PrepError::MissingSplit(split_root));
	}

	let mut records = Vec::new();
	for class_dir in read_dir(&split_root)? {
		let class_dir = class_dir?.path();
		if !class_dir.is_dir() {
			continue;
		}

		for entry in read_dir(&class_dir)? {
			let path = entry?.path();
			let is_image = path.extension().is_some_and(|ext| ext == OsStr::new(IMAGE_EXTENSION));
			if !is_image || !path.is_file() {
				continue;
			}

			if let Some(record) = ImageRecord::new(path, split) {
				records.push(record);
			}
		}
	}

	records.sort_by(|a, b| a.path.cmp(&b.path));
	Ok(records)
}

pub fn class_counts(records: &[ImageRecord]) -> BTreeMap<String, usize> {
	let mut counts = BTreeMap::new();
	for record in records {
		*counts.entry(record.label.clone()).or_insert(0) += 1;
	}
	counts
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
	pub train: Vec<ImageRecord>,
	pub test: Vec<ImageRecord>,
}

impl Partition {
	pub fn from_extracted<A: AsRef<Path>>(extract_root: A) -> Result<Self> {
		let extract_root = extract_root.as_ref();
		let partition = Self {
			train: discover(extract_root, Split::Train)?,
			test: discover(extract_root, Split::Test)?,
		};

		info!("\t:: Train Dataset Class Counts: {:?}", partition.counts(Split::Train));
		info!("\t:: Test Dataset Class Counts: {:?}", partition.counts(Split::Test));

		Ok(partition)
	}

	pub fn records(&self, split: Split) -> &[ImageRecord] {
		match split {
			Split::Train => &self.train,
			Split::Test => &self.test,
		}
	}

	pub fn counts(&self, split: Split) -> BTreeMap<String, usize> {
		class_counts(self.records(split))
	}

	pub fn total(&self) -> usize {
		self.train.len() + self.test.len()
	}
}
