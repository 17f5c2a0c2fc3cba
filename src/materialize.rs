use crate::error::{PrepError, Result};
use crate::partition::{ImageRecord, Partition, Split};
use image::imageops::FilterType;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, remove_dir_all};
use std::path::{Path, PathBuf};

/// Target resolution every image is stretched to; the aspect ratio is not kept.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Resize {
	pub width: u32,
	pub height: u32,
}

impl Resize {
	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}

	pub fn apply<A: AsRef<Path>, D: AsRef<Path>>(&self, src: A, dest: D) -> Result<()> {
		let (src, dest) = (src.as_ref(), dest.as_ref());

		let image = image::open(src).map_err(|source| PrepError::Decode {
			path: src.to_path_buf(),
			source,
		})?;

		image
			.resize_exact(self.width, self.height, FilterType::Lanczos3)
			.into_rgb8()
			.save(dest)
			.map_err(|source| PrepError::Encode {
				path: dest.to_path_buf(),
				source,
			})
	}
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
	pub written: BTreeMap<Split, usize>,
}

impl MaterializeReport {
	pub fn total(&self) -> usize {
		self.written.values().sum()
	}
}

/// Destination of a record: `<dataset root>/<split>/<label>/<file name>`.
pub fn destination<A: AsRef<Path>>(dataset_root: A, record: &ImageRecord) -> Option<PathBuf> {
	Some(dataset_root
		.as_ref()
		.join(record.split.dir_name())
		.join(&record.label)
		.join(record.file_name()?))
}

/// Recreates empty split directories so no file from an earlier run survives.
pub fn prepare_output<A: AsRef<Path>>(dataset_root: A) -> Result<()> {
	for split in Split::ALL {
		let dir = dataset_root.as_ref().join(split.dir_name());
		if dir.exists() {
			debug!("\t:: Clearing {}", dir.display());
			remove_dir_all(&dir)?;
		}
		info!("\t:: Creating Directory {}", dir.display());
		create_dir_all(&dir)?;
	}
	Ok(())
}

/// Resizes every record into the dataset tree. The first image that fails stops the run.
pub fn write_dataset<A: AsRef<Path>>(
	records: &[ImageRecord],
	dataset_root: A,
	resize: Resize,
	report: &mut MaterializeReport,
) -> Result<()> {
	let dataset_root = dataset_root.as_ref();

	for record in records {
		let Some(dest) = destination(dataset_root, record) else {
			continue;
		};
		if let Some(class_dir) = dest.parent() {
			create_dir_all(class_dir)?;
		}

		debug!("Resizing {:?} -> {:?}", record.path, dest);
		resize.apply(&record.path, &dest)?;
		*report.written.entry(record.split).or_insert(0) += 1;
	}

	Ok(())
}

pub fn materialize<A: AsRef<Path>>(
	partition: &Partition,
	dataset_root: A,
	resize: Resize,
) -> Result<MaterializeReport> {
	let dataset_root = dataset_root.as_ref();
	prepare_output(dataset_root)?;

	info!(":: Writing Datasets ({}x{})", resize.width, resize.height);
	let mut report = MaterializeReport::default();
	for split in Split::ALL {
		write_dataset(partition.records(split), dataset_root, resize, &mut report)?;
	}

	info!("\t:: Wrote {} images", report.total());
	Ok(report)
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{Rgb, RgbImage};
	use std::fs;

	fn write_jpg(path: &Path, width: u32, height: u32) {
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		RgbImage::from_pixel(width, height, Rgb([40, 120, 200])).save(path).unwrap();
	}

	fn scenario(root: &Path) {
		write_jpg(&root.join("seg_train/seg_train/mountain/1.jpg"), 64, 32);
		write_jpg(&root.join("seg_train/seg_train/mountain/2.jpg"), 150, 150);
		write_jpg(&root.join("seg_train/seg_train/forest/3.jpg"), 20, 90);
		write_jpg(&root.join("seg_train/seg_train/forest/4.jpg"), 150, 150);
		write_jpg(&root.join("seg_test/seg_test/mountain/5.jpg"), 33, 17);
		write_jpg(&root.join("seg_test/seg_test/forest/6.jpg"), 150, 150);
	}

	#[test]
	fn resizes_into_split_and_label_tree() {
		let dir = tempfile::tempdir().unwrap();
		let extracted = dir.path().join("tmp");
		let dataset = dir.path().join("dataset");
		scenario(&extracted);

		let partition = Partition::from_extracted(&extracted).unwrap();
		let report = materialize(&partition, &dataset, Resize::new(24, 16)).unwrap();

		assert_eq!(report.total(), 6);
		assert_eq!(report.written[&Split::Train], 4);
		assert_eq!(report.written[&Split::Test], 2);

		for split in Split::ALL {
			for record in partition.records(split) {
				let dest = dataset
					.join(split.dir_name())
					.join(&record.label)
					.join(record.path.file_name().unwrap());
				assert_eq!(image::image_dimensions(&dest).unwrap(), (24, 16), "{dest:?}");
			}
		}
		assert!(dataset.join("test/forest/6.jpg").is_file());
	}

	#[test]
	fn removes_stale_files_from_previous_run() {
		let dir = tempfile::tempdir().unwrap();
		let extracted = dir.path().join("tmp");
		let dataset = dir.path().join("dataset");
		scenario(&extracted);
		write_jpg(&dataset.join("train/desert/old.jpg"), 8, 8);

		let partition = Partition::from_extracted(&extracted).unwrap();
		materialize(&partition, &dataset, Resize::new(8, 8)).unwrap();

		assert!(!dataset.join("train/desert").exists());
		assert!(dataset.join("train/mountain/1.jpg").is_file());
	}

	#[test]
	fn undecodable_image_aborts_run() {
		let dir = tempfile::tempdir().unwrap();
		let extracted = dir.path().join("tmp");
		let dataset = dir.path().join("dataset");
		scenario(&extracted);
		fs::write(extracted.join("seg_train/seg_train/forest/0_empty.jpg"), b"").unwrap();

		let partition = Partition::from_extracted(&extracted).unwrap();
		let result = materialize(&partition, &dataset, Resize::new(8, 8));

		assert!(matches!(result, Err(PrepError::Decode { .. })));
		// records after the broken one are never written
		assert!(!dataset.join("train/forest/3.jpg").exists());
		assert!(!dataset.join("test").read_dir().unwrap().any(|_| true));
	}

	#[test]
	fn non_image_content_aborts_run() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("seg_test/seg_test/forest/text.jpg");
		fs::create_dir_all(src.parent().unwrap()).unwrap();
		fs::write(&src, b"this is not a jpeg").unwrap();

		let result = Resize::new(8, 8).apply(&src, dir.path().join("out.jpg"));

		assert!(matches!(result, Err(PrepError::Decode { .. })));
		assert!(!dir.path().join("out.jpg").exists());
	}

	#[test]
	fn destination_keeps_file_name() {
		let source = PathBuf::from("/x/seg_test/seg_test/sea/42.jpg");
		let record = ImageRecord::new(source, Split::Test).unwrap();

		assert_eq!(
			destination("/repo/dataset", &record),
			Some(PathBuf::from("/repo/dataset/test/sea/42.jpg"))
		);
	}
}
