use crate::error::{PrepError, Result};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::fs::{create_dir_all, remove_dir_all, File};
use std::io::BufReader;
use std::path::{Component, Path};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
	Zip,
	Tar,
	TarGz,
}

impl ArchiveKind {
	pub fn detect<A: AsRef<Path>>(path: A) -> Option<Self> {
		let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();

		if name.ends_with(".zip") {
			Some(ArchiveKind::Zip)
		} else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
			Some(ArchiveKind::TarGz)
		} else if name.ends_with(".tar") {
			Some(ArchiveKind::Tar)
		} else {
			None
		}
	}
}

/// True when `name` stays below the directory it is unpacked into.
fn is_enclosed(name: &str) -> bool {
	Path::new(name).components().all(|part| match part {
		Component::ParentDir | Component::RootDir | Component::Prefix(_) => false,
		Component::CurDir | Component::Normal(_) => true,
	})
}

/// Like [`extract_archive`], but removes whatever an earlier run left in `dest` first.
pub fn extract_fresh<A: AsRef<Path>, D: AsRef<Path>>(archive: A, dest: D) -> Result<()> {
	let dest = dest.as_ref();
	if dest.exists() {
		debug!("\t:: Clearing {}", dest.display());
		remove_dir_all(dest)?;
	}
	extract_archive(archive, dest)
}

/// Unpacks every entry of `archive` below `dest`, keeping the archive's directory structure.
pub fn extract_archive<A: AsRef<Path>, D: AsRef<Path>>(archive: A, dest: D) -> Result<()> {
	let archive = archive.as_ref();
	let dest = dest.as_ref();

	if !archive.is_file() {
		return Err(PrepError::ArchiveNotFound(archive.to_path_buf()));
	}

	let kind = ArchiveKind::detect(archive)
		.ok_or_else(|| PrepError::UnsupportedArchive(archive.to_path_buf()))?;

	info!(":: Extracting {kind:?} archive {} to {}", archive.display(), dest.display());
	create_dir_all(dest)?;

	let file = BufReader::new(File::open(archive)?);
	match kind {
		ArchiveKind::Zip => {
			let mut zip = zip::ZipArchive::new(file)?;
			if let Some(name) = zip.file_names().find(|name| !is_enclosed(name)) {
				return Err(PrepError::UnsafeArchiveEntry(name.to_string()));
			}
			zip.extract(dest)?;
		}
		ArchiveKind::Tar => tar::Archive::new(file).unpack(dest)?,
		ArchiveKind::TarGz => tar::Archive::new(GzDecoder::new(file)).unpack(dest)?,
	}

	Ok(())
}
