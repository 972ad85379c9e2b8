//! Comparison roots backed by a directory or an extracted archive.

use packdiff_common::PackDiffError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(feature = "archives")]
use flate2::read::GzDecoder;
#[cfg(feature = "archives")]
use std::fs::File;
#[cfg(feature = "archives")]
use std::io::Read;
#[cfg(feature = "archives")]
use zip::ZipArchive;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

/// Where a comparison root comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Directory,
    /// Path does not exist; compares as an empty tree
    Missing,
    Archive(ArchiveKind),
}

/// Detect an archive from its file name (case-insensitive)
pub fn detect_archive_kind(path: &Path) -> Option<ArchiveKind> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveKind::TarGz)
    } else if name.ends_with(".tar") {
        Some(ArchiveKind::Tar)
    } else if name.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else {
        None
    }
}

/// A tree ready to be walked. Extracted archives live in a temporary
/// directory that is removed when the source is dropped.
#[derive(Debug)]
pub struct TreeSource {
    root: PathBuf,
    kind: SourceKind,
    #[cfg(feature = "archives")]
    _extracted: Option<tempfile::TempDir>,
}

impl TreeSource {
    pub fn open(path: &Path) -> Result<Self, PackDiffError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{:?} does not exist, using an empty tree", path);
                return Ok(Self::plain(path.to_path_buf(), SourceKind::Missing));
            }
            Err(e) => return Err(PackDiffError::io_at(path, e)),
        };

        if metadata.is_dir() {
            return Ok(Self::plain(path.to_path_buf(), SourceKind::Directory));
        }

        match detect_archive_kind(path) {
            Some(kind) => Self::extract(path, kind),
            None => Err(PackDiffError::Config(format!(
                "{} is neither a directory nor a supported archive",
                path.display()
            ))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Narrow the root to a subdirectory, keeping any extraction alive
    pub fn into_subdir(mut self, subdir: &str) -> Self {
        self.root = self
            .root
            .join(subdir.trim_matches('/'));
        self
    }

    fn plain(root: PathBuf, kind: SourceKind) -> Self {
        Self {
            root,
            kind,
            #[cfg(feature = "archives")]
            _extracted: None,
        }
    }

    #[cfg(feature = "archives")]
    fn extract(path: &Path, kind: ArchiveKind) -> Result<Self, PackDiffError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| PackDiffError::Archive(format!("Failed to create temp dir: {}", e)))?;
        let file = File::open(path).map_err(|e| PackDiffError::io_at(path, e))?;

        match kind {
            ArchiveKind::Zip => {
                let mut archive = ZipArchive::new(file).map_err(|e| {
                    PackDiffError::Archive(format!("Failed to open {}: {}", path.display(), e))
                })?;
                archive.extract(temp_dir.path()).map_err(|e| {
                    PackDiffError::Archive(format!("Failed to extract {}: {}", path.display(), e))
                })?;
            }
            ArchiveKind::Tar | ArchiveKind::TarGz => {
                let reader: Box<dyn Read> = if kind == ArchiveKind::TarGz {
                    Box::new(GzDecoder::new(file))
                } else {
                    Box::new(file)
                };
                tar::Archive::new(reader).unpack(temp_dir.path()).map_err(|e| {
                    PackDiffError::Archive(format!("Failed to extract {}: {}", path.display(), e))
                })?;
            }
        }

        info!("Extracted {:?} into {:?}", path, temp_dir.path());
        Ok(Self {
            root: temp_dir.path().to_path_buf(),
            kind: SourceKind::Archive(kind),
            _extracted: Some(temp_dir),
        })
    }

    #[cfg(not(feature = "archives"))]
    fn extract(path: &Path, _kind: ArchiveKind) -> Result<Self, PackDiffError> {
        Err(PackDiffError::Config(format!(
            "{} is an archive but archive support is disabled",
            path.display()
        )))
    }
}
