use crate::text_diff::LineDiffEngine;
use packdiff_common::{ContentDigest, FileComparison, PackDiffError};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Result of comparing the contents of one file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVerdict {
    Identical,
    Modified(FileComparison),
}

/// Decides byte identity of two files and, when they differ, how to describe the change
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentComparator {
    diff_engine: LineDiffEngine,
}

impl ContentComparator {
    pub fn new(diff_engine: LineDiffEngine) -> Self {
        Self { diff_engine }
    }

    /// Compare two files. Never fails: unreadable files come back as
    /// `Modified(Unreadable)` with the reason attached.
    pub fn compare(&self, left: &Path, right: &Path) -> ContentVerdict {
        match self.is_identical(left, right) {
            Ok(true) => ContentVerdict::Identical,
            Ok(false) => ContentVerdict::Modified(self.diff_engine.diff_files(left, right)),
            Err(e) => {
                warn!("Cannot compare {:?} with {:?}: {}", left, right, e);
                ContentVerdict::Modified(FileComparison::Unreadable {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Same size and same BLAKE3 digest
    pub fn is_identical(&self, left: &Path, right: &Path) -> Result<bool, PackDiffError> {
        let left_len = fs::metadata(left)
            .map_err(|e| PackDiffError::io_at(left, e))?
            .len();
        let right_len = fs::metadata(right)
            .map_err(|e| PackDiffError::io_at(right, e))?
            .len();

        if left_len != right_len {
            debug!("Size differs for {:?}: {} vs {}", left, left_len, right_len);
            return Ok(false);
        }

        Ok(hash_file(left)? == hash_file(right)?)
    }
}

/// Stream a file through BLAKE3
pub fn hash_file(path: &Path) -> Result<ContentDigest, PackDiffError> {
    let mut file = fs::File::open(path).map_err(|e| PackDiffError::io_at(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; 64 * 1024]; // 64KB buffer

    loop {
        let n = file
            .read(&mut buffer)
            .map_err(|e| PackDiffError::io_at(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().into())
}
