use packdiff_common::PackDiffError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Column separator used by the release table (box drawing vertical)
const CELL_SEPARATOR: char = '│';

/// One published release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseEntry {
    pub name: String,
    pub id: String,
}

/// Releases in listing order; the first one is the latest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseTable {
    entries: Vec<ReleaseEntry>,
}

/// Whether the local version trails the latest release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateStatus {
    UpToDate {
        version: ReleaseEntry,
    },
    Available {
        latest: ReleaseEntry,
        /// Id of the local version, when the table still lists it
        local_id: Option<String>,
    },
}

impl UpdateStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, UpdateStatus::Available { .. })
    }
}

impl ReleaseTable {
    /// Parse the rows of a release listing.
    ///
    /// A row is a line mentioning `release` with more than two cell
    /// separators; cell 1 is the version id and cell 2 the version name.
    pub fn parse(text: &str) -> Result<Self, PackDiffError> {
        let mut entries: Vec<ReleaseEntry> = Vec::new();

        for line in text.lines() {
            if !line.contains("release") || line.matches(CELL_SEPARATOR).count() <= 2 {
                continue;
            }

            let cells: Vec<&str> = line.split(CELL_SEPARATOR).map(str::trim).collect();
            let (id, name) = (cells[1], cells[2]);

            match entries.iter_mut().find(|entry| entry.name == name) {
                Some(existing) => existing.id = id.to_string(),
                None => entries.push(ReleaseEntry {
                    name: name.to_string(),
                    id: id.to_string(),
                }),
            }
        }

        if entries.is_empty() {
            return Err(PackDiffError::Version(
                "could not parse any release versions".to_string(),
            ));
        }

        debug!("Parsed {} releases", entries.len());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ReleaseEntry] {
        &self.entries
    }

    pub fn latest(&self) -> &ReleaseEntry {
        // parse() never builds an empty table
        &self.entries[0]
    }

    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id.as_str())
    }

    pub fn check(&self, local_name: &str) -> UpdateStatus {
        let latest = self.latest();
        if latest.name == local_name {
            return UpdateStatus::UpToDate {
                version: latest.clone(),
            };
        }

        UpdateStatus::Available {
            latest: latest.clone(),
            local_id: self.id_of(local_name).map(str::to_string),
        }
    }
}

#[derive(Deserialize)]
struct PackInfo {
    modpack: PackMetadata,
}

#[derive(Deserialize)]
struct PackMetadata {
    version: String,
}

/// Installed version name recorded in a pack info file (`modpack.version`)
pub fn read_local_version(path: &Path) -> Result<String, PackDiffError> {
    let data = fs::read_to_string(path).map_err(|e| PackDiffError::io_at(path, e))?;
    let info: PackInfo = serde_json::from_str(&data)
        .map_err(|e| PackDiffError::Version(format!("{}: {}", path.display(), e)))?;

    debug!("Local version {} read from {:?}", info.modpack.version, path);
    Ok(info.modpack.version)
}
