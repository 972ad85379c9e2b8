//! Attention-list driven update planning.
//!
//! A plan lists the files that must be copied from a new tree into a source
//! tree, and the files that must be deleted from it, restricted to the
//! watched patterns and folders.

use crate::exclusion::ExclusionFilter;
use crate::tree::TreeComparator;
use glob::{MatchOptions, Pattern};
use packdiff_common::{AppConfig, AttentionList, FolderRule, PackDiffError, RelPath};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Files to update, add and delete, relative to the tree roots
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SyncPlan {
    pub updated: Vec<RelPath>,
    pub added: Vec<RelPath>,
    pub deleted: Vec<RelPath>,
}

impl SyncPlan {
    /// True when the version changed but nothing effective did
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.updated.len() + self.added.len() + self.deleted.len()
    }
}

/// Builds sync plans from the configured attention list and exclusion rules
pub struct SyncPlanner {
    attention: AttentionList,
    filter: ExclusionFilter,
    tree: TreeComparator,
}

#[derive(Default)]
struct PlanSets {
    updated: BTreeSet<RelPath>,
    added: BTreeSet<RelPath>,
    deleted: BTreeSet<RelPath>,
}

impl SyncPlanner {
    pub fn new(config: &AppConfig) -> Result<Self, PackDiffError> {
        let attention = if config.attention.is_empty() {
            debug!("Empty attention list, watching the whole tree");
            AttentionList {
                file_patterns: Vec::new(),
                folders: vec![FolderRule {
                    path: String::new(),
                    ignore_deletions: false,
                }],
            }
        } else {
            config.attention.clone()
        };

        Ok(Self {
            attention,
            filter: ExclusionFilter::new(&config.exclusion_patterns)?,
            tree: TreeComparator::new(config)?,
        })
    }

    pub fn plan(&self, source_root: &Path, new_root: &Path) -> Result<SyncPlan, PackDiffError> {
        info!("Planning sync of {:?} from {:?}", source_root, new_root);
        let mut sets = PlanSets::default();

        for rule in &self.attention.file_patterns {
            self.plan_pattern(&rule.pattern, rule.ignore_deletions, source_root, new_root, &mut sets)?;
        }

        for folder in &self.attention.folders {
            self.plan_folder(folder, source_root, new_root, &mut sets)?;
        }

        // Deletions are never narrowed by exclusion rules
        let plan = SyncPlan {
            updated: self.filter.apply(&sets.updated),
            added: self.filter.apply(&sets.added),
            deleted: sets.deleted.into_iter().collect(),
        };

        info!(
            "Sync plan: {} updated, {} added, {} deleted",
            plan.updated.len(),
            plan.added.len(),
            plan.deleted.len()
        );
        Ok(plan)
    }

    fn plan_pattern(
        &self,
        pattern: &str,
        ignore_deletions: bool,
        source_root: &Path,
        new_root: &Path,
        sets: &mut PlanSets,
    ) -> Result<(), PackDiffError> {
        let old_matches = glob_files(source_root, pattern)?;
        let new_matches = glob_files(new_root, pattern)?;
        debug!(
            "Pattern '{}': {} old matches, {} new matches",
            pattern,
            old_matches.len(),
            new_matches.len()
        );

        for rel in old_matches.union(&new_matches) {
            match (old_matches.contains(rel), new_matches.contains(rel)) {
                (true, false) => {
                    if !ignore_deletions {
                        sets.deleted.insert(rel.clone());
                    }
                }
                (false, true) => {
                    sets.added.insert(rel.clone());
                }
                (true, true) => {
                    let old_file = rel.to_path(source_root);
                    let new_file = rel.to_path(new_root);
                    let identical = self
                        .tree
                        .content_comparator()
                        .is_identical(&old_file, &new_file)
                        .unwrap_or_else(|e| {
                            warn!("Cannot compare {:?}: {}", rel.as_str(), e);
                            false
                        });
                    if !identical {
                        sets.updated.insert(rel.clone());
                    }
                }
                (false, false) => {}
            }
        }

        Ok(())
    }

    fn plan_folder(
        &self,
        folder: &FolderRule,
        source_root: &Path,
        new_root: &Path,
        sets: &mut PlanSets,
    ) -> Result<(), PackDiffError> {
        let prefix = RelPath::new(&folder.path);
        let report = self
            .tree
            .compare(&prefix.to_path(source_root), &prefix.to_path(new_root))?;

        sets.added
            .extend(report.added().iter().map(|rel| prefix.join(rel.as_str())));
        sets.updated.extend(
            report
                .modified()
                .iter()
                .map(|entry| prefix.join(entry.path.as_str())),
        );

        if folder.ignore_deletions {
            debug!(
                "Ignoring {} deletions under '{}'",
                report.removed().len(),
                prefix
            );
        } else {
            sets.deleted
                .extend(report.removed().iter().map(|rel| prefix.join(rel.as_str())));
        }

        Ok(())
    }
}

/// Files under `root` matching a root-relative glob
fn glob_files(root: &Path, pattern: &str) -> Result<BTreeSet<RelPath>, PackDiffError> {
    let mut matches = BTreeSet::new();
    if !root.is_dir() {
        return Ok(matches);
    }

    let root_text = root.to_string_lossy();
    let full_pattern = format!("{}/{}", Pattern::escape(&root_text), pattern.trim_start_matches('/'));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let paths = glob::glob_with(&full_pattern, options).map_err(|e| PackDiffError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    for entry in paths {
        let path = entry.map_err(|e| {
            let failed = e.path().to_path_buf();
            PackDiffError::io_at(&failed, io::Error::from(e))
        })?;
        if !path.is_file() {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|e| PackDiffError::Path(e.to_string()))?;
        matches.insert(RelPath::from_path(relative));
    }

    Ok(matches)
}

/// What `apply_plan` did to the source tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ApplyOutcome {
    pub copied: usize,
    pub deleted: usize,
    pub removed_dirs: usize,
    pub bytes_copied: u64,
}

/// Carry a plan out on the source tree: delete first (deepest paths first),
/// then copy added and updated files from the new tree
pub fn apply_plan(plan: &SyncPlan, source_root: &Path, new_root: &Path) -> Result<ApplyOutcome, PackDiffError> {
    let mut outcome = ApplyOutcome::default();

    let mut deletions: Vec<&RelPath> = plan.deleted.iter().collect();
    deletions.sort_by(|a, b| b.segments().count().cmp(&a.segments().count()).then_with(|| a.cmp(b)));

    for rel in deletions {
        let target = rel.to_path(source_root);
        match fs::remove_file(&target) {
            Ok(()) => {
                debug!("Deleted {}", target.display());
                outcome.deleted += 1;
                outcome.removed_dirs += prune_empty_parents(rel, source_root)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Already gone: {}", target.display());
            }
            Err(e) => return Err(PackDiffError::io_at(&target, e)),
        }
    }

    let copies: BTreeSet<&RelPath> = plan.updated.iter().chain(plan.added.iter()).collect();
    for rel in copies {
        let source = rel.to_path(new_root);
        let dest = rel.to_path(source_root);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| PackDiffError::io_at(parent, e))?;
        }

        debug!("Copying {} to {}", source.display(), dest.display());
        outcome.bytes_copied += fs::copy(&source, &dest).map_err(|e| PackDiffError::io_at(&source, e))?;
        outcome.copied += 1;
    }

    info!(
        "Applied sync plan: {} copied, {} deleted, {} empty directories removed",
        outcome.copied, outcome.deleted, outcome.removed_dirs
    );
    Ok(outcome)
}

/// Remove directories emptied by a deletion, stopping at the first non-empty one
fn prune_empty_parents(rel: &RelPath, source_root: &Path) -> Result<usize, PackDiffError> {
    let mut removed = 0;
    let mut current = rel.parent();

    while let Some(dir) = current {
        if dir.is_root() {
            break;
        }
        let path: PathBuf = dir.to_path(source_root);
        let is_empty = match fs::read_dir(&path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(PackDiffError::io_at(&path, e)),
        };
        if !is_empty {
            break;
        }
        fs::remove_dir(&path).map_err(|e| PackDiffError::io_at(&path, e))?;
        debug!("Removed empty directory {}", path.display());
        removed += 1;
        current = dir.parent();
    }

    Ok(removed)
}
