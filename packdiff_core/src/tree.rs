use crate::content::{ContentComparator, ContentVerdict};
use crate::report::{ComparisonReport, ReportAssembler};
use crate::text_diff::LineDiffEngine;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use packdiff_common::{AppConfig, PackDiffError, RelPath};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Relative paths of two trees, split by where they exist.
///
/// Only files are listed; directories appear in `added_dirs` / `removed_dirs`
/// when a whole subtree exists on one side only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairedTree {
    /// Files present only in the old tree
    pub left_only: Vec<RelPath>,
    /// Files present only in the new tree
    pub right_only: Vec<RelPath>,
    /// Files present in both trees
    pub common: Vec<RelPath>,
    /// Directories present only in the new tree
    pub added_dirs: Vec<RelPath>,
    /// Directories present only in the old tree
    pub removed_dirs: Vec<RelPath>,
}

impl PairedTree {
    pub fn file_count(&self) -> usize {
        self.left_only.len() + self.right_only.len() + self.common.len()
    }
}

/// A directory being walked on one side, with the canonical directories
/// visited to reach it
#[derive(Debug, Clone)]
struct DirSide {
    path: PathBuf,
    visited: Vec<PathBuf>,
}

impl DirSide {
    fn open(root: &Path) -> Result<Self, PackDiffError> {
        let canonical = fs::canonicalize(root).map_err(|e| PackDiffError::io_at(root, e))?;
        Ok(Self {
            path: root.to_path_buf(),
            visited: vec![canonical],
        })
    }

    /// Descend into `child`, refusing links that lead back to a visited directory
    fn descend(&self, child: PathBuf, through_link: bool) -> Option<DirSide> {
        let canonical = if through_link {
            match fs::canonicalize(&child) {
                Ok(canonical) => canonical,
                Err(e) => {
                    debug!("Skipping unresolvable link {:?}: {}", child, e);
                    return None;
                }
            }
        } else {
            let parent = self.visited.last().cloned().unwrap_or_default();
            match child.file_name() {
                Some(name) => parent.join(name),
                None => return None,
            }
        };

        if through_link && self.visited.iter().any(|seen| seen.starts_with(&canonical)) {
            warn!("Skipping {:?}: link points back into {:?}", child, canonical);
            return None;
        }

        let mut visited = self.visited.clone();
        visited.push(canonical);
        Some(DirSide {
            path: child,
            visited,
        })
    }
}

#[derive(Debug)]
enum Listed {
    File,
    Dir(DirSide),
}

/// Directory pair waiting to be walked
struct PendingDir {
    rel: RelPath,
    left: Option<DirSide>,
    right: Option<DirSide>,
}

/// Walks two roots and classifies every relative path
pub struct TreeComparator {
    ignore: Option<Gitignore>,
    content: ContentComparator,
}

impl TreeComparator {
    pub fn new(config: &AppConfig) -> Result<Self, PackDiffError> {
        Ok(Self {
            ignore: build_ignore(&config.ignore_patterns)?,
            content: ContentComparator::new(LineDiffEngine::new(config.context_lines)),
        })
    }

    pub fn content_comparator(&self) -> &ContentComparator {
        &self.content
    }

    /// Full comparison: pair both trees, compare common files in parallel and
    /// assemble the report
    pub fn compare(&self, left_root: &Path, right_root: &Path) -> Result<ComparisonReport, PackDiffError> {
        info!("Comparing {:?} with {:?}", left_root, right_root);
        let paired = self.pair(left_root, right_root)?;

        let verdicts: Vec<ContentVerdict> = paired
            .common
            .par_iter()
            .map(|rel| {
                self.content
                    .compare(&rel.to_path(left_root), &rel.to_path(right_root))
            })
            .collect();

        let report = ReportAssembler::assemble(paired, verdicts)?;
        let summary = report.summary();
        info!(
            "Compared {} paths: {} added, {} removed, {} modified, {} identical",
            summary.total, summary.added, summary.removed, summary.modified, summary.identical
        );
        Ok(report)
    }

    /// Walk both roots and split their files into one-sided and common paths
    pub fn pair(&self, left_root: &Path, right_root: &Path) -> Result<PairedTree, PackDiffError> {
        let mut paired = PairedTree::default();
        let mut worklist = vec![PendingDir {
            rel: RelPath::root(),
            left: open_root(left_root)?,
            right: open_root(right_root)?,
        }];

        while let Some(pending) = worklist.pop() {
            match (pending.left, pending.right) {
                (Some(left), Some(right)) => {
                    let left_entries = self.list_dir(&left, &pending.rel)?;
                    let mut right_entries = self.list_dir(&right, &pending.rel)?;

                    for (name, left_entry) in left_entries {
                        let rel = pending.rel.join(&name);
                        match (left_entry, right_entries.remove(&name)) {
                            (Listed::File, Some(Listed::File)) => paired.common.push(rel),
                            (Listed::Dir(l), Some(Listed::Dir(r))) => worklist.push(PendingDir {
                                rel,
                                left: Some(l),
                                right: Some(r),
                            }),
                            (Listed::File, Some(Listed::Dir(r))) => {
                                paired.left_only.push(rel.clone());
                                self.record_subtree(&rel, &r, Side::Right, &mut paired)?;
                            }
                            (Listed::Dir(l), Some(Listed::File)) => {
                                paired.right_only.push(rel.clone());
                                self.record_subtree(&rel, &l, Side::Left, &mut paired)?;
                            }
                            (Listed::File, None) => paired.left_only.push(rel),
                            (Listed::Dir(l), None) => {
                                self.record_subtree(&rel, &l, Side::Left, &mut paired)?
                            }
                        }
                    }

                    for (name, right_entry) in right_entries {
                        let rel = pending.rel.join(&name);
                        match right_entry {
                            Listed::File => paired.right_only.push(rel),
                            Listed::Dir(r) => self.record_subtree(&rel, &r, Side::Right, &mut paired)?,
                        }
                    }
                }
                // Only a root can be missing here; its children are reported one by one
                (Some(left), None) => self.record_listing(&pending.rel, &left, Side::Left, &mut paired)?,
                (None, Some(right)) => {
                    self.record_listing(&pending.rel, &right, Side::Right, &mut paired)?
                }
                (None, None) => {}
            }
        }

        paired.left_only.sort();
        paired.right_only.sort();
        paired.common.sort();
        paired.added_dirs.sort();
        paired.removed_dirs.sort();

        debug!(
            "Paired {} files ({} common, {} old only, {} new only)",
            paired.file_count(),
            paired.common.len(),
            paired.left_only.len(),
            paired.right_only.len()
        );
        Ok(paired)
    }

    /// Sorted listing of one directory, links resolved, ignored names dropped
    fn list_dir(&self, dir: &DirSide, rel: &RelPath) -> Result<BTreeMap<String, Listed>, PackDiffError> {
        let mut listed = BTreeMap::new();
        let read_dir = fs::read_dir(&dir.path).map_err(|e| PackDiffError::io_at(&dir.path, e))?;

        for entry in read_dir {
            let entry = entry.map_err(|e| PackDiffError::io_at(&dir.path, e))?;
            let path = entry.path();
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("Skipping non UTF-8 name {:?} in {:?}", raw, dir.path);
                    continue;
                }
            };

            let through_link = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping broken entry {:?}: {}", path, e);
                    continue;
                }
            };

            if self.is_ignored(&rel.join(&name), metadata.is_dir()) {
                debug!("Ignoring {:?}", path);
                continue;
            }

            if metadata.is_file() {
                listed.insert(name, Listed::File);
            } else if metadata.is_dir() {
                if let Some(side) = dir.descend(path, through_link) {
                    listed.insert(name, Listed::Dir(side));
                }
            } else {
                debug!("Skipping special file {:?}", path);
            }
        }

        Ok(listed)
    }

    /// Record the direct entries of a directory whose counterpart is missing
    fn record_listing(
        &self,
        rel: &RelPath,
        dir: &DirSide,
        side: Side,
        paired: &mut PairedTree,
    ) -> Result<(), PackDiffError> {
        for (name, entry) in self.list_dir(dir, rel)? {
            let entry_rel = rel.join(&name);
            match entry {
                Listed::File => match side {
                    Side::Left => paired.left_only.push(entry_rel),
                    Side::Right => paired.right_only.push(entry_rel),
                },
                Listed::Dir(sub) => self.record_subtree(&entry_rel, &sub, side, paired)?,
            }
        }
        Ok(())
    }

    /// Enumerate every file under a directory present on one side only
    fn record_subtree(
        &self,
        rel: &RelPath,
        dir: &DirSide,
        side: Side,
        paired: &mut PairedTree,
    ) -> Result<(), PackDiffError> {
        match side {
            Side::Left => paired.removed_dirs.push(rel.clone()),
            Side::Right => paired.added_dirs.push(rel.clone()),
        }

        let files = self.enumerate_subtree(rel, dir)?;
        debug!("{} files under one-sided directory {:?}", files.len(), dir.path);
        match side {
            Side::Left => paired.left_only.extend(files),
            Side::Right => paired.right_only.extend(files),
        }
        Ok(())
    }

    fn enumerate_subtree(&self, rel: &RelPath, dir: &DirSide) -> Result<Vec<RelPath>, PackDiffError> {
        let mut files = Vec::new();
        let mut pending = vec![(rel.clone(), dir.clone())];

        while let Some((base_rel, base)) = pending.pop() {
            let walker = WalkDir::new(&base.path)
                .follow_links(false)
                .skip_hidden(false)
                .sort(true);

            for entry in walker {
                let entry = entry.map_err(|e| {
                    PackDiffError::Io(io::Error::new(
                        io::ErrorKind::Other,
                        format!("Walk error under {}: {}", base.path.display(), e),
                    ))
                })?;

                let path = entry.path();
                let relative = path
                    .strip_prefix(&base.path)
                    .map_err(|e| PackDiffError::Path(e.to_string()))?;

                // Skip the synthetic root entry (empty path)
                if relative.as_os_str().is_empty() {
                    continue;
                }

                let entry_rel = base_rel.join(RelPath::from_path(relative).as_str());
                let file_type = entry.file_type();

                if file_type.is_dir() {
                    continue;
                }
                if file_type.is_file() {
                    if !self.is_ignored_with_parents(&entry_rel, false) {
                        files.push(entry_rel);
                    }
                    continue;
                }

                match fs::metadata(&path) {
                    Ok(metadata) if metadata.is_file() => {
                        if !self.is_ignored_with_parents(&entry_rel, false) {
                            files.push(entry_rel);
                        }
                    }
                    Ok(metadata) if metadata.is_dir() => {
                        if self.is_ignored_with_parents(&entry_rel, true) {
                            continue;
                        }
                        let parent_side = DirSide {
                            path: path.parent().map(Path::to_path_buf).unwrap_or_default(),
                            visited: link_parent_chain(&base, &path),
                        };
                        if let Some(side) = parent_side.descend(path.clone(), true) {
                            pending.push((entry_rel, side));
                        }
                    }
                    Ok(_) => debug!("Skipping special file {:?}", path),
                    Err(e) => debug!("Skipping broken entry {:?}: {}", path, e),
                }
            }
        }

        Ok(files)
    }

    fn is_ignored(&self, rel: &RelPath, is_dir: bool) -> bool {
        match &self.ignore {
            Some(ignore) => ignore.matched(Path::new(rel.as_str()), is_dir).is_ignore(),
            None => false,
        }
    }

    /// Check a path and all of its parent directories
    fn is_ignored_with_parents(&self, rel: &RelPath, is_dir: bool) -> bool {
        if self.is_ignored(rel, is_dir) {
            return true;
        }

        let mut current = rel.parent();
        while let Some(parent) = current {
            if parent.is_root() {
                break;
            }
            if self.is_ignored(&parent, true) {
                return true;
            }
            current = parent.parent();
        }
        false
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Visited chain for a link found inside a one-sided walk: the base chain
/// plus the link's own canonical parent directory
fn link_parent_chain(base: &DirSide, link: &Path) -> Vec<PathBuf> {
    let mut visited = base.visited.clone();
    if let Some(parent) = link.parent() {
        if let Ok(canonical) = fs::canonicalize(parent) {
            visited.push(canonical);
        }
    }
    visited
}

/// A missing root is an empty tree; a root that is not a directory is an error
fn open_root(root: &Path) -> Result<Option<DirSide>, PackDiffError> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(Some(DirSide::open(root)?)),
        Ok(_) => Err(PackDiffError::Config(format!(
            "{} is not a directory",
            root.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Root {:?} does not exist, treating it as empty", root);
            Ok(None)
        }
        Err(e) => Err(PackDiffError::io_at(root, e)),
    }
}

/// Compile scan ignore lines (gitignore syntax)
fn build_ignore(patterns: &[String]) -> Result<Option<Gitignore>, PackDiffError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GitignoreBuilder::new("");
    for pattern in patterns {
        builder.add_line(None, pattern).map_err(|e| {
            PackDiffError::Config(format!("Invalid ignore pattern '{}': {}", pattern, e))
        })?;
        debug!("Added ignore pattern: {}", pattern);
    }

    let ignore = builder
        .build()
        .map_err(|e| PackDiffError::Config(format!("Failed to build ignore list: {}", e)))?;
    Ok(Some(ignore))
}
