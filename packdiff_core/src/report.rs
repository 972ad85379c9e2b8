use crate::content::ContentVerdict;
use crate::exclusion::ExclusionFilter;
use crate::tree::PairedTree;
use packdiff_common::{Classification, ModifiedFile, PackDiffError, RelPath};
use serde::Serialize;
use std::collections::BTreeMap;

/// Immutable result of comparing two trees.
///
/// Every list is sorted by path and the four categories partition the
/// compared paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    added: Vec<RelPath>,
    removed: Vec<RelPath>,
    modified: Vec<ModifiedFile>,
    identical: Vec<RelPath>,
    added_dirs: Vec<RelPath>,
    removed_dirs: Vec<RelPath>,
}

/// Per-category counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReportSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub identical: usize,
    pub total: usize,
}

/// Added and modified paths that survived an exclusion filter
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EffectiveChanges {
    pub added: Vec<RelPath>,
    pub modified: Vec<RelPath>,
}

impl EffectiveChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty()
    }
}

impl ComparisonReport {
    pub fn added(&self) -> &[RelPath] {
        &self.added
    }

    pub fn removed(&self) -> &[RelPath] {
        &self.removed
    }

    pub fn modified(&self) -> &[ModifiedFile] {
        &self.modified
    }

    pub fn identical(&self) -> &[RelPath] {
        &self.identical
    }

    /// Roots of subtrees present only in the new tree
    pub fn added_dirs(&self) -> &[RelPath] {
        &self.added_dirs
    }

    /// Roots of subtrees present only in the old tree
    pub fn removed_dirs(&self) -> &[RelPath] {
        &self.removed_dirs
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    pub fn summary(&self) -> ReportSummary {
        let added = self.added.len();
        let removed = self.removed.len();
        let modified = self.modified.len();
        let identical = self.identical.len();
        ReportSummary {
            added,
            removed,
            modified,
            identical,
            total: added + removed + modified + identical,
        }
    }

    pub fn classification_of(&self, path: &RelPath) -> Option<Classification> {
        if self.added.binary_search(path).is_ok() {
            Some(Classification::Added)
        } else if self.removed.binary_search(path).is_ok() {
            Some(Classification::Removed)
        } else if self
            .modified
            .binary_search_by(|entry| entry.path.cmp(path))
            .is_ok()
        {
            Some(Classification::Modified)
        } else if self.identical.binary_search(path).is_ok() {
            Some(Classification::Identical)
        } else {
            None
        }
    }

    /// Apply the filter to the added and modified categories independently
    pub fn effective_changes(&self, filter: &ExclusionFilter) -> EffectiveChanges {
        EffectiveChanges {
            added: filter.apply(&self.added),
            modified: filter.apply(self.modified.iter().map(|entry| &entry.path)),
        }
    }
}

/// Builds a `ComparisonReport` from a paired tree and the content verdicts of its common files
pub struct ReportAssembler;

impl ReportAssembler {
    /// `verdicts` must line up with `paired.common`
    pub fn assemble(
        paired: PairedTree,
        verdicts: Vec<ContentVerdict>,
    ) -> Result<ComparisonReport, PackDiffError> {
        if paired.common.len() != verdicts.len() {
            return Err(PackDiffError::Comparison(format!(
                "{} common paths but {} content verdicts",
                paired.common.len(),
                verdicts.len()
            )));
        }

        let mut modified = Vec::new();
        let mut identical = Vec::new();
        for (path, verdict) in paired.common.into_iter().zip(verdicts) {
            match verdict {
                ContentVerdict::Identical => identical.push(path),
                ContentVerdict::Modified(comparison) => {
                    modified.push(ModifiedFile { path, comparison })
                }
            }
        }

        let mut report = ComparisonReport {
            added: paired.right_only,
            removed: paired.left_only,
            modified,
            identical,
            added_dirs: paired.added_dirs,
            removed_dirs: paired.removed_dirs,
        };

        report.added.sort();
        report.removed.sort();
        report.identical.sort();
        report.modified.sort_by(|a, b| a.path.cmp(&b.path));
        report.added_dirs.sort();
        report.added_dirs.dedup();
        report.removed_dirs.sort();
        report.removed_dirs.dedup();

        check_partition(&report)?;
        Ok(report)
    }
}

/// Every path must land in exactly one category
fn check_partition(report: &ComparisonReport) -> Result<(), PackDiffError> {
    let mut seen: BTreeMap<&RelPath, Classification> = BTreeMap::new();
    let categories = [
        (Classification::Added, report.added.iter().collect::<Vec<_>>()),
        (Classification::Removed, report.removed.iter().collect()),
        (
            Classification::Modified,
            report.modified.iter().map(|entry| &entry.path).collect(),
        ),
        (Classification::Identical, report.identical.iter().collect()),
    ];

    for (classification, paths) in categories {
        for path in paths {
            if let Some(previous) = seen.insert(path, classification) {
                return Err(PackDiffError::Comparison(format!(
                    "{} classified as both {} and {}",
                    path, previous, classification
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use packdiff_common::{DiffResult, FileComparison};

    fn rel(items: &[&str]) -> Vec<RelPath> {
        items.iter().map(|item| RelPath::new(item)).collect()
    }

    fn sample_paired() -> PairedTree {
        PairedTree {
            left_only: rel(&["z-removed.txt", "old/a.txt"]),
            right_only: rel(&["new.txt", "mods/b.jar", "mods/a.jar"]),
            common: rel(&["same.txt", "changed.txt", "blob.bin"]),
            added_dirs: rel(&["mods"]),
            removed_dirs: rel(&["old"]),
        }
    }

    fn sample_verdicts() -> Vec<ContentVerdict> {
        vec![
            ContentVerdict::Identical,
            ContentVerdict::Modified(FileComparison::Text(DiffResult {
                added_lines: 2,
                removed_lines: 1,
                rows: Vec::new(),
            })),
            ContentVerdict::Modified(FileComparison::Unreadable {
                reason: "permission denied".to_string(),
            }),
        ]
    }

    #[test]
    fn test_assemble_sorts_and_partitions() {
        let report = ReportAssembler::assemble(sample_paired(), sample_verdicts()).unwrap();

        assert_eq!(report.added(), rel(&["mods/a.jar", "mods/b.jar", "new.txt"]).as_slice());
        assert_eq!(report.removed(), rel(&["old/a.txt", "z-removed.txt"]).as_slice());
        assert_eq!(report.identical(), rel(&["same.txt"]).as_slice());

        let modified: Vec<&str> = report.modified().iter().map(|m| m.path.as_str()).collect();
        assert_eq!(modified, vec!["blob.bin", "changed.txt"]);

        let summary = report.summary();
        assert_eq!(summary.total, 8);
        assert_eq!((summary.added, summary.removed, summary.modified, summary.identical), (3, 2, 2, 1));
        assert!(report.has_changes());
    }

    #[test]
    fn test_unreadable_file_is_kept_as_modified() {
        let report = ReportAssembler::assemble(sample_paired(), sample_verdicts()).unwrap();
        let blob = report
            .modified()
            .iter()
            .find(|entry| entry.path.as_str() == "blob.bin")
            .unwrap();
        assert!(blob.is_binary());
        assert_eq!(blob.note(), Some("permission denied"));
    }

    #[test]
    fn test_classification_of() {
        let report = ReportAssembler::assemble(sample_paired(), sample_verdicts()).unwrap();
        assert_eq!(report.classification_of(&RelPath::new("new.txt")), Some(Classification::Added));
        assert_eq!(report.classification_of(&RelPath::new("old/a.txt")), Some(Classification::Removed));
        assert_eq!(report.classification_of(&RelPath::new("changed.txt")), Some(Classification::Modified));
        assert_eq!(report.classification_of(&RelPath::new("same.txt")), Some(Classification::Identical));
        assert_eq!(report.classification_of(&RelPath::new("unknown")), None);
    }

    #[test]
    fn test_overlapping_categories_are_rejected() {
        let mut paired = sample_paired();
        paired.right_only.push(RelPath::new("same.txt"));

        let result = ReportAssembler::assemble(paired, sample_verdicts());
        assert!(matches!(result, Err(PackDiffError::Comparison(_))));
    }

    #[test]
    fn test_verdict_count_mismatch_is_rejected() {
        let result = ReportAssembler::assemble(sample_paired(), vec![ContentVerdict::Identical]);
        assert!(matches!(result, Err(PackDiffError::Comparison(_))));
    }

    #[test]
    fn test_effective_changes_filters_added_and_modified() {
        let report = ReportAssembler::assemble(sample_paired(), sample_verdicts()).unwrap();
        let filter = ExclusionFilter::new(&["*.jar", "!mods/b.jar", "*.bin"]).unwrap();

        let effective = report.effective_changes(&filter);
        assert_eq!(effective.added, rel(&["mods/b.jar", "new.txt"]));
        assert_eq!(effective.modified, rel(&["changed.txt"]));

        let everything = report.effective_changes(&ExclusionFilter::default());
        assert_eq!(everything.added.len(), 3);
        assert_eq!(everything.modified.len(), 2);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = ReportAssembler::assemble(sample_paired(), sample_verdicts()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["added"][0], "mods/a.jar");
        assert_eq!(json["modified"][0]["path"], "blob.bin");
        assert_eq!(json["modified"][0]["comparison"]["kind"], "unreadable");
        assert_eq!(json["modified"][1]["comparison"]["kind"], "text");
        assert_eq!(json["added_dirs"][0], "mods");
    }
}
