use packdiff_common::{FileComparison, RelPath};
use packdiff_core::{render_unified, ComparisonReport, EffectiveChanges, SyncPlan};
use std::fmt::Write;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub color: bool,
    pub show_diff: bool,
    pub diff_only: bool,
}

impl RenderOptions {
    fn paint(&self, color: &'static str) -> (&'static str, &'static str) {
        if self.color {
            (color, RESET)
        } else {
            ("", "")
        }
    }
}

/// Collapse files lying under a one-sided directory into `dir/`, keeping order
pub fn collapse_paths(paths: &[RelPath], dirs: &[RelPath]) -> Vec<String> {
    let mut collapsed: Vec<String> = Vec::new();

    for path in paths {
        let entry = match dirs.iter().find(|dir| path.starts_with(dir)) {
            Some(dir) => format!("{}/", dir),
            None => path.to_string(),
        };
        if collapsed.last() != Some(&entry) {
            collapsed.push(entry);
        }
    }

    collapsed
}

fn modified_note(comparison: &FileComparison) -> String {
    match comparison {
        FileComparison::Text(diff) => format!("+{} -{}", diff.added_lines, diff.removed_lines),
        FileComparison::Binary => "binary".to_string(),
        FileComparison::Unreadable { reason } => format!("unreadable: {}", reason),
    }
}

pub fn render_report(
    report: &ComparisonReport,
    effective: &EffectiveChanges,
    exclusion_rules: usize,
    options: RenderOptions,
) -> String {
    let mut out = String::new();
    let (green, reset) = options.paint(GREEN);
    let (red, _) = options.paint(RED);
    let (yellow, _) = options.paint(YELLOW);

    let _ = writeln!(out, "{}", "=".repeat(80));
    let _ = writeln!(out, "Comparison Results");
    let _ = writeln!(out, "{}", "=".repeat(80));

    let added = collapse_paths(report.added(), report.added_dirs());
    if !added.is_empty() {
        let _ = writeln!(out, "\nAdded ({} files):", report.added().len());
        for path in &added {
            let _ = writeln!(out, "  {}+{} {}", green, reset, path);
        }
    }

    let removed = collapse_paths(report.removed(), report.removed_dirs());
    if !removed.is_empty() {
        let _ = writeln!(out, "\nRemoved ({} files):", report.removed().len());
        for path in &removed {
            let _ = writeln!(out, "  {}-{} {}", red, reset, path);
        }
    }

    if !report.modified().is_empty() {
        let _ = writeln!(out, "\nModified ({} files):", report.modified().len());
        for entry in report.modified() {
            let _ = writeln!(
                out,
                "  {}~{} {}  ({})",
                yellow,
                reset,
                entry.path,
                modified_note(&entry.comparison)
            );
        }
    }

    if !options.diff_only && !report.identical().is_empty() {
        let _ = writeln!(out, "\nIdentical ({} files):", report.identical().len());
        for path in report.identical() {
            let _ = writeln!(out, "  = {}", path);
        }
    }

    if options.show_diff {
        for entry in report.modified() {
            if let FileComparison::Text(diff) = &entry.comparison {
                let _ = writeln!(out);
                out.push_str(&render_unified(
                    diff,
                    &format!("a/{}", entry.path),
                    &format!("b/{}", entry.path),
                ));
            }
        }
    }

    let summary = report.summary();
    let _ = writeln!(out, "\n{}", "=".repeat(80));
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  Total files:     {}", summary.total);
    let _ = writeln!(out, "  Added:           {}", summary.added);
    let _ = writeln!(out, "  Removed:         {}", summary.removed);
    let _ = writeln!(out, "  Modified:        {}", summary.modified);
    let _ = writeln!(out, "  Identical:       {}", summary.identical);
    let _ = writeln!(
        out,
        "  Effective:       {} added, {} modified ({} exclusion rules)",
        effective.added.len(),
        effective.modified.len(),
        exclusion_rules
    );
    let _ = writeln!(out, "{}", "=".repeat(80));

    out
}

pub fn render_plan(plan: &SyncPlan) -> String {
    let mut out = String::new();

    if plan.is_empty() {
        out.push_str("Version updated, but no effective changes detected.\n");
        return out;
    }

    let sections = [
        ("Updated files", &plan.updated),
        ("Added files", &plan.added),
        ("Deleted files", &plan.deleted),
    ];
    for (title, paths) in sections {
        if paths.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{} ({}):", title, paths.len());
        for path in paths {
            let _ = writeln!(out, "  {}", path);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{} changes in total", plan.change_count());
    out
}
