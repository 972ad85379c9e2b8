use packdiff_common::{DiffResult, DiffRow, FileComparison, DEFAULT_CONTEXT_LINES};
use similar::{capture_diff_slices, group_diff_ops, Algorithm, DiffOp, DiffTag};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Line diff engine producing unified-style hunks with line numbers
#[derive(Debug, Clone, Copy)]
pub struct LineDiffEngine {
    context_lines: usize,
}

impl LineDiffEngine {
    pub fn new(context_lines: usize) -> Self {
        Self { context_lines }
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Read and diff two files.
    ///
    /// Read failures become `Unreadable` and decode failures become `Binary`;
    /// neither is returned as an error so one bad file never stops a run.
    pub fn diff_files(&self, left_path: &Path, right_path: &Path) -> FileComparison {
        let left = match fs::read(left_path) {
            Ok(bytes) => bytes,
            Err(e) => return unreadable(left_path, &e),
        };
        let right = match fs::read(right_path) {
            Ok(bytes) => bytes,
            Err(e) => return unreadable(right_path, &e),
        };

        self.diff_bytes(&left, &right)
    }

    /// Diff raw contents; text only when both sides are valid UTF-8
    pub fn diff_bytes(&self, left: &[u8], right: &[u8]) -> FileComparison {
        match (std::str::from_utf8(left), std::str::from_utf8(right)) {
            (Ok(left), Ok(right)) => FileComparison::Text(self.diff_text(left, right)),
            _ => FileComparison::Binary,
        }
    }

    pub fn diff_text(&self, left: &str, right: &str) -> DiffResult {
        let left_lines = split_lines(left);
        let right_lines = split_lines(right);
        self.diff_lines(&left_lines, &right_lines)
    }

    /// Diff two line sequences.
    ///
    /// Myers computes a minimal edit script, i.e. one derived from a longest
    /// common subsequence of the two sequences.
    pub fn diff_lines(&self, left: &[&str], right: &[&str]) -> DiffResult {
        let ops = capture_diff_slices(Algorithm::Myers, left, right);
        let (added_lines, removed_lines) = count_changes(&ops);

        let mut rows = Vec::new();
        for group in group_diff_ops(ops, self.context_lines) {
            push_hunk(&mut rows, &group, left, right);
        }

        debug!(
            "Line diff: +{} -{} in {} rows",
            added_lines,
            removed_lines,
            rows.len()
        );

        DiffResult {
            added_lines,
            removed_lines,
            rows,
        }
    }
}

impl Default for LineDiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LINES)
    }
}

/// Split text into lines, keeping each line's terminator
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn unreadable(path: &Path, err: &std::io::Error) -> FileComparison {
    FileComparison::Unreadable {
        reason: format!("cannot read {}: {}", path.display(), err),
    }
}

fn count_changes(ops: &[DiffOp]) -> (usize, usize) {
    let mut added = 0;
    let mut removed = 0;

    for op in ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {}
            DiffTag::Delete => removed += old_range.len(),
            DiffTag::Insert => added += new_range.len(),
            DiffTag::Replace => {
                removed += old_range.len();
                added += new_range.len();
            }
        }
    }

    (added, removed)
}

fn push_hunk(rows: &mut Vec<DiffRow>, group: &[DiffOp], left: &[&str], right: &[&str]) {
    let (first, last) = match (group.first(), group.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return,
    };

    let left_begin = first.old_range().start;
    let left_len = last.old_range().end - left_begin;
    let right_begin = first.new_range().start;
    let right_len = last.new_range().end - right_begin;

    rows.push(DiffRow::HunkHeader {
        left_start: header_start(left_begin, left_len),
        left_len,
        right_start: header_start(right_begin, right_len),
        right_len,
    });

    for op in group {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                for (left_idx, right_idx) in old_range.zip(new_range) {
                    rows.push(DiffRow::Context {
                        left: left_idx + 1,
                        right: right_idx + 1,
                        text: left[left_idx].to_string(),
                    });
                }
            }
            DiffTag::Delete => push_removed(rows, old_range, left),
            DiffTag::Insert => push_added(rows, new_range, right),
            DiffTag::Replace => {
                push_removed(rows, old_range, left);
                push_added(rows, new_range, right);
            }
        }
    }
}

fn push_removed(rows: &mut Vec<DiffRow>, range: std::ops::Range<usize>, left: &[&str]) {
    rows.extend(range.map(|idx| DiffRow::Removed {
        left: idx + 1,
        text: left[idx].to_string(),
    }));
}

fn push_added(rows: &mut Vec<DiffRow>, range: std::ops::Range<usize>, right: &[&str]) {
    rows.extend(range.map(|idx| DiffRow::Added {
        right: idx + 1,
        text: right[idx].to_string(),
    }));
}

/// Unified-diff convention: an empty range names the line before it
fn header_start(begin: usize, len: usize) -> usize {
    if len == 0 {
        begin
    } else {
        begin + 1
    }
}

/// Render a diff as unified diff text
pub fn render_unified(diff: &DiffResult, left_label: &str, right_label: &str) -> String {
    if diff.is_empty() {
        return String::new();
    }

    let mut output = format!("--- {}\n+++ {}\n", left_label, right_label);

    for row in &diff.rows {
        match row {
            DiffRow::HunkHeader {
                left_start,
                left_len,
                right_start,
                right_len,
            } => {
                output.push_str(&format!(
                    "@@ -{} +{} @@\n",
                    format_range(*left_start, *left_len),
                    format_range(*right_start, *right_len)
                ));
            }
            DiffRow::Context { text, .. } => push_line(&mut output, ' ', text),
            DiffRow::Removed { text, .. } => push_line(&mut output, '-', text),
            DiffRow::Added { text, .. } => push_line(&mut output, '+', text),
        }
    }

    output
}

fn format_range(start: usize, len: usize) -> String {
    if len == 1 {
        start.to_string()
    } else {
        format!("{},{}", start, len)
    }
}

fn push_line(output: &mut String, marker: char, text: &str) {
    output.push(marker);
    match text.strip_suffix('\n') {
        Some(line) => {
            output.push_str(line.strip_suffix('\r').unwrap_or(line));
            output.push('\n');
        }
        None => {
            output.push_str(text);
            output.push_str("\n\\ No newline at end of file\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn numbered_lines(count: usize) -> String {
        (1..=count).map(|i| format!("line{}\n", i)).collect()
    }

    fn row_counts(diff: &DiffResult) -> (usize, usize) {
        let added = diff
            .rows
            .iter()
            .filter(|row| matches!(row, DiffRow::Added { .. }))
            .count();
        let removed = diff
            .rows
            .iter()
            .filter(|row| matches!(row, DiffRow::Removed { .. }))
            .count();
        (added, removed)
    }

    #[test]
    fn test_text_diff_basic() {
        let engine = LineDiffEngine::default();
        let diff = engine.diff_text("line1\nline2\nline3\n", "line1\nline2_modified\nline3\n");

        assert_eq!(diff.added_lines, 1);
        assert_eq!(diff.removed_lines, 1);
        assert_eq!(
            diff.rows,
            vec![
                DiffRow::HunkHeader {
                    left_start: 1,
                    left_len: 3,
                    right_start: 1,
                    right_len: 3,
                },
                DiffRow::Context {
                    left: 1,
                    right: 1,
                    text: "line1\n".to_string(),
                },
                DiffRow::Removed {
                    left: 2,
                    text: "line2\n".to_string(),
                },
                DiffRow::Added {
                    right: 2,
                    text: "line2_modified\n".to_string(),
                },
                DiffRow::Context {
                    left: 3,
                    right: 3,
                    text: "line3\n".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_identical_text_yields_empty_diff() {
        let engine = LineDiffEngine::default();
        let text = numbered_lines(5);
        let diff = engine.diff_text(&text, &text);

        assert!(diff.is_empty());
        assert_eq!(diff.added_lines, 0);
        assert_eq!(diff.removed_lines, 0);
        assert_eq!(diff.hunk_count(), 0);
    }

    #[test]
    fn test_file_becoming_empty_is_single_removal_hunk() {
        let engine = LineDiffEngine::default();
        let diff = engine.diff_text(&numbered_lines(4), "");

        assert_eq!(diff.hunk_count(), 1);
        assert_eq!(diff.removed_lines, 4);
        assert_eq!(diff.added_lines, 0);
        assert_eq!(
            diff.rows[0],
            DiffRow::HunkHeader {
                left_start: 1,
                left_len: 4,
                right_start: 0,
                right_len: 0,
            }
        );
        assert!(diff.rows[1..]
            .iter()
            .all(|row| matches!(row, DiffRow::Removed { .. })));
    }

    #[test]
    fn test_context_window_around_single_change() {
        let engine = LineDiffEngine::new(2);
        let left = numbered_lines(10);
        let right = left.replace("line5\n", "changed\n");
        let diff = engine.diff_text(&left, &right);

        assert_eq!(diff.hunk_count(), 1);
        assert_eq!(
            diff.rows[0],
            DiffRow::HunkHeader {
                left_start: 3,
                left_len: 5,
                right_start: 3,
                right_len: 5,
            }
        );

        let left_numbers: Vec<usize> = diff
            .rows
            .iter()
            .filter_map(|row| match row {
                DiffRow::Context { left, .. } | DiffRow::Removed { left, .. } => Some(*left),
                _ => None,
            })
            .collect();
        assert_eq!(left_numbers, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_context_window_clipped_at_file_start() {
        let engine = LineDiffEngine::new(2);
        let left = numbered_lines(10);
        let right = left.replacen("line1\n", "first\n", 1);
        let diff = engine.diff_text(&left, &right);

        assert_eq!(
            diff.rows[0],
            DiffRow::HunkHeader {
                left_start: 1,
                left_len: 3,
                right_start: 1,
                right_len: 3,
            }
        );
    }

    #[test]
    fn test_nearby_changes_share_a_hunk() {
        let engine = LineDiffEngine::new(2);
        let left = numbered_lines(10);
        let right = left
            .replace("line3\n", "three\n")
            .replace("line7\n", "seven\n");
        let diff = engine.diff_text(&left, &right);

        assert_eq!(diff.hunk_count(), 1);
        assert_eq!(diff.added_lines, 2);
        assert_eq!(diff.removed_lines, 2);
    }

    #[test]
    fn test_distant_changes_split_into_hunks() {
        let engine = LineDiffEngine::new(2);
        let left = numbered_lines(10);
        let right = left
            .replacen("line1\n", "one\n", 1)
            .replace("line10\n", "ten\n");
        let diff = engine.diff_text(&left, &right);

        let headers: Vec<&DiffRow> = diff
            .rows
            .iter()
            .filter(|row| matches!(row, DiffRow::HunkHeader { .. }))
            .collect();
        assert_eq!(
            headers,
            vec![
                &DiffRow::HunkHeader {
                    left_start: 1,
                    left_len: 3,
                    right_start: 1,
                    right_len: 3,
                },
                &DiffRow::HunkHeader {
                    left_start: 8,
                    left_len: 3,
                    right_start: 8,
                    right_len: 3,
                },
            ]
        );
    }

    #[test]
    fn test_counts_match_rendered_rows() {
        let engine = LineDiffEngine::default();
        let left = "a\nb\nc\nd\ne\nf\ng\nh\n";
        let right = "a\nB\nc\nd\nx\ny\ne\nh\ni\n";
        let diff = engine.diff_text(left, right);

        assert_eq!(row_counts(&diff), (diff.added_lines, diff.removed_lines));
    }

    #[test]
    fn test_line_numbers_are_monotonic() {
        let engine = LineDiffEngine::new(1);
        let left = numbered_lines(30);
        let right = left
            .replace("line4\n", "")
            .replace("line15\n", "line15\nextra\n")
            .replace("line29\n", "changed\n");
        let diff = engine.diff_text(&left, &right);

        let mut last_left = 0;
        let mut last_right = 0;
        for row in &diff.rows {
            match row {
                DiffRow::Context { left, right, .. } => {
                    assert!(*left >= last_left && *right >= last_right);
                    last_left = *left;
                    last_right = *right;
                }
                DiffRow::Removed { left, .. } => {
                    assert!(*left >= last_left);
                    last_left = *left;
                }
                DiffRow::Added { right, .. } => {
                    assert!(*right >= last_right);
                    last_right = *right;
                }
                DiffRow::HunkHeader { .. } => {}
            }
        }
        assert_eq!(row_counts(&diff), (diff.added_lines, diff.removed_lines));
    }

    #[test]
    fn test_missing_trailing_newline_is_a_change() {
        let engine = LineDiffEngine::default();
        let diff = engine.diff_text("a\nb", "a\nb\n");

        assert_eq!(diff.added_lines, 1);
        assert_eq!(diff.removed_lines, 1);
    }

    #[test]
    fn test_non_utf8_bytes_are_binary() {
        let engine = LineDiffEngine::default();
        let result = engine.diff_bytes(b"abc\xff\n", b"abc\n");
        assert_eq!(result, FileComparison::Binary);
    }

    #[test]
    fn test_diff_files_reports_unreadable() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().join("a.txt");
        fs::write(&existing, "x\n").unwrap();

        let result = LineDiffEngine::default().diff_files(&existing, &temp.path().join("missing.txt"));
        match result {
            FileComparison::Unreadable { reason } => assert!(reason.contains("missing.txt")),
            other => panic!("expected unreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_render_unified() {
        let engine = LineDiffEngine::default();
        let diff = engine.diff_text("a\nb\nc", "a\nB\nc");
        let rendered = render_unified(&diff, "a/f.txt", "b/f.txt");

        assert_eq!(
            rendered,
            "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n\\ No newline at end of file\n"
        );
    }

    #[test]
    fn test_render_unified_empty_diff() {
        let diff = DiffResult::default();
        assert!(render_unified(&diff, "a", "b").is_empty());
    }
}
