use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Number of unchanged lines shown around each change in a hunk
pub const DEFAULT_CONTEXT_LINES: usize = 2;

/// A `/`-separated path relative to a comparison root.
///
/// Ordering is lexicographic over segments, so `a/x` sorts before `a-b/x`
/// on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Build a relative path from a `/`-separated string, dropping empty and `.` segments
    pub fn new(path: &str) -> Self {
        let joined = path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// The empty path, i.e. the comparison root itself
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Convert a platform path (already relative to a root) into a `RelPath`
    pub fn from_path(path: &Path) -> Self {
        let segments: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Self(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> + Clone {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<RelPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        })
    }

    /// Append a single name (or a `/`-separated relative path)
    pub fn join(&self, name: &str) -> Self {
        let tail = Self::new(name);
        if self.is_root() {
            tail
        } else if tail.is_root() {
            self.clone()
        } else {
            Self(format!("{}/{}", self.0, tail.0))
        }
    }

    /// Segment-wise prefix test; every path starts with the root
    pub fn starts_with(&self, ancestor: &RelPath) -> bool {
        let mut own = self.segments();
        ancestor.segments().all(|segment| own.next() == Some(segment))
    }

    pub fn strip_prefix(&self, ancestor: &RelPath) -> Option<RelPath> {
        if !self.starts_with(ancestor) {
            return None;
        }
        let rest: Vec<&str> = self.segments().skip(ancestor.segments().count()).collect();
        Some(Self(rest.join("/")))
    }

    /// Resolve against a filesystem root
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }
}

impl Ord for RelPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl PartialOrd for RelPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Outcome of comparing one relative path across the old and new trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Present only in the new tree
    Added,
    /// Present only in the old tree
    Removed,
    /// Present in both trees with different content
    Modified,
    /// Present in both trees with byte-identical content
    Identical,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::Added => "added",
            Classification::Removed => "removed",
            Classification::Modified => "modified",
            Classification::Identical => "identical",
        };
        f.write_str(label)
    }
}

/// One row of a line diff.
///
/// Line numbers are 1-based. `text` keeps the original line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffRow {
    /// Start of a hunk, with unified-diff ranges. A zero-length range reports
    /// the line before it as its start.
    HunkHeader {
        left_start: usize,
        left_len: usize,
        right_start: usize,
        right_len: usize,
    },
    Context {
        left: usize,
        right: usize,
        text: String,
    },
    Removed {
        left: usize,
        text: String,
    },
    Added {
        right: usize,
        text: String,
    },
}

/// Line-level diff of two text files
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffResult {
    pub added_lines: usize,
    pub removed_lines: usize,
    pub rows: Vec<DiffRow>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn hunk_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row, DiffRow::HunkHeader { .. }))
            .count()
    }
}

/// Content-level result for a modified file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileComparison {
    /// Both sides decode as UTF-8
    Text(DiffResult),
    /// At least one side is not valid UTF-8; no line data
    Binary,
    /// A side could not be read; content is unknown
    Unreadable { reason: String },
}

impl FileComparison {
    /// Unreadable files count as binary since their content is unknown
    pub fn is_binary(&self) -> bool {
        !matches!(self, FileComparison::Text(_))
    }

    pub fn diff(&self) -> Option<&DiffResult> {
        match self {
            FileComparison::Text(diff) => Some(diff),
            _ => None,
        }
    }
}

/// A path classified as `Modified`, with its content comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub path: RelPath,
    pub comparison: FileComparison,
}

impl ModifiedFile {
    pub fn is_binary(&self) -> bool {
        self.comparison.is_binary()
    }

    /// Explanation attached when the file could not be compared
    pub fn note(&self) -> Option<&str> {
        match &self.comparison {
            FileComparison::Unreadable { reason } => Some(reason),
            _ => None,
        }
    }
}

/// BLAKE3 content digest (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<blake3::Hash> for ContentDigest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// A glob watched by the sync planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePatternRule {
    pub pattern: String,
    #[serde(default, alias = "ignoreDeletions")]
    pub ignore_deletions: bool,
}

/// A folder watched by the sync planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRule {
    pub path: String,
    #[serde(default, alias = "ignoreDeletions")]
    pub ignore_deletions: bool,
}

/// Files and folders whose changes are tracked between versions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionList {
    #[serde(default, alias = "filePatterns")]
    pub file_patterns: Vec<FilePatternRule>,
    #[serde(default)]
    pub folders: Vec<FolderRule>,
}

impl AttentionList {
    pub fn is_empty(&self) -> bool {
        self.file_patterns.is_empty() && self.folders.is_empty()
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Names hidden from both trees while walking (gitignore syntax)
    #[serde(default = "default_ignore_patterns", alias = "ignorePatterns")]
    pub ignore_patterns: Vec<String>,

    /// Ordered exclusion rules deciding which changes are effective
    #[serde(default, alias = "exclusionPatterns")]
    pub exclusion_patterns: Vec<String>,

    /// Context lines around each change in text diffs
    #[serde(default = "default_context_lines", alias = "contextLines")]
    pub context_lines: usize,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,

    /// What the sync planner watches
    #[serde(default, alias = "attentionList")]
    pub attention: AttentionList,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            exclusion_patterns: Vec::new(),
            context_lines: DEFAULT_CONTEXT_LINES,
            portable_mode: false,
            attention: AttentionList::default(),
        }
    }
}

fn default_ignore_patterns() -> Vec<String> {
    vec![".DS_Store".to_string()]
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}
