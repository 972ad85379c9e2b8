//! Ordered exclusion rules with negation.
//!
//! Every rule is evaluated for every candidate, in order; the last rule that
//! matches decides. A plain rule excludes, a `!` rule re-includes, and a path
//! no rule matches is kept.

use glob::{MatchOptions, Pattern};
use packdiff_common::{PackDiffError, RelPath};
use std::path::{Path, PathBuf};
use tracing::debug;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled exclusion pattern
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    source: String,
    pattern: Pattern,
    negated: bool,
    anchored: bool,
    dir_only: bool,
}

impl ExclusionRule {
    /// Compile a pattern.
    ///
    /// `!` negates, a leading `/` anchors at the filter root and a trailing `/`
    /// only matches directories.
    pub fn parse(raw: &str) -> Result<Self, PackDiffError> {
        let (negated, body) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let anchored = body.starts_with('/');
        let dir_only = body.ends_with('/');
        let glob_text = body.trim_start_matches('/').trim_end_matches('/');

        if glob_text.is_empty() {
            return Err(PackDiffError::Pattern {
                pattern: raw.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let pattern = Pattern::new(glob_text).map_err(|e| PackDiffError::Pattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: raw.to_string(),
            pattern,
            negated,
            anchored,
            dir_only,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// File patterns match the path's own tail segments; `dir/` patterns
    /// match one of its ancestor directories.
    pub fn matches(&self, path: &RelPath) -> bool {
        let segments: Vec<&str> = path.segments().collect();
        let len = segments.len();

        if self.dir_only {
            (1..len).any(|end| self.matches_prefix(&segments[..end]))
        } else {
            self.matches_prefix(&segments)
        }
    }

    /// Relative patterns match any tail of the path that starts at a segment boundary
    fn matches_prefix(&self, segments: &[&str]) -> bool {
        if self.anchored {
            return self.pattern.matches_with(&segments.join("/"), MATCH_OPTIONS);
        }

        (0..segments.len()).any(|start| {
            self.pattern
                .matches_with(&segments[start..].join("/"), MATCH_OPTIONS)
        })
    }
}

/// Ordered list of exclusion rules, compiled up front
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    rules: Vec<ExclusionRule>,
}

impl ExclusionFilter {
    /// Compile every pattern; the first malformed one fails the whole filter
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PackDiffError> {
        let rules = patterns
            .iter()
            .map(|pattern| ExclusionRule::parse(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Compiled {} exclusion rules", rules.len());
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_excluded(&self, path: &RelPath) -> bool {
        self.rules.iter().fold(false, |excluded, rule| {
            if rule.matches(path) {
                !rule.negated
            } else {
                excluded
            }
        })
    }

    /// Keep the candidates no rule excludes, preserving their order
    pub fn apply<'a, I>(&self, candidates: I) -> Vec<RelPath>
    where
        I: IntoIterator<Item = &'a RelPath>,
    {
        candidates
            .into_iter()
            .filter(|path| !self.is_excluded(path))
            .cloned()
            .collect()
    }

    /// Filter filesystem paths located under `filter_root`
    pub fn apply_under(
        &self,
        filter_root: &Path,
        candidates: &[PathBuf],
    ) -> Result<Vec<PathBuf>, PackDiffError> {
        let mut kept = Vec::new();

        for candidate in candidates {
            let relative = candidate.strip_prefix(filter_root).map_err(|_| {
                PackDiffError::Path(format!(
                    "{} is not under filter root {}",
                    candidate.display(),
                    filter_root.display()
                ))
            })?;

            if !self.is_excluded(&RelPath::from_path(relative)) {
                kept.push(candidate.clone());
            }
        }

        Ok(kept)
    }
}
