//! Retention engine: decides which artifacts a rotation removes.
//!
//! Works purely on listing metadata. Nothing here touches a backend, so the
//! selection can be printed for a dry run or tested in isolation.

use regex::Regex;
use std::cmp::Ordering;

use crate::error::{RbackupError, Result};
use crate::types::Artifact;

/// Patterns treated as "manage every artifact". Never compiled.
const MATCH_ALL_SHORTCUTS: [&str; 4] = ["", "*", ".*", "(.*)"];

/// Name filter for managed artifacts.
#[derive(Debug, Clone, Default)]
pub enum Pattern {
    #[default]
    MatchAll,
    /// Anchored at the start of the name only, like a prefix match.
    Regex(Regex),
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        if MATCH_ALL_SHORTCUTS.contains(&trimmed) {
            return Ok(Pattern::MatchAll);
        }

        let anchored = format!("^(?:{trimmed})");
        let re = Regex::new(&anchored).map_err(|source| RbackupError::InvalidPattern {
            pattern: trimmed.to_string(),
            source,
        })?;
        Ok(Pattern::Regex(re))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::MatchAll => true,
            Pattern::Regex(re) => re.is_match(name),
        }
    }
}

/// How many pattern-matching artifacts survive a rotation.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub keep_count: usize,
    pub pattern: Pattern,
}

impl RetentionPolicy {
    pub fn new(keep_count: usize, pattern: &str) -> Result<Self> {
        Ok(Self {
            keep_count,
            pattern: Pattern::parse(pattern)?,
        })
    }

    /// Artifacts managed by this policy, in listing order.
    pub fn matching<'a>(&self, artifacts: &'a [Artifact]) -> Vec<&'a Artifact> {
        artifacts
            .iter()
            .filter(|a| self.pattern.matches(&a.name))
            .collect()
    }

    /// Select the artifacts to delete.
    ///
    /// Matching artifacts are ordered newest first; the first `keep_count`
    /// are kept and everything after them is returned. Artifacts outside the
    /// pattern are never returned.
    pub fn select_for_deletion(&self, artifacts: &[Artifact]) -> Vec<Artifact> {
        let mut matched = self.matching(artifacts);
        if matched.len() <= self.keep_count {
            return Vec::new();
        }

        order_by_recency(&mut matched);
        matched
            .into_iter()
            .skip(self.keep_count)
            .cloned()
            .collect()
    }
}

/// Convenience wrapper over [`RetentionPolicy::select_for_deletion`].
pub fn select_for_deletion(
    artifacts: &[Artifact],
    pattern: &str,
    keep_count: usize,
) -> Result<Vec<Artifact>> {
    Ok(RetentionPolicy::new(keep_count, pattern)?.select_for_deletion(artifacts))
}

/// Newest first. Equal timestamps fall back to name descending so the
/// result never depends on listing order.
pub fn order_by_recency(artifacts: &mut [&Artifact]) {
    artifacts.sort_by(|a, b| compare_recency(a, b));
}

fn compare_recency(a: &Artifact, b: &Artifact) -> Ordering {
    b.last_modified
        .cmp(&a.last_modified)
        .then_with(|| b.name.cmp(&a.name))
}
