use std::{fmt::Display, fs, path::Path};

use indexmap::IndexMap;
use tracing::info;

use crate::{JetFeatError, JetFeatResult};

/// Event indices to process, grouped by event source.
///
/// Sources keep the order in which they first appear, and indices keep the order in which they
/// were listed (they need not be sorted or unique).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionIndex {
    entries: IndexMap<String, Vec<i64>>,
}

impl SelectionIndex {
    /// Parse selection text with one `"<source>: <index> <index> ..."` line per source.
    ///
    /// Blank lines are skipped. If a source is listed twice, the later line replaces the earlier
    /// one but the source keeps its original position.
    pub fn parse(text: &str) -> JetFeatResult<Self> {
        let mut entries = IndexMap::new();
        for (line_n, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let parse_error = |reason: String| JetFeatError::SelectionParseError {
                line: line_n + 1,
                content: line.to_string(),
                reason,
            };
            let (key, raw) = line
                .split_once(": ")
                .ok_or_else(|| parse_error("missing \": \" separator".to_string()))?;
            let indices = raw
                .split_whitespace()
                .map(|token| {
                    token
                        .parse::<i64>()
                        .map_err(|e| parse_error(format!("invalid index \"{}\": {}", token, e)))
                })
                .collect::<JetFeatResult<Vec<i64>>>()?;
            entries.insert(key.to_string(), indices);
        }
        Ok(Self { entries })
    }

    /// Read a selection file (the path is shell-expanded, so `~` and `$VARS` are allowed).
    pub fn from_file(path: &str) -> JetFeatResult<Self> {
        let path = Path::new(&*shellexpand::full(path)?).canonicalize()?;
        let selection = Self::parse(&fs::read_to_string(&path)?)?;
        info!(
            "Read selection of {} events from {} sources in {}",
            selection.n_selected(),
            selection.len(),
            path.display()
        );
        Ok(selection)
    }

    /// Read and merge several selection files, in order.
    pub fn from_files(paths: &[&str]) -> JetFeatResult<Self> {
        let mut merged = Self::default();
        for path in paths {
            merged.entries.extend(Self::from_file(path)?.entries);
        }
        Ok(merged)
    }

    /// Add (or replace) the indices selected from one source.
    pub fn insert(&mut self, source: &str, indices: Vec<i64>) {
        self.entries.insert(source.to_string(), indices);
    }

    /// The source names in selection order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The indices selected from a source, if it is listed.
    pub fn indices(&self, source: &str) -> Option<&[i64]> {
        self.entries.get(source).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[i64])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The number of listed sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The total number of listed indices over all sources, before any range filtering.
    pub fn n_selected(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// A half-open range `[min, max)` of event indices.
///
/// Bounds outside of `[0, size]` are replaced when clamped against a source size, so the
/// default `(-1, -1)` selects everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRange {
    pub min: i64,
    pub max: i64,
}

impl Default for EventRange {
    fn default() -> Self {
        Self { min: -1, max: -1 }
    }
}

impl Display for EventRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.min, self.max)
    }
}

impl EventRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Clamp against the largest source size: a lower bound outside `[0, max_size]` becomes `0`
    /// and an upper bound outside `[0, max_size]` becomes `max_size`.
    pub fn clamp(&self, max_size: usize) -> Self {
        let size = i64::try_from(max_size).unwrap_or(i64::MAX);
        let min = if self.min < 0 || self.min > size {
            0
        } else {
            self.min
        };
        let max = if self.max < 0 || self.max > size {
            size
        } else {
            self.max
        };
        Self { min, max }
    }

    pub fn contains(&self, index: i64) -> bool {
        self.min <= index && index < self.max
    }

    /// The indices which fall inside this range, in their original order.
    pub fn filter(&self, indices: &[i64]) -> Vec<i64> {
        indices
            .iter()
            .copied()
            .filter(|&i| self.contains(i))
            .collect()
    }
}
