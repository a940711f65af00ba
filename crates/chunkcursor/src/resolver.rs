//! Column reference resolution with a memo of label lookups.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{CursorError, Result};

/// Default number of memoized label lookups per cursor.
pub const DEFAULT_MEMO_CAPACITY: usize = 256;

/// Column addressed by 1-based index or by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Index(usize),
    Label(&'a str),
}

impl From<usize> for ColumnRef<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Negative indexes map to 0, which never resolves.
impl From<i32> for ColumnRef<'_> {
    fn from(index: i32) -> Self {
        Self::Index(usize::try_from(index).unwrap_or(0))
    }
}

impl<'a> From<&'a str> for ColumnRef<'a> {
    fn from(label: &'a str) -> Self {
        Self::Label(label)
    }
}

impl<'a> From<&'a String> for ColumnRef<'a> {
    fn from(label: &'a String) -> Self {
        Self::Label(label)
    }
}

/// Memo counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Maps column references to 1-based indexes.
#[derive(Debug)]
pub struct ColumnNameResolver {
    labels: Vec<String>,
    folded: Option<Vec<String>>,
    memo: Mutex<LruCache<String, usize>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ColumnNameResolver {
    #[must_use]
    pub fn new<I, S>(labels: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_capacity(labels, case_insensitive, DEFAULT_MEMO_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity<I, S>(labels: I, case_insensitive: bool, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let folded =
            case_insensitive.then(|| labels.iter().map(|label| label.to_lowercase()).collect());
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            labels,
            folded,
            memo: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub const fn is_case_insensitive(&self) -> bool {
        self.folded.is_some()
    }

    /// Resolve any column reference to a 1-based index.
    pub fn resolve(&self, column: ColumnRef<'_>) -> Result<usize> {
        match column {
            ColumnRef::Index(index) => self.resolve_index(index),
            ColumnRef::Label(label) => self.resolve_label(label),
        }
    }

    /// Validate a 1-based index.
    pub fn resolve_index(&self, index: usize) -> Result<usize> {
        if (1..=self.labels.len()).contains(&index) {
            Ok(index)
        } else {
            Err(CursorError::index_out_of_bounds(index, self.labels.len()))
        }
    }

    /// Find the first column whose label matches `label` under the case policy.
    pub fn resolve_label(&self, label: &str) -> Result<usize> {
        if let Some(&index) = self.memo.lock().get(label) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(index);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let position = match &self.folded {
            Some(folded) => {
                let wanted = label.to_lowercase();
                folded.iter().position(|l| *l == wanted)
            }
            None => self.labels.iter().position(|l| l == label),
        };

        let index = position
            .map(|p| p + 1)
            .ok_or_else(|| CursorError::column_not_found(label))?;
        self.memo.lock().put(label.to_owned(), index);
        Ok(index)
    }

    #[must_use]
    pub fn memo_stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.memo.lock().len(),
        }
    }

    /// Drop every memoized lookup.
    pub fn clear(&self) {
        self.memo.lock().clear();
    }
}
