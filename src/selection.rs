//! Multi-select state and batch removal planning.
//!
//! Removing selected items one by one in ascending order shifts every later
//! index. Instead the selection is walked in descending order and folded
//! into runs of adjacent indices, each removed with a single notification.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::error::{Error, Result};

/// A maximal block of adjacent selected indices.
///
/// `head` is the highest index of the block; it covers
/// `head + 1 - len ..= head`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemovalRun {
    pub head: usize,
    pub len: usize,
}

impl RemovalRun {
    /// Lowest index covered by the run.
    pub fn first(&self) -> usize {
        self.head + 1 - self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.first()..self.head + 1
    }
}

/// Fold `selected` into runs, highest run first.
///
/// Every index must be below `item_count`; duplicates are ignored.
pub fn compute_removal_runs(selected: &[usize], item_count: usize) -> Result<Vec<RemovalRun>> {
    if let Some(&index) = selected.iter().find(|&&i| i >= item_count) {
        return Err(Error::SelectionIndexOutOfRange {
            index,
            len: item_count,
        });
    }

    let mut sorted = selected.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut runs: Vec<RemovalRun> = Vec::new();
    for index in sorted {
        match runs.last_mut() {
            Some(run) if run.first() == index + 1 => run.len += 1,
            _ => runs.push(RemovalRun {
                head: index,
                len: 1,
            }),
        }
    }
    Ok(runs)
}

/// Remove `runs` from `items` in the order given (descending) and return the
/// removed elements in their original order.
pub fn apply_runs<T>(items: &mut Vec<T>, runs: &[RemovalRun]) -> Vec<T> {
    let mut removed: Vec<Vec<T>> = runs
        .iter()
        .map(|run| items.drain(run.range()).collect())
        .collect();
    removed.reverse();
    removed.into_iter().flatten().collect()
}

/// Selected item indices for one multi-select session.
#[derive(Clone, Debug, Default)]
pub struct SelectionSet {
    selected: BTreeSet<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `index`; returns whether it is now selected.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.selected.remove(&index) {
            false
        } else {
            self.selected.insert(index);
            true
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected indices, ascending.
    pub fn indices(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    /// Selected indices, descending (removal order).
    pub fn descending(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().rev().copied()
    }

    /// Empty the set, returning every index that was selected so the
    /// caller can redraw each one.
    pub fn clear(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.selected).into_iter().collect()
    }

    /// An item was inserted at `index`: later selections move up by one.
    pub fn shift_inserted(&mut self, index: usize) {
        self.selected = self
            .selected
            .iter()
            .map(|&i| if i >= index { i + 1 } else { i })
            .collect();
    }

    /// The item at `index` was removed: it leaves the selection and later
    /// selections move down by one.
    pub fn shift_removed(&mut self, index: usize) {
        self.shift_removed_runs(&[RemovalRun { head: index, len: 1 }]);
    }

    /// Items covered by `runs` were removed.
    pub fn shift_removed_runs(&mut self, runs: &[RemovalRun]) {
        self.selected = self
            .selected
            .iter()
            .filter(|&&i| !runs.iter().any(|r| r.range().contains(&i)))
            .map(|&i| i - runs.iter().filter(|r| r.head < i).map(|r| r.len).sum::<usize>())
            .collect();
    }

    pub fn removal_runs(&self, item_count: usize) -> Result<Vec<RemovalRun>> {
        compute_removal_runs(&self.indices(), item_count)
    }
}

/// Title shown while a selection is active.
pub fn selection_title(count: usize, total: usize) -> String {
    if count == 1 {
        format!("{} selected item of total: {}", count, total)
    } else {
        format!("{} selected items of total: {}", count, total)
    }
}
