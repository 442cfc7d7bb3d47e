//! Ordered item store behind the grid, with selection and batch delete.

use std::path::{Path, PathBuf};

use crate::debug::dbg_log;
use crate::error::{Error, Result};
use crate::selection::{apply_runs, compute_removal_runs, RemovalRun, SelectionSet};

/// Structural change notifications for the grid showing a [`Gallery`].
pub trait GridObserver {
    fn item_inserted(&mut self, _index: usize) {}
    fn item_changed(&mut self, _index: usize) {}
    fn item_removed(&mut self, _index: usize) {}
    fn item_range_removed(&mut self, _start: usize, _len: usize) {}
}

/// Observer that ignores everything.
impl GridObserver for () {}

/// Outcome of a batch file deletion.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub requested: usize,
    /// Files that are still on disk, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl DeleteReport {
    pub fn deleted(&self) -> usize {
        self.requested - self.failed.len()
    }

    pub fn not_deleted(&self) -> usize {
        self.failed.len()
    }

}

fn delete_file(path: &Path) -> std::result::Result<(), String> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            dbg_log!("deleted {}", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("delete: {}: {}", path.display(), e);
            Err(e.to_string())
        }
    }
}

/// Delete `paths` from disk, collecting every failure.
pub fn delete_files(paths: &[PathBuf]) -> DeleteReport {
    let mut report = DeleteReport {
        requested: paths.len(),
        failed: Vec::new(),
    };
    for path in paths {
        if let Err(e) = delete_file(path) {
            report.failed.push((path.clone(), e));
        }
    }
    report
}

pub struct Gallery<O: GridObserver = ()> {
    items: Vec<PathBuf>,
    selection: SelectionSet,
    observer: O,
}

impl Gallery<()> {
    pub fn new() -> Self {
        Self::with_observer(())
    }
}

impl Default for Gallery<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: GridObserver> Gallery<O> {
    pub fn with_observer(observer: O) -> Self {
        Gallery {
            items: Vec::new(),
            selection: SelectionSet::new(),
            observer,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PathBuf] {
        &self.items
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.items.get(index).map(|p| p.as_path())
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(Error::SelectionIndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        let index = self.items.len();
        self.items.push(path.into());
        self.observer.item_inserted(index);
    }

    pub fn insert(&mut self, index: usize, path: impl Into<PathBuf>) -> Result<()> {
        if index > self.items.len() {
            return Err(Error::SelectionIndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, path.into());
        self.selection.shift_inserted(index);
        self.observer.item_inserted(index);
        Ok(())
    }

    // ── selection ───────────────────────────────────────────────────────

    /// Flip selection of `index`; returns whether it is now selected.
    pub fn toggle_selection(&mut self, index: usize) -> Result<bool> {
        self.check(index)?;
        let on = self.selection.toggle(index);
        self.observer.item_changed(index);
        Ok(on)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.contains(index)
    }

    /// Selected indices, ascending.
    pub fn selected_items(&self) -> Vec<usize> {
        self.selection.indices()
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    pub fn selected_paths(&self) -> Result<Vec<PathBuf>> {
        self.selection
            .indices()
            .into_iter()
            .map(|i| -> Result<PathBuf> {
                self.check(i)?;
                Ok(self.items[i].clone())
            })
            .collect()
    }

    /// End the selection session; every formerly selected item is redrawn.
    pub fn clear_selection(&mut self) {
        for index in self.selection.clear() {
            self.observer.item_changed(index);
        }
    }

    // ── removal ─────────────────────────────────────────────────────────

    pub fn remove_item(&mut self, index: usize) -> Result<PathBuf> {
        self.check(index)?;
        let path = self.items.remove(index);
        self.selection.shift_removed(index);
        self.observer.item_removed(index);
        Ok(path)
    }

    /// Remove `indices` from the store using run compaction.
    ///
    /// Removed items leave the selection; the remaining selected indices
    /// are shifted to follow their items.
    pub fn remove_indices(&mut self, indices: &[usize]) -> Result<Vec<PathBuf>> {
        let runs = compute_removal_runs(indices, self.items.len())?;
        dbg_log!("removing {} items in {} runs", indices.len(), runs.len());
        let removed = apply_runs(&mut self.items, &runs);
        self.selection.shift_removed_runs(&runs);
        for run in &runs {
            self.notify_removed(run);
        }
        Ok(removed)
    }

    fn notify_removed(&mut self, run: &RemovalRun) {
        if run.len == 1 {
            self.observer.item_removed(run.head);
        } else {
            self.observer.item_range_removed(run.first(), run.len);
        }
    }

    /// Delete the selected files from disk, drop the ones actually deleted
    /// from the store, and end the selection session.
    ///
    /// Files that could not be deleted stay in the store and are counted in
    /// the report. A selected index outside the store fails the call before
    /// any file is touched.
    pub fn delete_selected(&mut self) -> Result<DeleteReport> {
        let selected = self.selection.indices();
        compute_removal_runs(&selected, self.items.len())?;

        let mut report = DeleteReport {
            requested: selected.len(),
            failed: Vec::new(),
        };
        let mut gone = Vec::with_capacity(selected.len());
        for i in selected {
            let path = &self.items[i];
            match delete_file(path) {
                Ok(()) => gone.push(i),
                Err(e) => report.failed.push((path.clone(), e)),
            }
        }
        self.remove_indices(&gone)?;
        self.clear_selection();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Recorder {
        events: Vec<String>,
    }

    impl GridObserver for Recorder {
        fn item_inserted(&mut self, index: usize) {
            self.events.push(format!("insert {}", index));
        }
        fn item_changed(&mut self, index: usize) {
            self.events.push(format!("change {}", index));
        }
        fn item_removed(&mut self, index: usize) {
            self.events.push(format!("remove {}", index));
        }
        fn item_range_removed(&mut self, start: usize, len: usize) {
            self.events.push(format!("remove {}+{}", start, len));
        }
    }

    fn gallery(n: usize) -> Gallery<Recorder> {
        let mut g = Gallery::with_observer(Recorder::default());
        for i in 0..n {
            g.push(format!("{}.jpg", i));
        }
        g.observer.events.clear();
        g
    }

    fn names(g: &Gallery<Recorder>) -> Vec<String> {
        g.items()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn toggle_notifies_and_validates() {
        let mut g = gallery(3);
        assert!(g.toggle_selection(1).unwrap());
        assert!(g.is_selected(1));
        assert!(!g.toggle_selection(1).unwrap());
        assert_eq!(g.observer().events, vec!["change 1", "change 1"]);
        assert!(matches!(
            g.toggle_selection(3),
            Err(Error::SelectionIndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn clear_invalidates_each_selected_item() {
        let mut g = gallery(10);
        for i in [1, 5, 9] {
            g.toggle_selection(i).unwrap();
        }
        g.observer.events.clear();
        g.clear_selection();
        assert_eq!(g.observer().events, vec!["change 1", "change 5", "change 9"]);
        assert_eq!(g.selected_count(), 0);
    }

    #[test]
    fn remove_indices_notifies_per_run() {
        let mut g = gallery(10);
        let removed = g.remove_indices(&[2, 3, 4, 7]).unwrap();
        assert_eq!(g.observer().events, vec!["remove 7", "remove 2+3"]);
        assert_eq!(
            names(&g),
            vec!["0.jpg", "1.jpg", "5.jpg", "6.jpg", "8.jpg", "9.jpg"]
        );
        assert_eq!(removed.len(), 4);
        assert_eq!(removed[0], PathBuf::from("2.jpg"));
    }

    #[test]
    fn remove_out_of_range_leaves_store_intact() {
        let mut g = gallery(3);
        assert!(g.remove_indices(&[0, 5]).is_err());
        assert_eq!(g.len(), 3);
        assert!(g.observer().events.is_empty());
    }

    #[test]
    fn insert_at_position() {
        let mut g = gallery(2);
        g.insert(1, "x.jpg").unwrap();
        assert_eq!(names(&g), vec!["0.jpg", "x.jpg", "1.jpg"]);
        assert!(g.insert(9, "y.jpg").is_err());
        assert_eq!(g.observer().events, vec!["insert 1"]);
    }

    #[test]
    fn delete_selected_removes_files_and_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = Gallery::with_observer(Recorder::default());
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            let p = dir.path().join(name);
            std::fs::write(&p, b"img").unwrap();
            g.push(p);
        }
        g.toggle_selection(1).unwrap();
        g.toggle_selection(2).unwrap();

        let report = g.delete_selected().unwrap();
        assert_eq!((report.requested, report.deleted(), report.not_deleted()), (2, 2, 0));
        assert!(!dir.path().join("b.jpg").exists());
        assert!(!dir.path().join("c.jpg").exists());
        assert_eq!(g.len(), 2);
        assert_eq!(g.selected_count(), 0);
        assert!(g.observer().events.contains(&"remove 1+2".to_string()));
    }

    #[test]
    fn delete_selected_reports_files_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = Gallery::new();
        let present = dir.path().join("here.jpg");
        std::fs::write(&present, b"img").unwrap();
        g.push(&present);
        g.push(dir.path().join("already-gone.jpg"));
        g.toggle_selection(0).unwrap();
        g.toggle_selection(1).unwrap();

        let report = g.delete_selected().unwrap();
        assert_eq!(report.requested, 2);
        assert_eq!(report.not_deleted(), 1);
        assert_eq!(report.failed[0].0, dir.path().join("already-gone.jpg"));
        // the file that survived stays in the grid
        assert_eq!(g.items(), &[dir.path().join("already-gone.jpg")]);
        assert_eq!(g.selected_count(), 0);
    }

    #[test]
    fn selection_follows_removed_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = Gallery::new();
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            let p = dir.path().join(name);
            std::fs::write(&p, b"img").unwrap();
            g.push(p);
        }
        g.toggle_selection(2).unwrap();
        g.remove_item(0).unwrap();
        assert!(g.is_selected(1));
        assert_eq!(g.selected_paths().unwrap(), vec![dir.path().join("c.jpg")]);

        let report = g.delete_selected().unwrap();
        assert_eq!((report.requested, report.deleted()), (1, 1));
        assert!(!dir.path().join("c.jpg").exists());
        assert!(dir.path().join("d.jpg").exists());
    }

    #[test]
    fn selection_follows_inserted_and_batch_removed_items() {
        let mut g = gallery(6);
        g.toggle_selection(3).unwrap();
        g.toggle_selection(5).unwrap();
        g.insert(0, "x.jpg").unwrap();
        assert_eq!(g.selected_items(), vec![4, 6]);

        // removing a selected item drops it from the selection
        g.remove_indices(&[1, 2, 6]).unwrap();
        assert_eq!(g.selected_items(), vec![2]);
        assert_eq!(g.path(2), Some(Path::new("3.jpg")));
    }

    #[test]
    fn stale_selection_fails_before_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = Gallery::new();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            let p = dir.path().join(name);
            std::fs::write(&p, b"img").unwrap();
            g.push(p);
        }
        g.toggle_selection(0).unwrap();
        g.selection.toggle(5);

        assert!(matches!(
            g.delete_selected(),
            Err(Error::SelectionIndexOutOfRange { index: 5, len: 3 })
        ));
        assert!(g.selected_paths().is_err());
        assert!(dir.path().join("a.jpg").exists());
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn duplicate_paths_are_resolved_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("twice.jpg");
        std::fs::write(&p, b"img").unwrap();
        let mut g = Gallery::new();
        g.push(&p);
        g.push(&p);
        g.toggle_selection(0).unwrap();
        g.toggle_selection(1).unwrap();

        // first entry deletes the file, second finds it gone
        let report = g.delete_selected().unwrap();
        assert_eq!((report.deleted(), report.not_deleted()), (1, 1));
        assert_eq!(g.len(), 1);
        assert_eq!(g.selected_count(), 0);
    }

    #[test]
    fn delete_with_empty_selection() {
        let mut g = gallery(3);
        let report = g.delete_selected().unwrap();
        assert_eq!(report.requested, 0);
        assert_eq!(g.len(), 3);
    }
}
