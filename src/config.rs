/// Grid and loader settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridConfig {
    /// Edge of a square grid cell, in pixels.
    pub thumb_size: u32,
    pub columns: usize,
    /// Offscreen slots kept for reuse (two full rows by default).
    pub recycled_slots: usize,
    /// Multiplier on the cell area before an image counts as oversized.
    pub scale_factor: u32,
    /// Decode threads; `None` means one per CPU.
    pub workers: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            thumb_size: 120,
            columns: 4,
            recycled_slots: 16,
            scale_factor: 1,
            workers: None,
        }
    }
}

impl GridConfig {
    /// Slots needed to show `rows` visible rows plus the recycled pool.
    pub fn slot_count(&self, rows: usize) -> usize {
        (self.columns * rows + self.recycled_slots).max(1)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(0)
    }
}
