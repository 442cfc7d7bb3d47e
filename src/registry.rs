//! Slot registry: which load request each display slot is waiting for.
//!
//! A slot is a reusable grid position. It holds at most one bound request,
//! identified by a generation ticket. Rebinding a slot flips the previous
//! task's cancel flag and moves the slot's identity on, so a late completion
//! of the old task no longer matches and is dropped.
//!
//! The registry lives on the coordinating thread. Consumers are held as
//! `rc::Weak` so a slot never keeps its display position alive, and tasks
//! hold only a `SlotId`, never the consumer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::debug::dbg_log;
use crate::decoder::{DecodedImage, ImageRequest};
use crate::error::{DecodeError, DecodeFailure};

/// Display consumer of a slot (a grid cell).
pub trait ImageSink {
    /// Show a decoded image.
    fn show(&self, image: Arc<DecodedImage>);

    /// Called when a new load is accepted for this slot.
    fn show_placeholder(&self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Generation token handed out per accepted submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

/// One accepted load. Moves to the worker and back with the result.
#[derive(Debug)]
pub struct PendingTask {
    slot: SlotId,
    ticket: Ticket,
    request: ImageRequest,
    cancelled: Arc<AtomicBool>,
}

impl PendingTask {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn request(&self) -> &ImageRequest {
        &self.request
    }

    /// Set once the slot has been rebound, recycled or detached.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct Binding {
    ticket: Ticket,
    path: PathBuf,
    cancelled: Arc<AtomicBool>,
}

impl Binding {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

struct LoadSlot {
    consumer: Weak<dyn ImageSink>,
    bound: Option<Binding>,
}

#[derive(Debug)]
pub enum DiscardReason {
    /// The slot has been bound to another request (or recycled) since.
    Superseded,
    /// The slot or its consumer is gone.
    Detached,
    /// Decode failed; the slot keeps its placeholder.
    Failed(DecodeError),
}

#[derive(Debug)]
pub enum Completion {
    Applied,
    Discarded(DiscardReason),
}

impl Completion {
    pub fn is_applied(&self) -> bool {
        matches!(self, Completion::Applied)
    }
}

#[derive(Default)]
pub struct SlotRegistry {
    slots: HashMap<SlotId, LoadSlot>,
    next_slot: u32,
    next_ticket: u64,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display position and return its slot id.
    pub fn attach(&mut self, consumer: &Rc<dyn ImageSink>) -> SlotId {
        let id = SlotId(self.next_slot);
        self.next_slot += 1;
        self.slots.insert(
            id,
            LoadSlot {
                consumer: Rc::downgrade(consumer),
                bound: None,
            },
        );
        id
    }

    /// Forget a slot. Its pending task, if any, is cancelled.
    pub fn detach(&mut self, slot: SlotId) -> bool {
        match self.slots.remove(&slot) {
            Some(s) => {
                if let Some(b) = &s.bound {
                    b.cancel();
                }
                dbg_log!("slot {}: detached", slot.0);
                true
            }
            None => false,
        }
    }

    /// Slot scrolled away: drop its binding but keep the slot.
    pub fn recycle(&mut self, slot: SlotId) {
        if let Some(b) = self.slots.get_mut(&slot).and_then(|s| s.bound.take()) {
            b.cancel();
            dbg_log!("slot {}: recycled, dropped {}", slot.0, b.path.display());
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Path the slot is currently waiting for.
    pub fn current(&self, slot: SlotId) -> Option<&Path> {
        self.slots
            .get(&slot)
            .and_then(|s| s.bound.as_ref())
            .map(|b| b.path.as_path())
    }

    pub fn is_pending(&self, slot: SlotId) -> bool {
        self.current(slot).is_some()
    }

    /// Bind `request` to `slot`.
    ///
    /// Returns `None` when the same path is already pending for the slot
    /// (no new work should start), or when the slot is unknown or its
    /// consumer is gone. Otherwise any previous binding is cancelled and the
    /// new task is returned for scheduling.
    pub fn submit(&mut self, slot: SlotId, request: ImageRequest) -> Option<PendingTask> {
        let Some(entry) = self.slots.get_mut(&slot) else {
            dbg_log!("slot {}: submit to unknown slot", slot.0);
            return None;
        };
        let Some(consumer) = entry.consumer.upgrade() else {
            dbg_log!("slot {}: consumer gone, detaching", slot.0);
            self.slots.remove(&slot);
            return None;
        };

        if let Some(prev) = &entry.bound {
            if prev.path == request.path() {
                dbg_log!("slot {}: {} already pending", slot.0, prev.path.display());
                return None;
            }
            prev.cancel();
            dbg_log!(
                "slot {}: {} superseded by {}",
                slot.0,
                prev.path.display(),
                request.path().display()
            );
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        entry.bound = Some(Binding {
            ticket,
            path: request.path().to_path_buf(),
            cancelled: cancelled.clone(),
        });
        consumer.show_placeholder();

        Some(PendingTask {
            slot,
            ticket,
            request,
            cancelled,
        })
    }

    /// Deliver a finished task. The image reaches the consumer only if the
    /// slot still exists, its consumer is alive, and it is still bound to
    /// this task's ticket. Anything else is discarded.
    pub fn complete(
        &mut self,
        task: PendingTask,
        result: Result<DecodedImage, DecodeError>,
    ) -> Completion {
        let slot = task.slot;
        let path = task.request.path();

        let Some(entry) = self.slots.get_mut(&slot) else {
            dbg_log!("slot {}: gone, discarding {}", slot.0, path.display());
            return Completion::Discarded(DiscardReason::Detached);
        };
        let Some(consumer) = entry.consumer.upgrade() else {
            dbg_log!("slot {}: consumer dropped, discarding {}", slot.0, path.display());
            self.slots.remove(&slot);
            return Completion::Discarded(DiscardReason::Detached);
        };
        if entry.bound.as_ref().map(|b| b.ticket) != Some(task.ticket) {
            dbg_log!("slot {}: stale {}, discarding", slot.0, path.display());
            return Completion::Discarded(DiscardReason::Superseded);
        }

        // this task is the slot's current one: either outcome resolves it
        entry.bound = None;
        match result {
            Ok(img) if img.width() > 0 && img.height() > 0 => {
                dbg_log!(
                    "slot {}: applied {} ({}x{})",
                    slot.0,
                    path.display(),
                    img.width(),
                    img.height()
                );
                consumer.show(Arc::new(img));
                Completion::Applied
            }
            Ok(_) => Completion::Discarded(DiscardReason::Failed(DecodeError::new(
                DecodeFailure::Empty,
                path,
                "decode produced no pixels",
            ))),
            Err(e) => {
                dbg_log!("slot {}: {}", slot.0, e);
                Completion::Discarded(DiscardReason::Failed(e))
            }
        }
    }
}
