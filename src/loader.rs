//! Background image loader.
//!
//! Flow:
//!   1. AsyncLoader::load(slot, request) → registry accepts or deduplicates
//!   2. accepted tasks decode on the rayon pool, off the calling thread
//!   3. workers send (task, result) back over a channel
//!   4. AsyncLoader::pump()/drain() on the coordinating thread hands each
//!      result to SlotRegistry::complete, which applies or discards it
//!
//! Worker threads only do CPU/IO work. Slots and consumers are touched only
//! from the thread that owns the loader.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::debug::dbg_log;
use crate::decoder::{DecodedImage, Decoder, ImageRequest};
use crate::error::{DecodeError, DecodeFailure, Result};
use crate::registry::{Completion, DiscardReason, ImageSink, PendingTask, SlotId, SlotRegistry};

struct Finished {
    task: PendingTask,
    result: std::result::Result<DecodedImage, DecodeError>,
}

/// Counters for everything the loader has resolved so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub submitted: u64,
    /// Same request already pending, or slot gone.
    pub rejected: u64,
    pub applied: u64,
    pub superseded: u64,
    pub detached: u64,
    pub failed: u64,
}

impl LoadStats {
    fn record(&mut self, completion: &Completion) {
        match completion {
            Completion::Applied => self.applied += 1,
            Completion::Discarded(DiscardReason::Superseded) => self.superseded += 1,
            Completion::Discarded(DiscardReason::Detached) => self.detached += 1,
            Completion::Discarded(DiscardReason::Failed(_)) => self.failed += 1,
        }
    }

    pub fn discarded(&self) -> u64 {
        self.superseded + self.detached + self.failed
    }
}

pub struct AsyncLoader {
    registry: SlotRegistry,
    decoder: Arc<Decoder>,
    pool: rayon::ThreadPool,
    done_tx: Sender<Finished>,
    done_rx: Receiver<Finished>,
    in_flight: usize,
    stats: LoadStats,
}

impl AsyncLoader {
    /// `workers == 0` picks one thread per available CPU.
    pub fn new(decoder: Decoder, workers: usize) -> Result<Self> {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            workers
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("decode-{}", i))
            .build()?;
        let (done_tx, done_rx) = unbounded();
        dbg_log!("loader: {} decode workers", workers);

        Ok(AsyncLoader {
            registry: SlotRegistry::new(),
            decoder: Arc::new(decoder),
            pool,
            done_tx,
            done_rx,
            in_flight: 0,
            stats: LoadStats::default(),
        })
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SlotRegistry {
        &mut self.registry
    }

    pub fn attach(&mut self, consumer: &Rc<dyn ImageSink>) -> SlotId {
        self.registry.attach(consumer)
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Decodes started whose result has not been resolved yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Start loading `request` into `slot`. Returns false if the registry
    /// rejected it (same request already pending, or slot gone).
    pub fn load(&mut self, slot: SlotId, request: ImageRequest) -> bool {
        let Some(task) = self.registry.submit(slot, request) else {
            self.stats.rejected += 1;
            return false;
        };
        self.stats.submitted += 1;
        self.in_flight += 1;

        let decoder = self.decoder.clone();
        let done_tx = self.done_tx.clone();
        self.pool.spawn(move || {
            let result = {
                let request = task.request();
                if task.is_cancelled() {
                    dbg_log!("{}: superseded before start", request.path().display());
                }
                // a panicking codec must still produce a completion
                panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(request))).unwrap_or_else(
                    |_| {
                        Err(DecodeError::new(
                            DecodeFailure::Corrupt,
                            request.path(),
                            "decoder panicked",
                        ))
                    },
                )
            };
            // receiver only goes away with the loader itself
            let _ = done_tx.send(Finished { task, result });
        });
        true
    }

    fn resolve(&mut self, finished: Finished) -> (SlotId, Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let slot = finished.task.slot();
        let completion = self.registry.complete(finished.task, finished.result);
        self.stats.record(&completion);
        (slot, completion)
    }

    /// Resolve every result that has arrived, without blocking.
    pub fn pump(&mut self) -> Vec<(SlotId, Completion)> {
        let mut out = Vec::new();
        while let Ok(finished) = self.done_rx.try_recv() {
            out.push(self.resolve(finished));
        }
        out
    }

    /// Block for up to `timeout` for the next result.
    pub fn wait(&mut self, timeout: Duration) -> Option<(SlotId, Completion)> {
        if self.in_flight == 0 {
            return None;
        }
        match self.done_rx.recv_timeout(timeout) {
            Ok(finished) => Some(self.resolve(finished)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until every started decode has been resolved.
    ///
    /// A decode that never returns keeps this waiting; use [`wait`] with a
    /// timeout where that matters.
    ///
    /// [`wait`]: AsyncLoader::wait
    pub fn drain(&mut self) -> Vec<(SlotId, Completion)> {
        let mut out = Vec::new();
        while self.in_flight > 0 {
            match self.done_rx.recv() {
                Ok(finished) => out.push(self.resolve(finished)),
                Err(_) => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Codec, Dimensions};
    use crate::registry::tests::tile;
    use image::RgbaImage;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(10);

    /// Codec whose decodes block until their gate is opened.
    #[derive(Default)]
    struct GatedCodec {
        sizes: HashMap<PathBuf, u32>,
        gates: HashMap<PathBuf, Receiver<()>>,
        decodes: AtomicUsize,
    }

    impl GatedCodec {
        fn image(&mut self, path: &str, size: u32) {
            self.sizes.insert(PathBuf::from(path), size);
        }

        fn gated(&mut self, path: &str, size: u32) -> Sender<()> {
            let (tx, rx) = unbounded();
            self.image(path, size);
            self.gates.insert(PathBuf::from(path), rx);
            tx
        }
    }

    impl Codec for GatedCodec {
        fn probe(&self, path: &Path) -> std::result::Result<Dimensions, DecodeError> {
            let s = self.sizes[path];
            Ok(Dimensions::new(s, s))
        }

        fn decode(&self, path: &Path, _sample: u32) -> std::result::Result<RgbaImage, DecodeError> {
            if let Some(gate) = self.gates.get(path) {
                let _ = gate.recv();
            }
            self.decodes.fetch_add(1, Ordering::SeqCst);
            let s = self.sizes[path];
            Ok(RgbaImage::new(s, s))
        }
    }

    struct PanicCodec;

    impl Codec for PanicCodec {
        fn probe(&self, _path: &Path) -> std::result::Result<Dimensions, DecodeError> {
            Ok(Dimensions::new(4, 4))
        }

        fn decode(&self, _path: &Path, _sample: u32) -> std::result::Result<RgbaImage, DecodeError> {
            panic!("codec blew up");
        }
    }

    fn req(path: &str) -> ImageRequest {
        ImageRequest::square(path, 120)
    }

    #[test]
    fn late_stale_result_does_not_overwrite() {
        let mut codec = GatedCodec::default();
        let open_a = codec.gated("a.jpg", 10);
        let open_b = codec.gated("b.jpg", 20);
        let mut loader = AsyncLoader::new(Decoder::new(Arc::new(codec)), 2).unwrap();
        let (t, sink) = tile();
        let slot = loader.attach(&sink);

        assert!(loader.load(slot, req("a.jpg")));
        assert!(loader.load(slot, req("b.jpg")));
        assert_eq!(loader.in_flight(), 2);

        // b finishes first and is applied
        open_b.send(()).unwrap();
        let (s, done) = loader.wait(WAIT).expect("b completes");
        assert_eq!(s, slot);
        assert!(done.is_applied());
        assert_eq!(*t.shown.borrow(), vec![(20, 20)]);

        // a finishes afterwards and is dropped
        open_a.send(()).unwrap();
        let (_, done) = loader.wait(WAIT).expect("a completes");
        assert!(matches!(done, Completion::Discarded(DiscardReason::Superseded)));
        assert_eq!(*t.shown.borrow(), vec![(20, 20)]);

        assert_eq!(loader.in_flight(), 0);
        let stats = loader.stats();
        assert_eq!((stats.applied, stats.superseded), (1, 1));
    }

    #[test]
    fn early_stale_result_is_dropped_before_current_arrives() {
        let mut codec = GatedCodec::default();
        let open_a = codec.gated("a.jpg", 10);
        let open_b = codec.gated("b.jpg", 20);
        let mut loader = AsyncLoader::new(Decoder::new(Arc::new(codec)), 2).unwrap();
        let (t, sink) = tile();
        let slot = loader.attach(&sink);

        loader.load(slot, req("a.jpg"));
        loader.load(slot, req("b.jpg"));

        open_a.send(()).unwrap();
        let (_, done) = loader.wait(WAIT).expect("a completes");
        assert!(!done.is_applied());
        assert!(t.shown.borrow().is_empty());

        open_b.send(()).unwrap();
        loader.drain();
        assert_eq!(*t.shown.borrow(), vec![(20, 20)]);
    }

    #[test]
    fn duplicate_load_schedules_one_decode() {
        let mut codec = GatedCodec::default();
        let open_a = codec.gated("a.jpg", 10);
        let codec = Arc::new(codec);
        let mut loader = AsyncLoader::new(Decoder::new(codec.clone()), 2).unwrap();
        let (t, sink) = tile();
        let slot = loader.attach(&sink);

        assert!(loader.load(slot, req("a.jpg")));
        assert!(!loader.load(slot, req("a.jpg")));
        assert_eq!(loader.in_flight(), 1);

        open_a.send(()).unwrap();
        loader.drain();
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(t.shown.borrow().len(), 1);
        assert_eq!(loader.stats().rejected, 1);
    }

    #[test]
    fn panicking_codec_still_completes() {
        let mut loader = AsyncLoader::new(Decoder::new(Arc::new(PanicCodec)), 1).unwrap();
        let (t, sink) = tile();
        let slot = loader.attach(&sink);

        assert!(loader.load(slot, req("boom.png")));
        let done = loader.drain();
        assert_eq!(done.len(), 1);
        match &done[0].1 {
            Completion::Discarded(DiscardReason::Failed(e)) => {
                assert_eq!(e.kind, DecodeFailure::Corrupt)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(t.shown.borrow().is_empty());
        assert!(!loader.registry().is_pending(slot));
    }

    #[test]
    fn recycled_grid_shows_last_binding_per_slot() {
        let mut codec = GatedCodec::default();
        for i in 0..12 {
            codec.image(&format!("{}.png", i), 10 + i);
        }
        let mut loader = AsyncLoader::new(Decoder::new(Arc::new(codec)), 3).unwrap();
        let tiles: Vec<_> = (0..4).map(|_| tile()).collect();
        let slots: Vec<SlotId> = tiles.iter().map(|(_, s)| loader.attach(s)).collect();

        // scrolling: item i lands in slot i % 4
        for i in 0..12u32 {
            loader.load(slots[i as usize % 4], req(&format!("{}.png", i)));
        }
        loader.drain();

        // every slot moved on before any result was resolved: only the
        // last binding of each slot may reach its tile
        for (k, (t, _)) in tiles.iter().enumerate() {
            let last = 10 + 8 + k as u32;
            assert_eq!(*t.shown.borrow(), vec![(last, last)]);
        }
        let stats = loader.stats();
        assert_eq!(stats.submitted, 12);
        assert_eq!(stats.applied + stats.discarded(), 12);
        assert_eq!(stats.applied, 4);
    }

    #[test]
    fn wait_without_work_returns_immediately() {
        let codec = GatedCodec::default();
        let mut loader = AsyncLoader::new(Decoder::new(Arc::new(codec)), 1).unwrap();
        assert!(loader.wait(WAIT).is_none());
        assert!(loader.pump().is_empty());
    }
}
