//! Bounded-memory image grid loading.
//!
//! Images are probed, downsampled by a power-of-two factor and decoded on a
//! worker pool; results land in their display slot only while that slot is
//! still waiting for them. A multi-select store removes selected items in
//! contiguous runs.

pub mod config;
pub mod debug;
pub mod decoder;
pub mod error;
pub mod gallery;
pub mod loader;
pub mod registry;
pub mod sampler;
pub mod scale;
pub mod scanner;
pub mod selection;

pub use config::GridConfig;
pub use decoder::{Codec, DecodedImage, Decoder, Dimensions, FileCodec, ImageRequest};
pub use error::{DecodeError, DecodeFailure, Error, Result};
pub use gallery::{delete_files, DeleteReport, Gallery, GridObserver};
pub use loader::{AsyncLoader, LoadStats};
pub use registry::{Completion, DiscardReason, ImageSink, SlotId, SlotRegistry};
pub use sampler::compute_sample_factor;
pub use selection::{compute_removal_runs, RemovalRun, SelectionSet};
