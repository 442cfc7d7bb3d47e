//! CLI subcommand implementations.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};

use photogrid::selection::selection_title;
use photogrid::{
    compute_removal_runs, scanner, AsyncLoader, DecodedImage, Decoder, FileCodec, Gallery,
    GridConfig, ImageRequest, ImageSink, SlotId,
};

pub fn scan(dir: &Path, limit: usize, json: bool) {
    let paths = scanner::discover(dir, &FileCodec, limit);
    if json {
        let list: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        println!("{}", serde_json::json!({ "root": dir.display().to_string(), "images": list }));
        return;
    }
    for (i, p) in paths.iter().enumerate() {
        println!("{:5}  {}", i, p.display());
    }
    println!("{} images", paths.len());
}

pub fn probe(path: &Path, config: &GridConfig) -> Result<()> {
    let decoder = Decoder::for_files().with_scale_factor(config.scale_factor);
    let request = ImageRequest::square(path, config.thumb_size);

    let plan = decoder
        .plan(&request)
        .with_context(|| format!("probe {}", path.display()))?;
    println!("source:    {}x{}", plan.source.width, plan.source.height);
    println!(
        "target:    {}x{} (scale factor {})",
        config.thumb_size, config.thumb_size, config.scale_factor
    );
    println!("oversized: {}", plan.oversized);
    println!("sample:    1/{}", plan.sample);

    let img = decoder
        .decode(&request)
        .with_context(|| format!("decode {}", path.display()))?;
    println!("decoded:   {}x{}", img.width(), img.height());
    Ok(())
}

/// Grid cell that remembers the last image it was given.
#[derive(Default)]
struct Cell {
    shown: RefCell<Option<Arc<DecodedImage>>>,
}

impl ImageSink for Cell {
    fn show(&self, image: Arc<DecodedImage>) {
        *self.shown.borrow_mut() = Some(image);
    }

    fn show_placeholder(&self) {
        self.shown.borrow_mut().take();
    }
}

/// Feed every image under `dir` through a grid of recycled slots.
pub fn grid(dir: &Path, config: &GridConfig, rows: usize) -> Result<()> {
    let decoder = Decoder::for_files().with_scale_factor(config.scale_factor);
    let paths = scanner::discover(dir, decoder.codec().as_ref(), usize::MAX);
    if paths.is_empty() {
        println!("No images under {}", dir.display());
        return Ok(());
    }

    let mut loader =
        AsyncLoader::new(decoder, config.worker_count()).context("start decode workers")?;
    let slot_count = config.slot_count(rows).min(paths.len());
    let cells: Vec<Rc<Cell>> = (0..slot_count).map(|_| Rc::new(Cell::default())).collect();
    let slots: Vec<SlotId> = cells
        .iter()
        .map(|c| {
            let sink: Rc<dyn ImageSink> = c.clone();
            loader.attach(&sink)
        })
        .collect();

    // scrolling to the end: item i is bound to slot i % slot_count
    for (i, path) in paths.iter().enumerate() {
        loader.load(slots[i % slot_count], ImageRequest::square(path, config.thumb_size));
        loader.pump();
    }
    loader.drain();

    let stats = loader.stats();
    println!(
        "{} images, {} slots: {} applied, {} superseded, {} failed",
        paths.len(),
        slot_count,
        stats.applied,
        stats.superseded,
        stats.failed
    );
    for (k, cell) in cells.iter().enumerate() {
        // last item bound to slot k
        let last = paths.len() - 1 - (paths.len() - 1 - k) % slot_count;
        let name = paths[last]
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match cell.shown.borrow().as_ref() {
            Some(img) => println!(
                "  slot {:3}: {:<32} {}x{} (1/{})",
                k,
                name,
                img.width(),
                img.height(),
                img.sample
            ),
            None => println!("  slot {:3}: {:<32} placeholder", k, name),
        }
    }
    Ok(())
}

pub fn delete(dir: &Path, select: &[usize], dry_run: bool) -> Result<()> {
    let mut gallery = Gallery::new();
    for p in scanner::discover(dir, &FileCodec, usize::MAX) {
        gallery.push(p);
    }
    for &i in select {
        gallery
            .toggle_selection(i)
            .with_context(|| format!("select item {}", i))?;
    }
    if gallery.selected_count() == 0 {
        println!("no files selected");
        return Ok(());
    }
    println!("{}", selection_title(gallery.selected_count(), gallery.len()));

    let runs = compute_removal_runs(&gallery.selected_items(), gallery.len())?;
    for run in &runs {
        println!("  run {}..={} ({} items)", run.first(), run.head, run.len);
    }

    if dry_run {
        for p in gallery.selected_paths()? {
            println!("  would delete {}", p.display());
        }
        return Ok(());
    }

    let report = gallery.delete_selected()?;
    println!("{} files deleted", report.deleted());
    if report.not_deleted() > 0 {
        anyhow::bail!("{} files could not be deleted", report.not_deleted());
    }
    Ok(())
}
