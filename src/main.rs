// photogrid: scan a directory and push it through the bounded-memory grid loader.
// Usage: photogrid [-d] <scan|probe|grid|delete> ...

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

mod cli;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use photogrid::GridConfig;

#[derive(Parser, Debug)]
#[command(name = "photogrid", about = "Thumbnail grid loader", version = VERSION)]
struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List decodable images under a directory
    Scan {
        dir: PathBuf,
        #[arg(long, default_value_t = usize::MAX)]
        limit: usize,
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the decode plan for one image and decode it
    Probe {
        file: PathBuf,
        #[arg(long, default_value_t = 120)]
        size: u32,
        #[arg(long, default_value_t = 1)]
        scale_factor: u32,
    },
    /// Load a directory through a grid of recycled slots
    Grid {
        dir: PathBuf,
        #[arg(long, default_value_t = 120)]
        size: u32,
        #[arg(long, default_value_t = 4)]
        columns: usize,
        /// Visible rows
        #[arg(long, default_value_t = 5)]
        rows: usize,
        /// Offscreen slots kept for reuse
        #[arg(long, default_value_t = 16)]
        recycled: usize,
        /// Decode threads (default: one per CPU)
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long, default_value_t = 1)]
        scale_factor: u32,
    },
    /// Delete the selected images (indices as listed by `scan`)
    Delete {
        dir: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        select: Vec<usize>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    if args.debug {
        photogrid::debug::enable();
    }

    match args.command {
        Commands::Scan { dir, limit, json } => cli::scan(&dir, limit, json),
        Commands::Probe {
            file,
            size,
            scale_factor,
        } => {
            let config = GridConfig {
                thumb_size: size,
                scale_factor,
                ..GridConfig::default()
            };
            cli::probe(&file, &config)?;
        }
        Commands::Grid {
            dir,
            size,
            columns,
            rows,
            recycled,
            workers,
            scale_factor,
        } => {
            let config = GridConfig {
                thumb_size: size,
                columns,
                recycled_slots: recycled,
                scale_factor,
                workers,
            };
            cli::grid(&dir, &config, rows)?;
        }
        Commands::Delete {
            dir,
            select,
            dry_run,
        } => cli::delete(&dir, &select, dry_run)?,
    }
    Ok(())
}
