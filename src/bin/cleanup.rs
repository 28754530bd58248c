//! Remove face crops that are no longer listed in the faces list.
//!
//! ## Usage
//!
//! ```bash
//! dkfaces --db digikam4.db --root Photos    # writes ./faces.txt
//! dkfaces-cleanup --dry-run                 # show what would be removed
//! dkfaces-cleanup                           # remove stale crops
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use dkfaces::{cleanup, logging, Manifest};

#[derive(Parser)]
#[command(
    name = "dkfaces-cleanup",
    version,
    about = "Remove all files from the output directory not present in the faces list"
)]
struct Cli {
    #[arg(short, long, default_value = "Faces")]
    output_dir: PathBuf,

    #[arg(long, default_value = "./faces.txt")]
    faces_list: PathBuf,

    /// Only print the files that would be removed
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(None, cli.verbose)?;

    let manifest = Manifest::load_existing(&cli.faces_list)?;
    let result = cleanup::remove_orphans(&cli.output_dir, &manifest, cli.dry_run)?;

    for path in &result.orphans {
        println!("NOT {}", path.display());
    }

    if cli.dry_run {
        println!("{} files would be removed", result.orphans.len());
    } else {
        println!(
            "Removed {} files ({} bytes)",
            result.files_deleted, result.bytes_freed
        );
    }

    Ok(())
}
