use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use dkfaces::{logging, Catalog, Config, Extractor, ImageLoader, Manifest};

#[derive(Parser)]
#[command(
    name = "dkfaces",
    version,
    about = "Extract tagged face regions from a digiKam database",
    after_help = "ENVIRONMENT:\n    DKFACES_CONFIG      Path to config file\n    DKFACES_LOG         Log filter (trace, debug, info, warn, error)\n\nSee also: dkfaces-cleanup --help"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to digikam4.db
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory face folders are written to [default: Faces]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to album mountpoint [default: /]
    #[arg(short, long)]
    mount: Option<PathBuf>,

    /// Album root label
    #[arg(long)]
    root: Option<String>,

    /// Minimal amount of assigned faces for a face tag to be extracted
    #[arg(long)]
    min: Option<u32>,

    /// Append parent name of face tag to output dir name
    #[arg(short, long)]
    append_parent: bool,

    /// Resize extracted face regions to this size
    #[arg(long)]
    resize: Option<u32>,

    /// Re-extract existing face regions
    #[arg(long)]
    overwrite: bool,

    /// File listing every extracted face [default: ./faces.txt]
    #[arg(long)]
    faces_list: Option<PathBuf>,

    /// Number of worker threads [default: number of CPUs]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(db) = self.db {
            config.database = Some(db);
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(mount) = self.mount {
            config.mount = mount;
        }
        if let Some(root) = self.root {
            config.root = Some(root);
        }
        if let Some(min) = self.min {
            config.min_count = min;
        }
        if let Some(size) = self.resize {
            config.resize = size;
        }
        if let Some(list) = self.faces_list {
            config.faces_list = list;
        }
        if let Some(jobs) = self.jobs {
            config.workers = jobs;
        }
        config.append_parent |= self.append_parent;
        config.overwrite |= self.overwrite;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let verbose = cli.verbose;
    cli.apply(&mut config);

    logging::init(config.log_dir.as_deref(), verbose)?;
    config.validate()?;

    let database = config.database.clone().unwrap_or_default();
    let catalog = Catalog::open(&database)
        .with_context(|| format!("Failed to open {}", database.display()))?;
    let scan = catalog.fetch_jobs(&config.region_query(), &config.mount_path())?;
    info!(
        "Found {} face regions ({} malformed skipped)",
        scan.jobs.len(),
        scan.malformed
    );

    let loader = ImageLoader::new(&config.decoders);
    let report = Extractor::new(config.extract_options(), &loader).run(&scan.jobs)?;

    // Record what was produced before reporting failures, so a failed run
    // never loses entries for crops already on disk.
    let mut manifest = Manifest::load(&config.faces_list)?;
    let added = manifest.merge(report.paths());
    manifest
        .save(&config.faces_list)
        .with_context(|| format!("Failed to write {}", config.faces_list.display()))?;
    info!(
        "{} faces listed in {} ({} new)",
        manifest.len(),
        config.faces_list.display(),
        added
    );

    for failure in &report.failures {
        error!("{}: {}", failure.job.image_path.display(), failure.error);
    }

    if let Some(fatal) = report.fatal() {
        bail!("{}\n{}", fatal.job.image_path.display(), fatal.error);
    }
    if !report.failures.is_empty() {
        bail!("{} face regions could not be extracted", report.failures.len());
    }

    Ok(())
}
