//! Parallel extraction of face crops.
//!
//! Each job is independent: create `output_root/<label>`, skip if the crop
//! already exists (unless overwriting), otherwise decode, crop, resize and
//! write a PNG. Jobs run on a rayon pool; every job is joined before the
//! report is returned, so callers always see the paths that were produced
//! even when the run failed.

use image::ImageFormat;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

use crate::catalog::FaceJob;
use crate::decode::ImageDecoder;
use crate::error::{Error, Result};
use crate::geometry::{compute_box, crop_face};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub output_root: PathBuf,
    /// Side length of the written crops; 0 keeps the cropped size.
    pub resize: u32,
    pub overwrite: bool,
    /// Worker threads; 0 uses one per CPU.
    pub workers: usize,
}

/// What happened to a job that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    SkippedExisting(PathBuf),
    Extracted(PathBuf),
}

impl JobOutcome {
    pub fn path(&self) -> &Path {
        match self {
            JobOutcome::SkippedExisting(path) | JobOutcome::Extracted(path) => path,
        }
    }
}

#[derive(Debug)]
pub struct JobFailure {
    pub job: FaceJob,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
    pub failures: Vec<JobFailure>,
    /// Jobs not started because a decode failure stopped the run.
    pub aborted: usize,
}

impl RunReport {
    /// Every output path reported by the run, extracted or pre-existing.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().map(JobOutcome::path)
    }

    pub fn extracted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, JobOutcome::Extracted(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.extracted()
    }

    /// The first fatal failure in job order. With several workers this is not
    /// necessarily the first one a worker ran into.
    pub fn fatal(&self) -> Option<&JobFailure> {
        self.failures.iter().find(|f| f.error.is_fatal())
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.aborted == 0
    }
}

/// Crop file name: `<source stem>-<region token>.png`.
pub fn output_file_name(job: &FaceJob) -> String {
    let stem = job
        .image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}-{}.png", stem, job.region.token())
}

pub fn output_path(output_root: &Path, job: &FaceJob) -> PathBuf {
    output_root.join(&job.label).join(output_file_name(job))
}

pub struct Extractor<'a, D: ImageDecoder + ?Sized> {
    options: ExtractOptions,
    decoder: &'a D,
}

impl<'a, D: ImageDecoder + ?Sized> Extractor<'a, D> {
    pub fn new(options: ExtractOptions, decoder: &'a D) -> Self {
        Self { options, decoder }
    }

    /// Run all jobs and collect their outcomes.
    pub fn run(&self, jobs: &[FaceJob]) -> Result<RunReport> {
        std::fs::create_dir_all(&self.options.output_root).map_err(|e| {
            Error::fs("failed to create directory", &self.options.output_root, e)
        })?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .map_err(|e| Error::Config(format!("failed to start worker pool: {e}")))?;

        let abort = AtomicBool::new(false);
        let results: Vec<Result<JobOutcome>> = pool.install(|| {
            jobs.par_iter()
                .map(|job| self.extract_job(job, &abort))
                .collect()
        });

        let mut report = RunReport::default();
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(Error::Aborted) => report.aborted += 1,
                Err(error) => report.failures.push(JobFailure {
                    job: job.clone(),
                    error,
                }),
            }
        }

        info!(
            "Extraction finished: {} extracted, {} existing, {} failed, {} aborted",
            report.extracted(),
            report.skipped(),
            report.failures.len(),
            report.aborted
        );
        Ok(report)
    }

    fn extract_job(&self, job: &FaceJob, abort: &AtomicBool) -> Result<JobOutcome> {
        let dir = self.options.output_root.join(&job.label);
        // create_dir_all treats a directory created concurrently as success
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::fs("failed to create directory", &dir, e))?;

        let out = dir.join(output_file_name(job));
        if !self.options.overwrite && out.exists() {
            debug!("Already extracted: {}", out.display());
            return Ok(JobOutcome::SkippedExisting(out));
        }

        if abort.load(Ordering::Relaxed) {
            return Err(Error::Aborted);
        }

        info!("Extracting: {}", job.image_path.display());
        let img = match self.decoder.decode(&job.image_path) {
            Ok(img) => img,
            Err(e) => {
                if e.is_fatal() {
                    abort.store(true, Ordering::Relaxed);
                    error!("{}", e);
                }
                return Err(e);
            }
        };

        let (width, height) = img.dimensions();
        let bounds = compute_box(&job.region, width, height);
        if bounds.is_empty() {
            return Err(Error::EmptyCrop {
                path: job.image_path.clone(),
                width,
                height,
            });
        }

        let face = crop_face(&img, bounds, self.options.resize);
        face.save_with_format(&out, ImageFormat::Png)
            .map_err(|source| Error::Encode {
                path: out.clone(),
                source,
            })?;

        Ok(JobOutcome::Extracted(out))
    }
}
