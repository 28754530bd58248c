//! Extract tagged face regions from a digiKam catalog.
//!
//! The pipeline reads face regions from the catalog ([`catalog`]), decodes
//! each source image ([`decode`]), cuts a padded square around the region
//! ([`geometry`]) and writes it as `<output>/<label>/<stem>-<token>.png`
//! ([`extract`], [`rect`]). Produced paths are recorded in the faces list
//! ([`manifest`]), which [`cleanup`] uses to delete stale crops.

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod logging;
pub mod manifest;
pub mod rect;

pub use catalog::{Catalog, FaceJob, RegionQuery, RegionScan};
pub use config::Config;
pub use decode::{ExternalDecoder, ImageDecoder, ImageLoader};
pub use error::{Error, Result};
pub use extract::{ExtractOptions, Extractor, JobOutcome, RunReport};
pub use manifest::Manifest;
pub use rect::Rect;
