//! Image decoding, including formats handled by external command line tools.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Produces an RGB8 pixel buffer for a source image.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RgbImage>;
}

/// External decoder invoked as `<program> <args..> <input> <output.png>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDecoder {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExternalDecoder {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Run the decoder into a temporary PNG and load it back.
    pub fn decode(&self, path: &Path) -> Result<RgbImage> {
        let input = std::fs::canonicalize(path).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?;

        let tmp = tempfile::Builder::new()
            .prefix("png_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::fs("failed to create temporary file for", path, e))?;

        debug!("Running {} on {:?}", self.program, input);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&input)
            .arg(tmp.path())
            .output()
            .map_err(|e| Error::DecoderProcess {
                path: path.to_path_buf(),
                program: self.program.clone(),
                status: "failed to start".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::DecoderProcess {
                path: path.to_path_buf(),
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bytes = std::fs::read(tmp.path())
            .map_err(|e| Error::fs("failed to read decoder output for", path, e))?;

        let img = image::load_from_memory(&bytes).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(img.to_rgb8())
    }
}

/// Decoders used when the configuration does not list any.
pub fn default_external_decoders() -> HashMap<String, ExternalDecoder> {
    HashMap::from([
        ("jxl".to_string(), ExternalDecoder::new("djxl", &[])),
        (
            "avif".to_string(),
            ExternalDecoder::new("avifdec", &["-d", "8", "--png-compress", "0"]),
        ),
    ])
}

/// Dispatches on file extension: listed extensions go through their external
/// decoder, everything else through the `image` crate.
pub struct ImageLoader {
    external: HashMap<String, ExternalDecoder>,
}

impl ImageLoader {
    pub fn new(external: &HashMap<String, ExternalDecoder>) -> Self {
        Self {
            external: external
                .iter()
                .map(|(ext, decoder)| (ext.to_lowercase(), decoder.clone()))
                .collect(),
        }
    }

    /// External decoder for `path`, if its extension has one.
    pub fn external_for(&self, path: &Path) -> Option<&ExternalDecoder> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        self.external.get(&ext)
    }
}

impl ImageDecoder for ImageLoader {
    fn decode(&self, path: &Path) -> Result<RgbImage> {
        if let Some(decoder) = self.external_for(path) {
            return decoder.decode(path);
        }

        let img = image::open(path).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(img.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn test_external_dispatch_is_case_insensitive() {
        let loader = ImageLoader::new(&default_external_decoders());
        assert_eq!(loader.external_for(Path::new("/a/b.JXL")).unwrap().program, "djxl");
        assert_eq!(loader.external_for(Path::new("c.avif")).unwrap().program, "avifdec");
        assert!(loader.external_for(Path::new("d.jpg")).is_none());
        assert!(loader.external_for(Path::new("noext")).is_none());
    }

    #[test]
    fn test_native_decode_normalizes_to_rgb() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbaImage::from_pixel(8, 6, image::Rgba([10, 20, 30, 128]))
            .save(&path)
            .unwrap();

        let img = ImageLoader::new(&HashMap::new()).decode(&path).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_native_decode_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        let err = ImageLoader::new(&HashMap::new()).decode(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_external_decoder_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.xyz");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let decoders = HashMap::from([("XYZ".to_string(), ExternalDecoder::new("cp", &[]))]);
        let img = ImageLoader::new(&decoders).decode(&path).unwrap();
        assert_eq!(img.dimensions(), (4, 4));
    }

    #[cfg(unix)]
    #[test]
    fn test_external_decoder_nonzero_exit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jxl");
        std::fs::write(&path, b"jxl").unwrap();

        let err = ExternalDecoder::new("false", &[]).decode(&path).unwrap_err();
        assert!(matches!(err, Error::DecoderProcess { .. }));
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_external_decoder_unparsable_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jxl");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = ExternalDecoder::new("cp", &[]).decode(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
