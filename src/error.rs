use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed face region {text:?}: expected x, y, width and height attributes")]
    MalformedRegion { text: String },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("external decoder `{program}` failed on {} ({status}): {stderr}", .path.display())]
    DecoderProcess {
        path: PathBuf,
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("face region lies outside of {} ({width}x{height})", .path.display())]
    EmptyCrop {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid base32 symbol {0:?}")]
    InvalidToken(char),

    #[error("invalid decimal digit {0:?}")]
    InvalidDigit(char),

    #[error("faces list not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("run aborted after an earlier decode failure")]
    Aborted,
}

impl Error {
    pub(crate) fn fs(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// Decode failures stop the whole run: a broken decoder toolchain fails
    /// every following job the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::DecoderProcess { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_fatal() {
        let err = Error::DecoderProcess {
            path: PathBuf::from("/photos/a.jxl"),
            program: "djxl".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "bad header".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/photos/a.jxl"));
    }

    #[test]
    fn test_filesystem_errors_are_not_fatal() {
        let err = Error::fs(
            "failed to create directory",
            "/out/Alice",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_fatal());
        assert!(!Error::Aborted.is_fatal());
    }
}
