use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::catalog::RegionQuery;
use crate::decode::{default_external_decoders, ExternalDecoder};
use crate::error::{Error, Result};
use crate::extract::ExtractOptions;

/// Environment variable naming a config file to use instead of the default.
pub const CONFIG_ENV: &str = "DKFACES_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to `digikam4.db`.
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Mount point the album roots' paths are relative to.
    #[serde(default = "default_mount")]
    pub mount: PathBuf,

    /// Album root label to extract from.
    #[serde(default)]
    pub root: Option<String>,

    /// Minimum number of regions a face tag needs to be extracted.
    #[serde(default)]
    pub min_count: u32,

    /// Name folders `{parent}∕{tag}`.
    #[serde(default)]
    pub append_parent: bool,

    /// Side length crops are resized to; 0 disables resizing.
    #[serde(default)]
    pub resize: u32,

    #[serde(default)]
    pub overwrite: bool,

    #[serde(default = "default_faces_list")]
    pub faces_list: PathBuf,

    /// Worker threads; 0 uses one per CPU.
    #[serde(default)]
    pub workers: usize,

    /// Directory for a daily rolling log file, in addition to stderr.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// External decoders keyed by file extension.
    #[serde(default = "default_external_decoders")]
    pub decoders: HashMap<String, ExternalDecoder>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Faces")
}

fn default_mount() -> PathBuf {
    PathBuf::from("/")
}

fn default_faces_list() -> PathBuf {
    PathBuf::from("./faces.txt")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            output_dir: default_output_dir(),
            mount: default_mount(),
            root: None,
            min_count: 0,
            append_parent: false,
            resize: 0,
            overwrite: false,
            faces_list: default_faces_list(),
            workers: 0,
            log_dir: None,
            decoders: default_external_decoders(),
        }
    }
}

impl Config {
    /// Load from `$DKFACES_CONFIG` or the default location; defaults when
    /// neither exists.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dkfaces")
            .join("config.toml")
    }

    /// Check everything needed before a run starts.
    pub fn validate(&self) -> Result<()> {
        match self.root.as_deref() {
            Some(root) if !root.is_empty() => {}
            _ => return Err(Error::Config("album root label is required (--root)".into())),
        }

        match &self.database {
            Some(db) if db.is_file() => Ok(()),
            Some(db) => Err(Error::Config(format!(
                "database not readable: {}",
                db.display()
            ))),
            None => Err(Error::Config("database path is required (--db)".into())),
        }
    }

    pub fn mount_path(&self) -> PathBuf {
        expand_home(&self.mount)
    }

    pub fn region_query(&self) -> RegionQuery {
        RegionQuery {
            scope: self.root.clone().unwrap_or_default(),
            min_count: self.min_count,
            compose_parent: self.append_parent,
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            output_root: self.output_dir.clone(),
            resize: self.resize,
            overwrite: self.overwrite,
            workers: self.workers,
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("Faces"));
        assert_eq!(config.mount, PathBuf::from("/"));
        assert_eq!(config.faces_list, PathBuf::from("./faces.txt"));
        assert_eq!(config.min_count, 0);
        assert_eq!(config.decoders["jxl"].program, "djxl");
        assert_eq!(
            config.decoders["avif"].args,
            vec!["-d", "8", "--png-compress", "0"]
        );
    }

    #[test]
    fn test_parse_overrides() {
        let config = Config::parse(
            r#"
            database = "/data/digikam4.db"
            root = "Photos"
            min_count = 5
            append_parent = true
            resize = 160

            [decoders.heic]
            program = "heif-convert"
            "#,
        )
        .unwrap();

        assert_eq!(config.root.as_deref(), Some("Photos"));
        assert_eq!(config.resize, 160);
        assert_eq!(config.decoders.len(), 1);
        assert!(config.decoders["heic"].args.is_empty());

        let query = config.region_query();
        assert_eq!(query.scope, "Photos");
        assert_eq!(query.min_count, 5);
        assert!(query.compose_parent);
    }

    #[test]
    fn test_validate() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("digikam4.db");

        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.root = Some("Photos".to_string());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.database = Some(db.clone());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        std::fs::write(&db, b"").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/mnt")), PathBuf::from("/mnt"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/photos")), home.join("photos"));
        }
    }
}
