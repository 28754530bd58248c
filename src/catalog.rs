//! Read-only access to a digiKam catalog (`digikam4.db`).
//!
//! Face regions live in `ImageTagProperties` rows with the `tagRegion`
//! property, whose value is a fragment like
//! `<rect x="10" y="20" width="30" height="40"/>`. Each row is joined back to
//! its tag, optional parent tag, image, album and album root to produce one
//! [`FaceJob`].

use regex::Regex;
use rusqlite::{named_params, Connection, OpenFlags, Params, Row, Statement};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::rect::Rect;

/// U+2215 DIVISION SLASH. Joins parent and tag names in a single folder name
/// without introducing a path separator.
pub const DIVISION_SLASH: char = '\u{2215}';

/// One face crop to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceJob {
    pub image_path: PathBuf,
    pub region: Rect,
    pub label: String,
}

/// Filters applied to the region query.
#[derive(Debug, Clone, Default)]
pub struct RegionQuery {
    /// Album root label to extract from.
    pub scope: String,
    /// Minimum number of regions a tag needs; 0 disables the filter.
    pub min_count: u32,
    /// Name output folders `{parent}∕{tag}` instead of `{tag}`.
    pub compose_parent: bool,
}

/// Raw row as stored in the catalog.
#[derive(Debug, Clone)]
pub struct RegionRow {
    pub path_fragment: String,
    pub region_text: String,
    pub tag_name: String,
    pub parent_tag_name: Option<String>,
}

/// Outcome of one query execution.
#[derive(Debug, Default)]
pub struct RegionScan {
    pub jobs: Vec<FaceJob>,
    /// Rows skipped because their region text could not be parsed.
    pub malformed: usize,
}

macro_rules! region_query {
    ($parent_column:literal, $parent_join:literal, $count_filter:literal) => {
        concat!(
            "SELECT substr(AlbumRoots.specificPath, 2) || rtrim(Albums.relativePath, '/') || '/' || Images.name, ",
            "ImageTagProperties.value, Tags.name, ",
            $parent_column,
            " FROM ImageTagProperties",
            " JOIN Tags ON Tags.id = ImageTagProperties.tagid",
            $parent_join,
            " JOIN Images ON Images.id = ImageTagProperties.imageid",
            " JOIN Albums ON Albums.id = Images.album",
            " JOIN AlbumRoots ON AlbumRoots.id = Albums.albumRoot",
            " WHERE ImageTagProperties.property = 'tagRegion'",
            " AND AlbumRoots.label = :root",
            $count_filter,
            " ORDER BY Images.id, Tags.id, ImageTagProperties.value"
        )
    };
}

const QUERY_PLAIN: &str = region_query!("NULL", "", "");
const QUERY_PARENT: &str = region_query!(
    "parent.name",
    " LEFT JOIN Tags AS parent ON parent.id = Tags.pid",
    ""
);
const QUERY_MIN_COUNT: &str = region_query!(
    "NULL",
    "",
    " AND ImageTagProperties.tagid IN (SELECT tagid FROM ImageTagProperties WHERE property = 'tagRegion' GROUP BY tagid HAVING COUNT(*) >= :min_count)"
);
const QUERY_MIN_COUNT_PARENT: &str = region_query!(
    "parent.name",
    " LEFT JOIN Tags AS parent ON parent.id = Tags.pid",
    " AND ImageTagProperties.tagid IN (SELECT tagid FROM ImageTagProperties WHERE property = 'tagRegion' GROUP BY tagid HAVING COUNT(*) >= :min_count)"
);

fn query_sql(has_min_count: bool, has_parent: bool) -> &'static str {
    match (has_min_count, has_parent) {
        (false, false) => QUERY_PLAIN,
        (false, true) => QUERY_PARENT,
        (true, false) => QUERY_MIN_COUNT,
        (true, true) => QUERY_MIN_COUNT_PARENT,
    }
}

pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open a catalog read-only.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "database not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Fetch the raw region rows matching `query`.
    pub fn region_rows(&self, query: &RegionQuery) -> Result<Vec<RegionRow>> {
        let has_min_count = query.min_count > 0;
        let mut stmt = self
            .conn
            .prepare(query_sql(has_min_count, query.compose_parent))?;

        if has_min_count {
            collect_rows(
                &mut stmt,
                named_params! { ":root": query.scope, ":min_count": query.min_count },
            )
        } else {
            collect_rows(&mut stmt, named_params! { ":root": query.scope })
        }
    }

    /// Build extraction jobs for `query`, resolving image paths under `mount`.
    ///
    /// Rows whose region text is malformed are logged and skipped.
    pub fn fetch_jobs(&self, query: &RegionQuery, mount: &Path) -> Result<RegionScan> {
        let rows = self.region_rows(query)?;
        debug!("Catalog returned {} region rows for {:?}", rows.len(), query.scope);

        let mut scan = RegionScan::default();
        for row in rows {
            match row.into_job(mount, query.compose_parent) {
                Ok(job) => scan.jobs.push(job),
                Err(e) => {
                    warn!("Skipping region: {}", e);
                    scan.malformed += 1;
                }
            }
        }
        Ok(scan)
    }
}

fn collect_rows<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<Vec<RegionRow>> {
    let rows = stmt
        .query_map(params, read_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RegionRow> {
    Ok(RegionRow {
        path_fragment: row.get(0)?,
        region_text: row.get(1)?,
        tag_name: row.get(2)?,
        parent_tag_name: row.get(3)?,
    })
}

impl RegionRow {
    pub fn into_job(self, mount: &Path, compose_parent: bool) -> Result<FaceJob> {
        let region = parse_rect(&self.region_text)?;
        let label = if compose_parent {
            compose_label(self.parent_tag_name.as_deref(), &self.tag_name)
        } else {
            self.tag_name
        };

        Ok(FaceJob {
            image_path: mount.join(self.path_fragment.trim_start_matches('/')),
            region,
            label,
        })
    }
}

/// Output folder name for a tag, optionally prefixed with its parent.
pub fn compose_label(parent: Option<&str>, tag: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}{DIVISION_SLASH}{tag}"),
        _ => tag.to_string(),
    }
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(\w+)\s*=\s*"(\d+)""#).expect("attribute pattern is valid")
    })
}

/// Parse `<rect x=".." y=".." width=".." height=".."/>` in any attribute order.
pub fn parse_rect(text: &str) -> Result<Rect> {
    let attrs: HashMap<&str, u32> = attribute_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str().parse().ok()?;
            Some((name, value))
        })
        .collect();

    let field = |name: &str| {
        attrs.get(name).copied().ok_or_else(|| Error::MalformedRegion {
            text: text.to_string(),
        })
    };

    Ok(Rect::new(
        field("x")?,
        field("y")?,
        field("width")?,
        field("height")?,
    ))
}
