use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::data::TreeRecord;
use crate::config::MalformedPolicy;
use crate::error::LoadError;
use crate::geometry;

/// One row of the tree table as exported from the council layer.
///
/// Column names follow the shapefile attribute names (truncated to 10
/// characters), so they are renamed here.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TreeRow {
    #[serde(rename = "OBJECTID")]
    pub object_id: i64,
    #[serde(rename = "botanical_")]
    pub botanical: Option<String>,
    /// Fallback botanical name column
    #[serde(rename = "botanica_1")]
    pub botanical_alt: Option<String>,
    pub height: Option<f64>,
    pub girth: Option<f64>,
    #[serde(rename = "address_fu")]
    pub address: Option<String>,
    /// Raw point geometry, e.g. `POINT (174.77 -41.29)`
    pub geometry: String,
}

impl TreeRow {
    /// First non-blank of the two botanical name columns
    pub fn botanical_name(&self) -> &str {
        [&self.botanical, &self.botanical_alt]
            .into_iter()
            .flatten()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or("Unknown")
    }

    /// Popup markup shown for this tree on the map
    pub fn caption(&self, height: f64) -> String {
        let girth = self
            .girth
            .map(|g| format!("{g:?}cm"))
            .unwrap_or_else(|| "unknown".to_string());
        let address = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("unknown");

        format!(
            "<b>{}</b><br>Height: {height:?}m<br>Girth: {girth}<br>{address}",
            self.botanical_name()
        )
    }

    fn into_record(self) -> Result<TreeRecord, LoadError> {
        let id = self.object_id;
        let height = self
            .height
            .filter(|h| h.is_finite())
            .ok_or(LoadError::MissingHeight { id })?;
        let location = geometry::parse_point(&self.geometry)
            .map_err(|source| LoadError::Geometry { id, source })?;

        Ok(TreeRecord {
            id,
            height,
            location,
            caption: self.caption(height),
        })
    }
}

/// The GeoRecordStore holds every tree, tallest first.
///
/// It is built once at startup and never changes afterwards; the
/// pagination controller and the map view share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecordStore {
    records: Vec<TreeRecord>,
    skipped: usize,
    source: Option<PathBuf>,
}

impl GeoRecordStore {
    /// A store with no records (used before loading and after a failed load)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from parsed rows.
    ///
    /// Rows are stably sorted by height, tallest first, so trees of equal
    /// height keep their file order.
    pub fn from_rows(rows: Vec<TreeRow>, policy: MalformedPolicy) -> Result<Self, LoadError> {
        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for row in rows {
            match row.into_record() {
                Ok(record) => records.push(record),
                Err(e) if policy == MalformedPolicy::Skip => {
                    warn!("Skipping tree: {e}");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        records.sort_by(|a, b| b.height.total_cmp(&a.height));

        Ok(Self {
            records,
            skipped,
            source: None,
        })
    }

    pub fn from_json(json: &str, policy: MalformedPolicy) -> Result<Self, LoadError> {
        let rows: Vec<TreeRow> = serde_json::from_str(json)?;
        debug!("Parsed {} rows", rows.len());
        Self::from_rows(rows, policy)
    }

    /// Load the tree table from disk.
    ///
    /// The file is read with tokio and parsed on the blocking pool, so the
    /// UI stays responsive for large tables.
    pub async fn load(path: PathBuf, policy: MalformedPolicy) -> Result<Self, LoadError> {
        let started = Instant::now();

        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;

        let mut store = tokio::task::spawn_blocking(move || Self::from_json(&json, policy))
            .await
            .map_err(|e| LoadError::TaskJoin(e.to_string()))??;

        info!(
            "Loaded {} trees from {} ({} skipped) in {:?}",
            store.len(),
            path.display(),
            store.skipped,
            started.elapsed()
        );

        store.source = Some(path);
        Ok(store)
    }

    /// All records, tallest first
    pub fn records(&self) -> &[TreeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows dropped during the load
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// File the store was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
