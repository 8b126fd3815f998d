//! JSON snapshots of a loaded index.
//!
//! A snapshot is the pre-computed embedded tier: built once from a policy
//! tree with `iacguard snapshot`, then read at startup instead of
//! re-evaluating every metadata constant.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use iacguard_core::PolicyIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{LoaderError, Result};

/// A serialized index with its creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    /// When the snapshot was generated.
    pub generated_at: DateTime<Utc>,
    /// The captured index.
    pub index: PolicyIndex,
}

impl IndexSnapshot {
    /// Captures `index` now.
    #[must_use]
    pub fn new(index: PolicyIndex) -> Self {
        Self {
            generated_at: Utc::now(),
            index,
        }
    }
}

/// Writes `snapshot` as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
#[instrument(skip(snapshot), fields(path = %path.as_ref().display()))]
pub fn write_snapshot(snapshot: &IndexSnapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| LoaderError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let json = serde_json::to_string_pretty(snapshot).map_err(|e| LoaderError::Snapshot {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, json).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(
        rules = snapshot.index.rule_count(),
        packs = snapshot.index.pack_count(),
        "Wrote index snapshot"
    );
    Ok(())
}

/// Reads a snapshot.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a snapshot.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<IndexSnapshot> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| LoaderError::Snapshot {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads the embedded tier, if any.
///
/// A missing or unreadable snapshot is logged and yields `None`.
#[must_use]
pub fn load_embedded(path: Option<&Path>) -> Option<PolicyIndex> {
    let path = path?;
    match read_snapshot(path) {
        Ok(snapshot) => {
            debug!(
                path = %path.display(),
                generated_at = %snapshot.generated_at,
                "Loaded embedded index"
            );
            Some(snapshot.index)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Embedded index unavailable");
            None
        }
    }
}
