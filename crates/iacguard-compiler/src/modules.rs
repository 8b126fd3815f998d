//! Discovery of `.rego` files and helper module directories.
//!
//! Helper modules live in a directory named `lib`. They are never policies
//! on their own, so discovery walks skip them, and callers load them
//! separately as shared context for every policy in the same provider.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CompilerError, Result};

/// Name of helper module directories.
pub const LIB_DIR: &str = "lib";

/// How many ancestor directories [`find_lib_dir_upward`] inspects by default.
pub const MAX_LIB_SEARCH_DEPTH: usize = 5;

/// Returns `true` if `path` has a `.rego` extension.
#[must_use]
pub fn is_rego_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("rego"))
}

/// Recursively collects `.rego` files below `dir` in file-name order.
///
/// With `skip_lib`, `lib` directories below `dir` are not entered.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn collect_rego_files(dir: &Path, skip_lib: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(skip_lib
                && entry.depth() > 0
                && entry.file_type().is_dir()
                && entry.file_name() == LIB_DIR)
        });

    for entry in walker {
        let entry = entry.map_err(|e| CompilerError::Io {
            path: e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
            source: e.into(),
        })?;
        if entry.file_type().is_file() && is_rego_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Reads every `.rego` file below `dir`, keyed by path.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be read.
pub fn load_modules(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut modules = BTreeMap::new();

    for path in collect_rego_files(dir, false)? {
        let source = fs::read_to_string(&path).map_err(|e| CompilerError::FileReadError {
            path: path.clone(),
            source: e,
        })?;
        modules.insert(path.to_string_lossy().into_owned(), source);
    }

    debug!(dir = %dir.display(), count = modules.len(), "Loaded helper modules");
    Ok(modules)
}

/// Searches `start` and up to `max_depth` of its ancestors for a `lib`
/// directory, returning the nearest one.
#[must_use]
pub fn find_lib_dir_upward(start: &Path, max_depth: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(max_depth + 1)
        .map(|dir| dir.join(LIB_DIR))
        .find(|candidate| candidate.is_dir())
}
