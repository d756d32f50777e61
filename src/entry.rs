//! Entry synthesis.
//!
//! Both bundles start from a generated module written under the build
//! cache directory (`node_modules/.lowcode-builder`):
//!
//! - `view-entry.js` re-exports the user's view source on `window[<library>]`
//!   (dev only; builds point Rolldown at the user source directly).
//! - `meta-entry.js` imports every discovered `meta.*` descriptor, merges
//!   `npmInfo` into each and exposes the resulting `components` array.
//!
//! Output is a pure function of the inputs, so repeated runs rewrite
//! byte-identical files.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::options::NpmInfo;
use crate::utils::{escape_js_string, slash_path};
use crate::BuildError;

pub const VIEW_ENTRY_FILE: &str = "view-entry.js";
pub const META_ENTRY_FILE: &str = "meta-entry.js";

const META_FILE_NAMES: &[&str] = &["meta.js", "meta.jsx", "meta.ts", "meta.tsx"];
const META_INDEX_FILE_NAMES: &[&str] = &["index.js", "index.ts"];

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

fn is_node_modules(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == "node_modules"
}

fn is_meta_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if META_FILE_NAMES.contains(&file_name) {
        return true;
    }
    META_INDEX_FILE_NAMES.contains(&file_name)
        && path
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|parent| parent == "meta")
}

/// Find `**/meta.{js,jsx,ts,tsx}` and `**/meta/index.{js,ts}` under `dir`,
/// skipping `node_modules`. Results are absolute and sorted by path.
///
/// A missing `dir` yields an empty list.
pub fn discover_meta_files(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "meta directory does not exist");
        return Ok(Vec::new());
    }
    let root = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_entry(|e| !is_node_modules(e))
    {
        let entry = entry.map_err(|e| BuildError::Discovery(e.to_string()))?;
        if entry.file_type().is_file() && is_meta_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(count = files.len(), dir = %root.display(), "discovered meta files");
    Ok(files)
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

/// Source of the dev view entry.
pub fn view_entry_code(view_file: &Path, global_name: &str) -> String {
    format!(
        "import * as view from '{}'\nwindow['{}'] = Object.assign({{ __esModule: true }}, view)",
        escape_js_string(&slash_path(view_file)),
        escape_js_string(global_name),
    )
}

/// Source of the meta entry.
///
/// With a `global_name` the components are attached to `window`, otherwise
/// they are exported as `components`.
pub fn meta_entry_code(
    meta_files: &[PathBuf],
    npm_info: &NpmInfo,
    global_name: Option<&str>,
) -> Result<String, BuildError> {
    let import_code = meta_files
        .iter()
        .enumerate()
        .map(|(idx, file)| {
            format!(
                "import meta{idx} from \"{}\"",
                escape_js_string(&slash_path(file))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let names = (0..meta_files.len())
        .map(|idx| format!("meta{idx}"))
        .collect::<Vec<_>>()
        .join(",");
    let npm_json = serde_json::to_string(npm_info)?;
    let footer = match global_name {
        None => "export { components }".to_string(),
        Some(name) => format!(
            "window['{}'] = Object.assign({{ __esModule: true }}, {{ components }})",
            escape_js_string(name)
        ),
    };

    Ok(format!(
        r#"{import_code}
const npmInfo = {npm_json};
const components = [{names}];
components.forEach((item) => {{
  if (!item.npm) {{
    item.npm = {{
      ...npmInfo,
      componentName: item.componentName,
    }}
  }} else {{
    item.npm = {{
      ...npmInfo,
      ...item.npm,
    }}
  }}
}})
{footer}"#
    ))
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

async fn write_entry(dir: &Path, file_name: &str, code: String) -> Result<PathBuf, BuildError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, code).await?;
    debug!(path = %path.display(), "wrote virtual entry");
    Ok(path)
}

/// Write `view-entry.js` into `dir` and return its path.
pub async fn generate_view_entry(
    dir: &Path,
    view_file: &Path,
    global_name: &str,
) -> Result<PathBuf, BuildError> {
    write_entry(dir, VIEW_ENTRY_FILE, view_entry_code(view_file, global_name)).await
}

/// Discover meta files under `meta_dir`, write `meta-entry.js` into `dir`
/// and return its path.
pub async fn generate_meta_entry(
    dir: &Path,
    meta_dir: &Path,
    npm_info: &NpmInfo,
    global_name: Option<&str>,
) -> Result<PathBuf, BuildError> {
    let search_dir = meta_dir.to_path_buf();
    let files = tokio::task::spawn_blocking(move || discover_meta_files(&search_dir))
        .await
        .map_err(|e| BuildError::Discovery(e.to_string()))??;
    let code = meta_entry_code(&files, npm_info, global_name)?;
    write_entry(dir, META_ENTRY_FILE, code).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
