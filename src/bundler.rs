//! Bundle configuration.
//!
//! One [`BundleConfig`] describes one Rolldown output. A build produces four
//! of them (`index`, `index.min`, `meta`, `meta.min`), all UMD, single chunk,
//! with the peer runtimes left external. Dev produces two IIFE configs whose
//! entries register their own globals.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rolldown::{Bundler, BundlerBuilder, BundlerOptions, InputItem, IsExternal, RawMinifyOptions};
use rolldown_common::{ModuleType, OutputFormat, Platform, SourceMapType};
use rolldown_plugin::SharedPluginable;
use rustc_hash::FxHashMap;

use crate::plugin::AssetsManifestPlugin;
use crate::utils::slash_path;
use crate::BuildError;

/// Peer runtimes that are never bundled.
pub const FIXED_EXTERNALS: &[(&str, &str)] = &[
    ("vue", "var window.Vue"),
    ("@knxcloud/lowcode-vue-renderer", "var window.LCVueRenderer"),
    (
        "@knxcloud/lowcode-vue-simulator-renderer",
        "var window.LCVueSimulatorRenderer",
    ),
];

/// Extensions inlined as data URLs so the UMD bundle is self-contained.
pub const INLINE_ASSET_EXTENSIONS: &[&str] = &[
    "svg", "png", "jpg", "jpeg", "gif", "webp", "avif", "ico", "bmp",
];

// ---------------------------------------------------------------------------
// Externals
// ---------------------------------------------------------------------------

/// Module specifier → UMD reference (`var window.Vue`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Externals(BTreeMap<String, String>);

impl Externals {
    /// The fixed set plus `user`; user entries win on conflicts.
    pub fn with_defaults(user: &BTreeMap<String, String>) -> Self {
        let mut map: BTreeMap<String, String> = FIXED_EXTERNALS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(map)
    }

    pub fn specifiers(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.0.get(specifier).map(String::as_str)
    }

    /// Specifier → global variable, as Rolldown's `globals` expects.
    pub fn globals(&self) -> FxHashMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), global_variable(v).to_string()))
            .collect()
    }
}

/// `var window.Vue` → `Vue`, `window.Foo` → `Foo`, `Bar` → `Bar`.
pub fn global_variable(reference: &str) -> &str {
    let reference = reference.trim();
    let reference = reference.strip_prefix("var ").unwrap_or(reference).trim_start();
    reference.strip_prefix("window.").unwrap_or(reference)
}

// ---------------------------------------------------------------------------
// BundleTarget
// ---------------------------------------------------------------------------

/// One requested library output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleTarget {
    pub chunk: String,
    pub entry: PathBuf,
    pub global_name: String,
    /// `""`, `"min"` or `"prod"`.
    pub postfix: String,
}

impl BundleTarget {
    pub fn new(
        chunk: impl Into<String>,
        entry: impl Into<PathBuf>,
        global_name: impl Into<String>,
        postfix: impl Into<String>,
    ) -> Self {
        Self {
            chunk: chunk.into(),
            entry: entry.into(),
            global_name: global_name.into(),
            postfix: postfix.into(),
        }
    }

    /// `index`, `index.min`, ...
    pub fn entry_name(&self) -> String {
        [self.chunk.as_str(), self.postfix.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn is_minified(&self) -> bool {
        self.postfix.contains("min") || self.postfix.contains("prod")
    }
}

/// The four outputs of a library build, in emission order.
pub fn library_targets(view_entry: &Path, meta_entry: &Path, library: &str) -> Vec<BundleTarget> {
    let meta_library = format!("{library}Meta");
    vec![
        BundleTarget::new("index", view_entry, library, ""),
        BundleTarget::new("index", view_entry, library, "min"),
        BundleTarget::new("meta", meta_entry, meta_library.as_str(), ""),
        BundleTarget::new("meta", meta_entry, meta_library.as_str(), "min"),
    ]
}

// ---------------------------------------------------------------------------
// BundleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Umd,
    Iife,
}

/// Everything Rolldown needs for one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfig {
    pub name: String,
    pub entry: PathBuf,
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub format: Format,
    pub global_name: Option<String>,
    pub externals: Externals,
    pub sourcemap: bool,
    pub minify: bool,
    pub entry_filenames: String,
    pub css_filenames: String,
}

impl BundleConfig {
    /// UMD library output for a build target.
    ///
    /// Non-minified targets keep sourcemaps; `min`/`prod` targets drop them
    /// and are minified.
    pub fn library(target: &BundleTarget, cwd: &Path, out_dir: &Path, externals: &Externals) -> Self {
        let name = target.entry_name();
        let minified = target.is_minified();
        Self {
            entry_filenames: format!("{name}.js"),
            css_filenames: format!("{name}.css"),
            name,
            entry: target.entry.clone(),
            cwd: cwd.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            format: Format::Umd,
            global_name: Some(target.global_name.clone()),
            externals: externals.clone(),
            sourcemap: !minified,
            minify: minified,
        }
    }

    /// Dev output: flat `[name].js`, entry registers its own global.
    pub fn dev(chunk: &str, entry: &Path, cwd: &Path, out_dir: &Path, externals: &Externals) -> Self {
        Self {
            name: chunk.to_string(),
            entry: entry.to_path_buf(),
            cwd: cwd.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            format: Format::Iife,
            global_name: None,
            externals: externals.clone(),
            sourcemap: true,
            minify: false,
            entry_filenames: "[name].js".to_string(),
            css_filenames: "[name].css".to_string(),
        }
    }

    pub fn to_rolldown_options(&self) -> BundlerOptions {
        BundlerOptions {
            input: Some(vec![InputItem {
                name: Some(self.name.clone()),
                import: slash_path(&self.entry),
            }]),
            cwd: Some(self.cwd.clone()),
            dir: Some(self.out_dir.to_string_lossy().to_string()),
            format: Some(match self.format {
                Format::Umd => OutputFormat::Umd,
                Format::Iife => OutputFormat::Iife,
            }),
            name: self.global_name.clone(),
            platform: Some(Platform::Browser),
            external: Some(IsExternal::from(self.externals.specifiers())),
            globals: Some(self.externals.globals().into()),
            entry_filenames: Some(self.entry_filenames.clone().into()),
            css_entry_filenames: Some(self.css_filenames.clone().into()),
            sourcemap: self.sourcemap.then_some(SourceMapType::File),
            minify: Some(RawMinifyOptions::Bool(self.minify)),
            inline_dynamic_imports: Some(true),
            module_types: Some(
                INLINE_ASSET_EXTENSIONS
                    .iter()
                    .map(|ext| (format!(".{ext}"), ModuleType::Dataurl))
                    .collect(),
            ),
            ..Default::default()
        }
    }
}

/// Create a Rolldown bundler for `config`, with the manifest plugin attached
/// when given.
pub fn create_bundler(
    config: &BundleConfig,
    manifest: Option<AssetsManifestPlugin>,
) -> Result<Bundler, BuildError> {
    let mut plugins: Vec<SharedPluginable> = Vec::new();
    if let Some(plugin) = manifest {
        plugins.push(Arc::new(plugin));
    }

    BundlerBuilder::default()
        .with_options(config.to_rolldown_options())
        .with_plugins(plugins)
        .build()
        .map_err(|e| BuildError::Bundler(format!("Rolldown init failed for `{}`: {:?}", config.name, e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
