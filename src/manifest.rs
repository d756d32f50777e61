//! The `assets.json` manifest.
//!
//! A low-code editor fetches this document to learn where the view and meta
//! bundles of a package live. Field order is fixed: `version`, `packages`,
//! `components`, `sort`.

use serde::Serialize;
use serde_json::Value;

use crate::options::{BaseUrl, BuiltinAssets, NpmInfo, ResolvedOptions};
use crate::utils::{get_origin, join_url, Placeholders};
use crate::BuildError;

pub const DEFAULT_META_FILE_NAME: &str = "meta.js";

/// Assets never listed in `packages[*].urls`.
pub fn is_listed_asset(file: &str) -> bool {
    !file.ends_with(".map") && !file.ends_with("env-setup.js")
}

// ---------------------------------------------------------------------------
// Document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetsManifest {
    pub version: String,
    pub packages: Vec<Value>,
    pub components: Vec<Value>,
    pub sort: SortHints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub package: String,
    pub version: String,
    pub library: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentPackage {
    pub npm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub export_name: String,
    pub url: String,
    pub package: ComponentPackage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortHints {
    pub group_list: Vec<String>,
    pub category_list: Vec<String>,
}

// ---------------------------------------------------------------------------
// ManifestOptions
// ---------------------------------------------------------------------------

/// Inputs of one manifest emission, frozen when the plugin is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestOptions {
    pub npm_info: NpmInfo,
    /// Mode used to index a mapped `base_url`.
    pub mode: String,
    pub library: String,
    /// Name of the emitted asset (`assets.json`, `assets.min.json`).
    pub filename: String,
    pub meta_file_name: String,
    /// Output directory relative to the project root.
    pub relative_path: String,
    /// Explicit file list; bypasses the emitted-asset scan.
    pub files: Option<Vec<String>>,
    /// Minified serialization when set, 2-space pretty otherwise.
    pub is_prod: bool,
    pub base_url: BaseUrl,
    pub local_base_url: Option<String>,
    pub groups: Vec<String>,
    pub categories: Vec<String>,
    pub builtin_assets: BuiltinAssets,
}

impl ManifestOptions {
    /// Options for a project, without `localBaseUrl`.
    pub fn new(options: &ResolvedOptions, mode: impl Into<String>, filename: impl Into<String>) -> Self {
        let assets = &options.assets_config;
        Self {
            npm_info: options.npm_info.clone(),
            mode: mode.into(),
            library: options.library.clone(),
            filename: filename.into(),
            meta_file_name: DEFAULT_META_FILE_NAME.to_string(),
            relative_path: String::new(),
            files: None,
            is_prod: false,
            base_url: assets.base_url.clone(),
            local_base_url: None,
            groups: assets.groups.clone(),
            categories: assets.categories.clone(),
            builtin_assets: assets.builtin_assets.clone(),
        }
    }

    pub fn with_meta_file_name(mut self, name: impl Into<String>) -> Self {
        self.meta_file_name = name.into();
        self
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = path.into();
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_local_base_url(mut self, url: impl Into<String>) -> Self {
        self.local_base_url = Some(url.into());
        self
    }

    pub fn prod(mut self, is_prod: bool) -> Self {
        self.is_prod = is_prod;
        self
    }

    /// Build the manifest for the given emitted asset names.
    pub fn build(&self, asset_names: &[String]) -> Result<AssetsManifest, BuildError> {
        let mode_base_url = self.base_url.for_mode(&self.mode);
        let origin = mode_base_url.map(get_origin).unwrap_or_default();
        let template = self
            .local_base_url
            .as_deref()
            .or(mode_base_url)
            .ok_or_else(|| BuildError::MissingBaseUrl {
                mode: self.mode.clone(),
            })?;

        let placeholders = self.placeholders(&origin);
        let base = placeholders.render(template)?;
        let resolve_url = |file: &str| join_url(&base, &[self.relative_path.as_str(), file]);

        let files: Vec<&str> = match &self.files {
            Some(files) => files.iter().map(String::as_str).collect(),
            None => asset_names
                .iter()
                .map(String::as_str)
                .filter(|f| is_listed_asset(f))
                .collect(),
        };
        let urls = files
            .into_iter()
            .map(&resolve_url)
            .collect::<Result<Vec<_>, _>>()?;

        let mut packages = self.builtin_assets.packages.clone();
        packages.push(serde_json::to_value(PackageEntry {
            package: self.npm_info.package.clone(),
            version: self.npm_info.version.clone(),
            library: self.library.clone(),
            urls,
        })?);

        let mut components = self.builtin_assets.components.clone();
        components.push(serde_json::to_value(ComponentEntry {
            export_name: format!("{}Meta", self.library),
            url: resolve_url(&self.meta_file_name)?,
            package: ComponentPackage {
                npm: self.npm_info.package.clone(),
            },
        })?);

        Ok(AssetsManifest {
            version: self.npm_info.version.clone(),
            packages,
            components,
            sort: SortHints {
                group_list: self.groups.clone(),
                category_list: self.categories.clone(),
            },
        })
    }

    /// Build, template and serialize the manifest.
    pub fn render(&self, asset_names: &[String]) -> Result<String, BuildError> {
        let manifest = self.build(asset_names)?;
        let origin = self
            .base_url
            .for_mode(&self.mode)
            .map(get_origin)
            .unwrap_or_default();
        let value = integral_numbers(
            self.placeholders(&origin)
                .substitute_json(serde_json::to_value(&manifest)?),
        );
        let source = if self.is_prod {
            serde_json::to_string(&value)?
        } else {
            serde_json::to_string_pretty(&value)?
        };
        Ok(source)
    }

    fn placeholders<'a>(&'a self, origin: &'a str) -> Placeholders<'a> {
        Placeholders {
            name: &self.npm_info.package,
            version: &self.npm_info.version,
            origin,
        }
    }
}

/// Print whole floats the way JavaScript does: `1.0` becomes `1`.
fn integral_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                Value::from(f as i64)
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(integral_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, integral_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
