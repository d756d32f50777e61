//! Project configuration.
//!
//! Options come from `lowcode.config.json` at the project root, or the
//! `lowcode` key of `package.json`. Everything is optional; defaults are
//! filled in by [`ResolvedOptions::resolve`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils;
use crate::{BuildError, Command, CACHE_DIR};

/// Name of the standalone options file.
pub const CONFIG_FILE: &str = "lowcode.config.json";

/// Overrides the mode used to pick a mapped `baseUrl` during builds.
pub const BUILD_ENV: &str = "BUILD_ENV";

pub const DEFAULT_ENTRY: &str = "src/index.ts";
pub const DEFAULT_OUTPUT_DIR: &str = "dist";
pub const DEFAULT_BASE_URL: &str = "https://unpkg.com/{name}@{version}";
pub const DEFAULT_DEV_HOST: &str = "127.0.0.1";
pub const DEFAULT_DEV_PORT: u16 = 9000;

// ---------------------------------------------------------------------------
// Raw options (as written by the user)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOptions {
    pub entry: Option<String>,
    pub meta_dir: Option<String>,
    pub library: Option<String>,
    #[serde(default)]
    pub externals: BTreeMap<String, String>,
    #[serde(default)]
    pub npm_info: NpmInfoOverrides,
    #[serde(default)]
    pub assets_config: AssetsConfig,
    pub output_dir: Option<String>,
    #[serde(default)]
    pub dev_server: DevServerOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NpmInfoOverrides {
    pub package: Option<String>,
    pub version: Option<String>,
    pub destructuring: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevServerOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// `npmInfo` attached to every component descriptor and package entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpmInfo {
    pub package: String,
    pub version: String,
    pub destructuring: bool,
}

/// A single base URL, or one per build mode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BaseUrl {
    Single(String),
    PerMode(BTreeMap<String, String>),
}

impl BaseUrl {
    /// The base URL for `mode`. `None` when a mapping has no such key.
    pub fn for_mode(&self, mode: &str) -> Option<&str> {
        match self {
            BaseUrl::Single(url) => Some(url),
            BaseUrl::PerMode(map) => map.get(mode).map(String::as_str),
        }
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        BaseUrl::Single(DEFAULT_BASE_URL.to_string())
    }
}

/// Entries prepended verbatim to the manifest's `packages` / `components`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuiltinAssets {
    pub packages: Vec<serde_json::Value>,
    pub components: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetsConfig {
    pub base_url: BaseUrl,
    pub local_base_url: Option<String>,
    pub groups: Vec<String>,
    pub categories: Vec<String>,
    pub builtin_assets: BuiltinAssets,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base_url: BaseUrl::default(),
            local_base_url: None,
            groups: Vec::new(),
            categories: Vec::new(),
            builtin_assets: BuiltinAssets::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    lowcode: Option<PluginOptions>,
}

/// What was read from disk for one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    pub package_name: Option<String>,
    pub package_version: Option<String>,
    pub options: PluginOptions,
}

impl ProjectConfig {
    /// Read `package.json` and the plugin options under `root`.
    pub fn load(root: &Path) -> Result<Self, BuildError> {
        let pkg_path = root.join("package.json");
        let raw = std::fs::read_to_string(&pkg_path).map_err(|e| {
            BuildError::Config(format!("cannot read {}: {e}", pkg_path.display()))
        })?;
        let pkg: PackageJson = serde_json::from_str(&raw).map_err(|e| {
            BuildError::Config(format!("invalid {}: {e}", pkg_path.display()))
        })?;

        let config_path = root.join(CONFIG_FILE);
        let options = if config_path.is_file() {
            debug!(path = %config_path.display(), "loading plugin options");
            let raw = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&raw).map_err(|e| {
                BuildError::Config(format!("invalid {}: {e}", config_path.display()))
            })?
        } else {
            pkg.lowcode.unwrap_or_default()
        };

        Ok(Self {
            package_name: pkg.name,
            package_version: pkg.version,
            options,
        })
    }
}

// ---------------------------------------------------------------------------
// ResolvedOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDevServer {
    pub host: String,
    pub port: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResolvedDevServer {
    /// `http://<host>:<port>`, the manifest's `localBaseUrl` in dev.
    pub fn local_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Options with every default applied and every path made absolute.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub root: PathBuf,
    pub entry: String,
    pub entry_path: PathBuf,
    pub meta_dir: PathBuf,
    pub library: String,
    pub externals: BTreeMap<String, String>,
    pub npm_info: NpmInfo,
    pub assets_config: AssetsConfig,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub dev_server: ResolvedDevServer,
}

impl ResolvedOptions {
    pub fn resolve(root: &Path, config: ProjectConfig) -> Self {
        let ProjectConfig {
            package_name,
            package_version,
            options,
        } = config;

        let entry = options.entry.unwrap_or_else(|| DEFAULT_ENTRY.to_string());
        let meta_dir = match options.meta_dir {
            Some(dir) => root.join(dir),
            None => root.join(&entry).parent().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
        };
        let library = options
            .library
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| utils::library_name(package_name.as_deref(), &entry));

        let npm_info = NpmInfo {
            package: options
                .npm_info
                .package
                .unwrap_or_else(|| package_name.clone().unwrap_or_default()),
            version: options
                .npm_info
                .version
                .unwrap_or_else(|| package_version.clone().unwrap_or_default()),
            destructuring: options.npm_info.destructuring.unwrap_or(true),
        };

        let mut headers = BTreeMap::from([
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
            ("Access-Control-Allow-Headers".to_string(), "Authorization".to_string()),
        ]);
        headers.extend(options.dev_server.headers);

        Self {
            root: root.to_path_buf(),
            entry_path: root.join(&entry),
            entry,
            meta_dir,
            library,
            externals: options.externals,
            npm_info,
            assets_config: options.assets_config,
            output_dir: root.join(options.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)),
            cache_dir: root.join(CACHE_DIR),
            dev_server: ResolvedDevServer {
                host: options
                    .dev_server
                    .host
                    .unwrap_or_else(|| DEFAULT_DEV_HOST.to_string()),
                port: options.dev_server.port.unwrap_or(DEFAULT_DEV_PORT),
                headers,
            },
        }
    }

    /// Load and resolve in one step.
    pub fn load(root: &Path) -> Result<Self, BuildError> {
        Ok(Self::resolve(root, ProjectConfig::load(root)?))
    }

    /// Fail with a configuration error when the view entry is missing.
    pub fn ensure_entry(&self) -> Result<(), BuildError> {
        if self.entry_path.is_file() {
            Ok(())
        } else {
            Err(BuildError::Config(format!(
                "entry `{}` not found at {}",
                self.entry,
                self.entry_path.display()
            )))
        }
    }

    /// Output directory relative to the project root, slash-separated.
    pub fn relative_output_dir(&self) -> String {
        utils::relative_path(&self.root, &self.output_dir)
    }

    /// UMD global of the meta bundle.
    pub fn meta_library(&self) -> String {
        format!("{}Meta", self.library)
    }
}

/// Mode used to index a mapped `baseUrl`.
///
/// Builds honor `BUILD_ENV`; dev always uses the active mode.
pub fn manifest_mode(command: Command, active_mode: &str) -> String {
    if command == Command::Build {
        if let Ok(mode) = std::env::var(BUILD_ENV) {
            if !mode.is_empty() {
                return mode;
            }
        }
    }
    active_mode.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
