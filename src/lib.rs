//! # Lowcode Bundler
//!
//! Rolldown integration that turns a low-code component package into two
//! coordinated UMD bundles and an assets manifest:
//!
//! - a **view** bundle (`index.js`, `index.min.js`) with the runtime components,
//! - a **meta** bundle (`meta.js`, `meta.min.js`) with the design-time descriptors,
//! - `assets.json` / `assets.min.json` telling a low-code editor where both live.
//!
//! The bundler never transforms user source itself. It synthesizes entry
//! modules, configures Rolldown, and observes the finished bundle to emit
//! the manifest.
//!
//! ```text
//! meta.* files → entry::generate_meta_entry ─┐
//! src/index.ts ──────────────────────────────┼→ bundler::BundleConfig ×4 → Rolldown
//!                                            │      └ AssetsManifestPlugin (index only)
//!                                            └→ stats::format_stats
//! ```

pub mod bundle;
pub mod bundler;
pub mod dev;
pub mod entry;
pub mod manifest;
pub mod options;
pub mod plugin;
pub mod stats;
pub mod utils;

use thiserror::Error;

pub use bundle::{run_build, BuildArgs};
pub use bundler::{BundleConfig, BundleTarget, Externals};
pub use dev::{run_dev, DevArgs};
pub use manifest::{AssetsManifest, ManifestOptions};
pub use options::{ProjectConfig, ResolvedOptions};
pub use plugin::{AssetStore, AssetsManifestPlugin};
pub use stats::BuildStats;

/// Directory (relative to the project root) holding synthesized entry modules.
pub const CACHE_DIR: &str = "node_modules/.lowcode-builder";

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The two commands registered on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `lowcode:build`: four UMD bundles plus manifests.
    Build,
    /// `lowcode:dev`: in-memory build served by the dev server.
    Dev,
}

impl Command {
    pub const fn name(self) -> &'static str {
        match self {
            Command::Build => "lowcode:build",
            Command::Dev => "lowcode:dev",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Command::Build => "build for lowcode component",
            Command::Dev => "dev for lowcode component",
        }
    }

    /// Mode used when the caller does not pass `--mode`.
    pub const fn default_mode(self) -> &'static str {
        match self {
            Command::Build => "production",
            Command::Dev => "development",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildError
// ---------------------------------------------------------------------------

/// Errors that abort a command.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Meta discovery failed: {0}")]
    Discovery(String),

    #[error("Unknown placeholder `{{{placeholder}}}` in `{template}`")]
    Template {
        placeholder: String,
        template: String,
    },

    #[error("No baseUrl configured for mode `{mode}`")]
    MissingBaseUrl { mode: String },

    #[error("Bundler error: {0}")]
    Bundler(String),

    #[error("Build failed with errors.")]
    CompilationFailed,

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_modes() {
        assert_eq!(Command::Build.default_mode(), "production");
        assert_eq!(Command::Dev.default_mode(), "development");
    }

    #[test]
    fn command_names() {
        assert_eq!(Command::Build.name(), "lowcode:build");
        assert_eq!(Command::Dev.description(), "dev for lowcode component");
    }

    #[test]
    fn compilation_failed_message() {
        assert_eq!(
            BuildError::CompilationFailed.to_string(),
            "Build failed with errors."
        );
    }

    #[test]
    fn template_error_message() {
        let err = BuildError::Template {
            placeholder: "tag".into(),
            template: "https://cdn/{tag}".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown placeholder `{tag}` in `https://cdn/{tag}`"
        );
    }
}
