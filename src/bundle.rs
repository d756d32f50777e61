//! `lowcode:build`.
//!
//! 1. Resolve options and (with `--clean`) empty the output directory
//! 2. Materialize the meta entry under the cache directory
//! 3. Build the four library configs; `index` and `index.min` carry the
//!    manifest plugin
//! 4. Run every bundler, failing on any diagnostic error
//! 5. Print the stats table unless `--silent`

use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rolldown::Bundler;
use rolldown_common::Output;
use tracing::{debug, error, info, warn};

use crate::bundler::{create_bundler, library_targets, BundleConfig, Externals};
use crate::entry::generate_meta_entry;
use crate::manifest::ManifestOptions;
use crate::options::{manifest_mode, ResolvedOptions};
use crate::plugin::AssetsManifestPlugin;
use crate::stats::{format_stats, BuildStats};
use crate::{BuildError, Command};

/// Flags of `lowcode:build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    /// Empty the output directory first.
    pub clean: bool,
    /// Suppress the stats table.
    pub silent: bool,
    pub mode: String,
}

impl Default for BuildArgs {
    fn default() -> Self {
        Self {
            clean: false,
            silent: false,
            mode: Command::Build.default_mode().to_string(),
        }
    }
}

/// Manifest plugins of the two view outputs: `assets.json` (pretty, points
/// at `meta.js`) and `assets.min.json` (minified, points at `meta.min.js`).
pub fn manifest_plugins(options: &ResolvedOptions, mode: &str) -> [AssetsManifestPlugin; 2] {
    let relative = options.relative_output_dir();
    let base = |filename: &str| {
        ManifestOptions::new(options, mode, filename).with_relative_path(relative.clone())
    };
    [
        AssetsManifestPlugin::new(base("assets.json").with_meta_file_name("meta.js").prod(false)),
        AssetsManifestPlugin::new(
            base("assets.min.json")
                .with_meta_file_name("meta.min.js")
                .prod(true),
        ),
    ]
}

/// Empty `dir` without removing it. A missing directory is created.
pub async fn empty_dir(dir: &Path) -> Result<(), BuildError> {
    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
        return Ok(());
    }
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    debug!(dir = %dir.display(), "emptied output directory");
    Ok(())
}

/// Spinner text; `mode` is the resolved mode, so `BUILD_ENV` shows here.
pub fn progress_message(mode: &str) -> String {
    format!("Building for {mode} as library umd...")
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

async fn write_bundle(name: &str, bundler: &mut Bundler) -> Result<Vec<Output>, BuildError> {
    let output = match bundler.write().await {
        Ok(output) => output,
        Err(diagnostics) => {
            error!(bundle = name, "{:?}", diagnostics);
            return Err(BuildError::CompilationFailed);
        }
    };
    for warning in &output.warnings {
        warn!(bundle = name, "{:?}", warning);
    }
    Ok(output.assets)
}

/// Close every bundler, including those that never ran. The first close
/// failure is returned after all of them have been attempted.
async fn close_all(bundlers: &mut [(String, Bundler)]) -> Result<(), BuildError> {
    let mut result = Ok(());
    for (name, bundler) in bundlers.iter_mut() {
        if let Err(e) = bundler.close().await {
            warn!(bundle = %name, "close failed: {:?}", e);
            if result.is_ok() {
                result = Err(BuildError::Bundler(format!(
                    "Rolldown close failed for `{name}`: {:?}",
                    e
                )));
            }
        }
    }
    result
}

/// Run `lowcode:build` for the project at `root`.
pub async fn run_build(root: &Path, args: &BuildArgs) -> Result<BuildStats, BuildError> {
    let options = ResolvedOptions::load(root)?;
    options.ensure_entry()?;
    let mode = manifest_mode(Command::Build, &args.mode);
    info!(root = %root.display(), mode = %mode, "lowcode:build");

    if args.clean {
        empty_dir(&options.output_dir).await?;
    }

    let started = Instant::now();
    let progress = spinner(progress_message(&mode));

    let meta_entry = generate_meta_entry(
        &options.cache_dir,
        &options.meta_dir,
        &options.npm_info,
        None,
    )
    .await?;

    let externals = Externals::with_defaults(&options.externals);
    let mut plugins = manifest_plugins(&options, &mode).into_iter();
    let mut bundlers = Vec::new();
    for target in library_targets(&options.entry_path, &meta_entry, &options.library) {
        let config = BundleConfig::library(&target, &options.root, &options.output_dir, &externals);
        let plugin = if target.chunk == "index" {
            plugins.next()
        } else {
            None
        };
        bundlers.push((config.name.clone(), create_bundler(&config, plugin)?));
    }

    let mut outputs = Vec::new();
    let mut result = Ok(());
    for (name, bundler) in &mut bundlers {
        debug!(bundle = %name, "bundling");
        match write_bundle(name, bundler).await {
            Ok(assets) => outputs.extend(assets),
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    progress.finish_and_clear();
    let closed = close_all(&mut bundlers).await;
    result?;
    closed?;

    let stats = BuildStats::collect(outputs.iter(), started.elapsed());
    info!(
        files = stats.assets.len(),
        hash = %stats.hash,
        "build complete in {}ms",
        stats.duration.as_millis()
    );
    if !args.silent {
        println!(
            "{}",
            format_stats(&stats, &options.relative_output_dir(), &options.root)?
        );
    }
    Ok(stats)
}
