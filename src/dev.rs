//! `lowcode:dev`.
//!
//! Builds `index.js` / `meta.js` in memory, serves them (plus
//! `assets.json`) over HTTP with wide-open CORS, and rebuilds when the
//! component sources change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::bundler::{create_bundler, BundleConfig, Externals};
use crate::entry::{generate_meta_entry, generate_view_entry};
use crate::manifest::ManifestOptions;
use crate::options::{manifest_mode, ResolvedOptions};
use crate::plugin::{AssetStore, AssetsManifestPlugin};
use crate::{BuildError, Command};

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Flags of `lowcode:dev`, forwarded to the dev server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mode: String,
}

impl Default for DevArgs {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            mode: Command::Dev.default_mode().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory build
// ---------------------------------------------------------------------------

/// Manifest options of the dev build: URLs point at the dev server unless
/// the user configured `localBaseUrl`, and only `index.js` is listed.
pub fn dev_manifest_options(options: &ResolvedOptions, mode: &str) -> ManifestOptions {
    let local_base_url = options
        .assets_config
        .local_base_url
        .clone()
        .unwrap_or_else(|| options.dev_server.local_base_url());
    ManifestOptions::new(options, mode, "assets.json")
        .with_local_base_url(local_base_url)
        .with_files(vec!["index.js".to_string()])
        .prod(false)
}

/// Regenerate both entries and rebuild `index` and `meta` into `store`.
///
/// Outputs are staged and only land in `store` once both bundles built, so
/// a failed rebuild keeps serving the previous files.
pub async fn build_dev(
    options: &ResolvedOptions,
    mode: &str,
    store: &Arc<AssetStore>,
) -> Result<(), BuildError> {
    let view_entry =
        generate_view_entry(&options.cache_dir, &options.entry_path, &options.library).await?;
    let meta_library = options.meta_library();
    let meta_entry = generate_meta_entry(
        &options.cache_dir,
        &options.meta_dir,
        &options.npm_info,
        Some(meta_library.as_str()),
    )
    .await?;

    let staged = Arc::new(AssetStore::new());
    let externals = Externals::with_defaults(&options.externals);
    let plugin = AssetsManifestPlugin::new(dev_manifest_options(options, mode))
        .with_store(Arc::clone(&staged));
    let targets = [
        ("index", view_entry, Some(plugin)),
        ("meta", meta_entry, None),
    ];

    for (chunk, entry, plugin) in targets {
        let config = BundleConfig::dev(chunk, &entry, &options.root, &options.output_dir, &externals);
        let mut bundler = create_bundler(&config, plugin)?;
        let generated = bundler.generate().await;
        bundler
            .close()
            .await
            .map_err(|e| BuildError::Bundler(format!("Rolldown close failed for `{chunk}`: {:?}", e)))?;
        let output = match generated {
            Ok(output) => output,
            Err(diagnostics) => {
                error!(bundle = chunk, "{:?}", diagnostics);
                return Err(BuildError::CompilationFailed);
            }
        };
        for warning in &output.warnings {
            warn!(bundle = chunk, "{:?}", warning);
        }
        staged.update_from_outputs(&output.assets);
    }
    store.extend_from(&staged);
    debug!(files = ?store.paths(), "dev build stored");
    Ok(())
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct DevState {
    store: Arc<AssetStore>,
    headers: HeaderMap,
}

pub fn content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("js") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Configured headers as a [`HeaderMap`]; invalid entries are skipped.
fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid dev server header"),
        }
    }
    map
}

async fn serve_asset(State(state): State<DevState>, uri: Uri) -> Response {
    let path = uri.path();
    let mut headers = state.headers.clone();
    match state.store.get(path) {
        Some(content) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(path)));
            (StatusCode::OK, headers, content.as_ref().clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, headers, "Not Found").into_response(),
    }
}

/// Router serving every stored asset. Any `Host` is accepted.
pub fn router(store: Arc<AssetStore>, headers: &BTreeMap<String, String>) -> Router {
    let state = DevState {
        store,
        headers: header_map(headers),
    };
    Router::new().fallback(serve_asset).with_state(state)
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

fn is_generated(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == "node_modules")
}

fn setup_watcher(
    dirs: &[PathBuf],
) -> Result<(RecommendedWatcher, tokio::sync::mpsc::Receiver<()>), BuildError> {
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if event.paths.iter().any(|p| !is_generated(p)) {
                    let _ = tx.blocking_send(());
                }
            }
        },
        notify::Config::default(),
    )?;
    for dir in dirs {
        if dir.is_dir() {
            watcher.watch(dir, RecursiveMode::Recursive)?;
            debug!(dir = %dir.display(), "watching");
        }
    }
    Ok((watcher, rx))
}

/// Directories whose changes trigger a rebuild.
pub fn watch_dirs(options: &ResolvedOptions) -> Vec<PathBuf> {
    let mut dirs = vec![options.meta_dir.clone()];
    if let Some(entry_dir) = options.entry_path.parent() {
        if !dirs.iter().any(|d| entry_dir.starts_with(d)) {
            dirs.push(entry_dir.to_path_buf());
        }
    }
    dirs
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Result of a dev server task that stopped on its own.
fn server_exit(
    served: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), BuildError> {
    match served {
        Ok(Ok(())) => {
            warn!("dev server stopped");
            Ok(())
        }
        Ok(Err(err)) => Err(err.into()),
        Err(err) => Err(BuildError::Io(std::io::Error::other(err))),
    }
}

/// Run `lowcode:dev` for the project at `root` until Ctrl-C.
pub async fn run_dev(root: &Path, args: &DevArgs) -> Result<(), BuildError> {
    let mut options = ResolvedOptions::load(root)?;
    options.ensure_entry()?;
    if let Some(host) = &args.host {
        options.dev_server.host = host.clone();
    }
    if let Some(port) = args.port {
        options.dev_server.port = port;
    }
    let mode = manifest_mode(Command::Dev, &args.mode);
    info!(root = %root.display(), mode = %mode, "lowcode:dev");

    let store = Arc::new(AssetStore::new());
    build_dev(&options, &mode, &store).await?;

    let addr = format!("{}:{}", options.dev_server.host, options.dev_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let app = router(Arc::clone(&store), &options.dev_server.headers);
    info!("dev server listening on {}", options.dev_server.local_base_url());
    let mut server = tokio::spawn(async move { axum::serve(listener, app).await });

    let (_watcher, mut watcher_rx) = setup_watcher(&watch_dirs(&options))?;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            served = &mut server => {
                return server_exit(served);
            }
            Some(()) = watcher_rx.recv() => {
                tokio::time::sleep(DEBOUNCE).await;
                while watcher_rx.try_recv().is_ok() {}
                match build_dev(&options, &mode, &store).await {
                    Ok(()) => info!("rebuilt"),
                    Err(err) => error!("rebuild failed: {err}"),
                }
            }
        }
    }

    server.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BaseUrl, ProjectConfig};

    fn resolved(root: &Path) -> ResolvedOptions {
        ResolvedOptions::resolve(
            root,
            ProjectConfig {
                package_name: Some("@k/example".into()),
                package_version: Some("1.0.0".into()),
                options: Default::default(),
            },
        )
    }

    #[test]
    fn manifest_points_at_dev_server() {
        let options = resolved(Path::new("/proj"));
        let manifest = dev_manifest_options(&options, "development");
        assert_eq!(manifest.local_base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(manifest.files, Some(vec!["index.js".to_string()]));
        assert_eq!(manifest.filename, "assets.json");
        assert_eq!(manifest.relative_path, "");
        assert!(!manifest.is_prod);
    }

    #[test]
    fn configured_local_base_url_wins() {
        let mut options = resolved(Path::new("/proj"));
        options.assets_config.local_base_url = Some("http://dev.local:3000".into());
        let manifest = dev_manifest_options(&options, "development");
        assert_eq!(manifest.local_base_url.as_deref(), Some("http://dev.local:3000"));
    }

    #[test]
    fn dev_manifest_resolves_against_local_server() {
        let mut options = resolved(Path::new("/proj"));
        options.assets_config.base_url = BaseUrl::PerMode(BTreeMap::from([
            ("production".to_string(), "https://cdn/{name}@{version}".to_string()),
            ("development".to_string(), "http://127.0.0.1:9000".to_string()),
        ]));
        let manifest = dev_manifest_options(&options, "development")
            .build(&["index.js".into(), "meta.js".into(), "index.js.map".into()])
            .unwrap();
        assert_eq!(
            manifest.packages[0]["urls"],
            serde_json::json!(["http://127.0.0.1:9000/index.js"])
        );
        assert_eq!(manifest.components[0]["url"], "http://127.0.0.1:9000/meta.js");
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("/index.js"), "application/javascript; charset=utf-8");
        assert_eq!(content_type("/assets.json"), "application/json; charset=utf-8");
        assert_eq!(content_type("/index.js.map"), "application/json; charset=utf-8");
        assert_eq!(content_type("/blob"), "application/octet-stream");
    }

    #[test]
    fn invalid_headers_skipped() {
        let map = header_map(&BTreeMap::from([
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
            ("bad header".to_string(), "x".to_string()),
        ]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("access-control-allow-origin").unwrap(), "*");
    }

    #[test]
    fn generated_paths_ignored() {
        assert!(is_generated(Path::new("/p/node_modules/.lowcode-builder/meta-entry.js")));
        assert!(!is_generated(Path::new("/p/src/button/meta.ts")));
    }

    #[test]
    fn watch_dirs_deduplicated() {
        let options = resolved(Path::new("/proj"));
        assert_eq!(watch_dirs(&options), vec![PathBuf::from("/proj/src")]);
    }

    #[tokio::test]
    async fn server_failure_propagates() {
        let failed = tokio::spawn(async {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken"))
        })
        .await;
        assert!(matches!(server_exit(failed), Err(BuildError::Io(_))));

        let panicked = tokio::spawn(async {
            if true {
                panic!("server task panicked");
            }
            Ok::<(), std::io::Error>(())
        })
        .await;
        assert!(matches!(server_exit(panicked), Err(BuildError::Io(_))));

        let clean = tokio::spawn(async { Ok::<(), std::io::Error>(()) }).await;
        assert!(server_exit(clean).is_ok());
    }

    #[tokio::test]
    async fn serves_stored_assets_with_cors() {
        let store = Arc::new(AssetStore::new());
        store.update("index.js", "console.log(1)");
        let state = DevState {
            store,
            headers: header_map(&BTreeMap::from([(
                "Access-Control-Allow-Origin".to_string(),
                "*".to_string(),
            )])),
        };

        let ok = serve_asset(State(state.clone()), Uri::from_static("/index.js")).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers().get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(
            ok.headers().get(CONTENT_TYPE).unwrap(),
            "application/javascript; charset=utf-8"
        );

        let missing = serve_asset(State(state), Uri::from_static("/nope.js")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.headers().get("access-control-allow-origin").unwrap(), "*");
    }
}
