//! `lowcode-assets`: emits the `assets.json` manifest once the bundle is
//! complete.
//!
//! The plugin only reads the finished bundle in `generate_bundle`; it never
//! resolves or transforms modules.

use std::borrow::Cow;
use std::sync::Arc;

use arcstr::ArcStr;
use rolldown_common::{EmittedAsset, Output};
use rolldown_plugin::{HookGenerateBundleArgs, HookUsage, Plugin, PluginContext};
use tracing::debug;

use crate::manifest::ManifestOptions;
use crate::plugin::store::AssetStore;

pub const PLUGIN_NAME: &str = "lowcode-assets";

#[derive(Debug)]
pub struct AssetsManifestPlugin {
    options: ManifestOptions,
    /// Dev builds mirror the manifest into the in-memory store.
    store: Option<Arc<AssetStore>>,
}

impl AssetsManifestPlugin {
    pub fn new(options: ManifestOptions) -> Self {
        Self {
            options,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn options(&self) -> &ManifestOptions {
        &self.options
    }
}

/// File names of everything Rolldown produced, in bundle order.
pub fn asset_names(bundle: &[Output]) -> Vec<String> {
    bundle
        .iter()
        .map(|output| match output {
            Output::Asset(a) => a.filename.to_string(),
            Output::Chunk(c) => c.filename.to_string(),
        })
        .collect()
}

impl Plugin for AssetsManifestPlugin {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(PLUGIN_NAME)
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::GenerateBundle
    }

    async fn generate_bundle(
        &self,
        ctx: &PluginContext,
        args: &mut HookGenerateBundleArgs<'_>,
    ) -> rolldown_plugin::HookNoopReturn {
        let names = asset_names(&*args.bundle);
        let source = self
            .options
            .render(&names)
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        debug!(
            file = %self.options.filename,
            assets = names.len(),
            "emitting assets manifest"
        );

        if let Some(store) = &self.store {
            store.update(&self.options.filename, source.as_bytes());
        }

        let asset = EmittedAsset {
            name: None,
            file_name: Some(ArcStr::from(self.options.filename.as_str())),
            original_file_name: None,
            source: source.into_bytes().into(),
        };
        ctx.emit_file(asset, None, None)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BaseUrl, BuiltinAssets, NpmInfo};

    fn options() -> ManifestOptions {
        ManifestOptions {
            npm_info: NpmInfo {
                package: "@k/example".into(),
                version: "1.0.0".into(),
                destructuring: true,
            },
            mode: "production".into(),
            library: "KExample".into(),
            filename: "assets.min.json".into(),
            meta_file_name: "meta.min.js".into(),
            relative_path: "dist".into(),
            files: None,
            is_prod: true,
            base_url: BaseUrl::Single("https://cdn".into()),
            local_base_url: None,
            groups: vec![],
            categories: vec![],
            builtin_assets: BuiltinAssets::default(),
        }
    }

    #[test]
    fn plugin_name() {
        let plugin = AssetsManifestPlugin::new(options());
        assert_eq!(plugin.name(), "lowcode-assets");
    }

    #[test]
    fn plugin_only_observes_generate_bundle() {
        let usage = AssetsManifestPlugin::new(options()).register_hook_usage();
        assert!(usage.contains(HookUsage::GenerateBundle));
        assert!(!usage.contains(HookUsage::Transform));
        assert!(!usage.contains(HookUsage::ResolveId));
    }

    #[test]
    fn keeps_frozen_options() {
        let plugin = AssetsManifestPlugin::new(options()).with_store(Arc::new(AssetStore::new()));
        assert_eq!(plugin.options().filename, "assets.min.json");
        assert!(plugin.store.is_some());
    }
}
