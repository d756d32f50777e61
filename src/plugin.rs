//! Rolldown plugins.
//!
//! - [`AssetsManifestPlugin`] observes the finished bundle in `generate_bundle`
//!   and emits `assets.json`.
//! - [`AssetStore`] holds dev outputs in memory for the dev server.

pub mod assets;
pub mod store;

pub use assets::AssetsManifestPlugin;
pub use store::AssetStore;
