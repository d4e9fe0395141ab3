//! Snapshot storage: asset classification, persistence, URL mapping and the manifest.

mod classify;
mod manifest;
mod mapping;
mod persist;

pub use classify::{classify, AssetCategory};
pub use manifest::{AssetRecord, Manifest, PageError, PageRecord};
pub use mapping::UrlMapping;
pub use persist::AssetStore;
