//! Sprite catalog and theme tables

pub mod catalog;
pub mod themes;

pub use catalog::{resolve_source, AssetCatalog, AssetError, FileCatalog, TextureSource};
