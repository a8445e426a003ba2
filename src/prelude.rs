//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use archetype_assets::prelude::*;
//! ```

pub use crate::config::AssetConfig;
pub use crate::error::{AssetError, Result};
pub use crate::reclaim::ReclaimTimer;
pub use crate::resources::{
    Asset, AssetLoaders, AssetManager, ContentLoader, LazyAsset, ResourceTable, TextureResource,
};
pub use crate::themes::{
    CollisionPolicy, LoadProgress, LoadStatus, SymphoniaDecoder, Theme, ThemeDecoder,
    ThemeRegistry,
};
