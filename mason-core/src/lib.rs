#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

/// Tile, metatile and tile cluster values.
pub mod tiles;

/// Durable metatile and cluster storage.
pub mod storage;

/// Shared tile caches and render locking.
pub mod cache;

/// Configuration loading and component factories.
pub mod config;

mod provider;
pub use provider::{MetaTileRenderer, ProviderOptions, RenderError, TileProvider};

#[cfg(feature = "logging")]
/// Log output formats and subscriber initialization.
pub mod logging;

mod error;
pub use error::{ErrorKind, MasonCoreError, MasonCoreResult};
