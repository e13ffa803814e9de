//! Seed configuration, blob caching and image reconstruction for
//! A Link to the Past randomizer seeds.
//!
//! The remote randomizer service, the settings provider and the patch
//! applier are reached only through the traits in [`service`].

use thiserror::Error;

pub mod cache;
pub mod config;
pub mod convert;
pub mod memo;
pub mod rebuild;
pub mod service;
pub mod snapshot;

pub use cache::{BlobCache, CacheError, Caches, Namespace};
pub use config::{
    ConfigError, CrystalConfig, EnemizerConfig, FieldMapping, ItemConfig, PresetConvertible,
    PresetDict, PresetScalar, RandomizerConfig, SeedGenDict,
};
pub use convert::{from_preset_dict, from_seed_gen_dict, to_preset_dict, to_seed_gen_dict};
pub use memo::{memoize, Codec, JsonCodec};
pub use rebuild::{
    generate_rom, store_base_image, GeneratedRom, ReconstructionError, Reconstructor,
};
pub use service::{
    fetch_settings_cached, PatchApplier, RandomizerSettings, Seed, SeedGenerator, SettingsProvider,
};

#[derive(Debug, Error)]
pub enum AlttprError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("reconstruction error: {0}")]
    Reconstruction(#[from] ReconstructionError),
    #[error("failed to encode or decode cached value: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("randomizer service error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, AlttprError>;
