//! Rebuilds a playable image from the cached base image and a seed's
//! patches.
//!
//! The order is fixed: base patch onto the unmodified image, expand to the
//! seed's size, randomizer patch, then the checksum patch.

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{BlobCache, Caches};
use crate::config::RandomizerConfig;
use crate::convert::to_seed_gen_dict;
use crate::service::{PatchApplier, Seed, SeedGenerator};
use crate::Result;

/// `misc` key holding the unmodified base image.
pub const BASE_IMAGE_KEY: &str = "base_zelda_rom";

#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("no base image has been registered")]
    MissingBaseImage,

    #[error("no base patch cached for base image revision {rom_hash}")]
    MissingBasePatch { rom_hash: String },

    #[error("patch application failed: {0}")]
    Patch(String),

    #[error("image of {have} bytes cannot be expanded to {want} bytes")]
    Expand { have: usize, want: usize },
}

/// Validates `image` with the applier and stores it as the base image.
pub fn store_base_image<A>(misc: &BlobCache, applier: &A, image: &[u8]) -> Result<()>
where
    A: PatchApplier + ?Sized,
{
    applier.validate_base(image)?;
    misc.put(BASE_IMAGE_KEY, image)?;
    info!(len = image.len(), "stored base image");
    Ok(())
}

pub struct Reconstructor<'a, A: ?Sized> {
    applier: &'a A,
    caches: &'a Caches,
}

impl<'a, A> Reconstructor<'a, A>
where
    A: PatchApplier + ?Sized,
{
    pub fn new(applier: &'a A, caches: &'a Caches) -> Self {
        Self { applier, caches }
    }

    /// The seed's base patch, caching it under its base image revision when
    /// the seed carries one and falling back to the cache when it doesn't.
    pub fn base_patch(&self, seed: &Seed) -> Result<Vec<u8>> {
        let cache = &self.caches.base_patch;
        let key = seed.current_rom_hash.as_str();

        if let Some(patch) = &seed.base_patch {
            if !cache.exists(key) {
                cache.put(key, patch)?;
            }
            return Ok(patch.clone());
        }

        cache.get(key)?.ok_or_else(|| {
            ReconstructionError::MissingBasePatch {
                rom_hash: key.to_string(),
            }
            .into()
        })
    }

    pub fn reconstruct(&self, seed: &Seed) -> Result<Vec<u8>> {
        let base = self
            .caches
            .misc
            .get(BASE_IMAGE_KEY)?
            .ok_or(ReconstructionError::MissingBaseImage)?;
        let base_patch = self.base_patch(seed)?;

        let image = self.applier.apply(&base, &base_patch)?;
        let image = self.applier.expand(image, seed.size)?;
        let image = self.applier.apply(&image, &seed.patch)?;
        let image = match &seed.checksum_patch {
            Some(patch) => self.applier.apply(&image, patch)?,
            None => {
                debug!(hash = %seed.hash, "seed has no checksum patch");
                image
            }
        };

        Ok(image)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRom {
    pub hash: String,
    pub code: Vec<String>,
    pub image: Vec<u8>,
}

/// Generates one seed for `config` and rebuilds its image. The generator is
/// called exactly once; the finished image is also kept under `seed/<hash>`.
pub fn generate_rom<G, A>(
    generator: &G,
    applier: &A,
    caches: &Caches,
    config: &RandomizerConfig,
) -> Result<GeneratedRom>
where
    G: SeedGenerator + ?Sized,
    A: PatchApplier + ?Sized,
{
    let settings = to_seed_gen_dict(config);
    debug!(settings = %serde_json::Value::Object(settings.clone()), "generating seed");

    let seed = generator.generate(&settings)?;
    info!(hash = %seed.hash, code = ?seed.code, "generated seed");

    let image = Reconstructor::new(applier, caches).reconstruct(&seed)?;
    caches.seed.put(&seed.hash, &image)?;

    Ok(GeneratedRom {
        hash: seed.hash,
        code: seed.code,
        image,
    })
}
