//! Named configuration snapshots, kept as JSON preset dicts in the
//! `config` namespace.

use crate::cache::BlobCache;
use crate::config::PresetDict;
use crate::memo::{Codec, JsonCodec};
use crate::Result;

/// Slot names offered when saving or loading.
pub const SNAPSHOT_SLOTS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

pub fn save_snapshot(config: &BlobCache, name: &str, preset: &PresetDict) -> Result<()> {
    config.put(name, &JsonCodec.encode(preset)?)?;
    Ok(())
}

/// `Ok(None)` when nothing was ever saved under `name`.
pub fn load_snapshot(config: &BlobCache, name: &str) -> Result<Option<PresetDict>> {
    match config.get(name)? {
        Some(bytes) => Ok(Some(JsonCodec.decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Slots that currently hold a snapshot.
pub fn saved_slots(config: &BlobCache) -> Vec<&'static str> {
    SNAPSHOT_SLOTS
        .iter()
        .copied()
        .filter(|slot| config.exists(slot))
        .collect()
}
