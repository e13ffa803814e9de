//! Seams to the remote randomizer service and the patch library.
//!
//! Nothing in this crate speaks HTTP or decodes patches. Callers plug in
//! implementations of these traits; every method is a plain blocking call
//! and is invoked at most once per request, without retries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::BlobCache;
use crate::config::{PresetDict, SeedGenDict};
use crate::memo::memoize_json;
use crate::rebuild::ReconstructionError;
use crate::Result;

/// `misc` key the settings fetch is memoized under.
pub const SETTINGS_KEY: &str = "randomizer_settings";

/// Pseudo-preset the service lists alongside the real ones.
const CUSTOM_PRESET: &str = "custom";

/// Everything the service's settings endpoint returns: one map of
/// `value -> description` per option, plus the named presets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomizerSettings {
    #[serde(default)]
    pub presets: BTreeMap<String, PresetDict>,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

impl RandomizerSettings {
    pub fn preset(&self, name: &str) -> Option<&PresetDict> {
        self.presets.get(name)
    }

    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets
            .keys()
            .map(String::as_str)
            .filter(|name| *name != CUSTOM_PRESET)
    }

    /// Allowed `(value, description)` pairs for a preset key, if the
    /// service describes it.
    pub fn choices(&self, preset_key: &str) -> Option<Vec<(String, String)>> {
        let described = self.options.get(preset_key)?.as_object()?;
        Some(
            described
                .iter()
                .map(|(value, desc)| {
                    let desc = match desc {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (value.clone(), desc)
                })
                .collect(),
        )
    }
}

/// One generated seed as handed back by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub hash: String,
    /// Item icons shown on the file select screen.
    pub code: Vec<String>,
    /// Hash of the base image revision the base patch targets.
    pub current_rom_hash: String,
    /// Byte size of the finished image.
    pub size: usize,
    /// Absent when the service expects the caller to have it cached.
    pub base_patch: Option<Vec<u8>>,
    pub patch: Vec<u8>,
    pub checksum_patch: Option<Vec<u8>>,
}

pub trait SettingsProvider {
    fn fetch_settings(&self) -> Result<RandomizerSettings>;
}

pub trait SeedGenerator {
    fn generate(&self, settings: &SeedGenDict) -> Result<Seed>;
}

/// The patch library. Its failures stay opaque and surface as
/// [`ReconstructionError`].
pub trait PatchApplier {
    fn apply(
        &self,
        image: &[u8],
        patch: &[u8],
    ) -> std::result::Result<Vec<u8>, ReconstructionError>;

    /// Grows `image` to `size` bytes, zero filled.
    fn expand(
        &self,
        mut image: Vec<u8>,
        size: usize,
    ) -> std::result::Result<Vec<u8>, ReconstructionError> {
        if image.len() > size {
            return Err(ReconstructionError::Expand {
                have: image.len(),
                want: size,
            });
        }
        image.resize(size, 0);
        Ok(image)
    }

    /// Checks that `image` is the unmodified game this applier expects.
    fn validate_base(&self, _image: &[u8]) -> std::result::Result<(), ReconstructionError> {
        Ok(())
    }
}

/// Settings fetch memoized in `misc`; the provider is called only when no
/// copy has ever been stored.
pub fn fetch_settings_cached<P>(provider: &P, misc: &BlobCache) -> Result<RandomizerSettings>
where
    P: SettingsProvider + ?Sized,
{
    memoize_json(misc, SETTINGS_KEY, || provider.fetch_settings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Caches;
    use serde_json::json;
    use std::cell::Cell;

    fn sample_settings() -> RandomizerSettings {
        serde_json::from_value(json!({
            "goal": { "ganon": "Defeat Ganon", "fast_ganon": "Fast Ganon" },
            "ganon_open": { "7": "7 crystals", "random": "Random" },
            "presets": {
                "default": { "goal": "ganon", "ganon_open": "7" },
                "open": { "world_state": "open", "ganon_open": 7 },
                "custom": {},
            },
        }))
        .unwrap()
    }

    struct CountingProvider {
        calls: Cell<u32>,
    }

    impl SettingsProvider for CountingProvider {
        fn fetch_settings(&self) -> Result<RandomizerSettings> {
            self.calls.set(self.calls.get() + 1);
            Ok(sample_settings())
        }
    }

    #[test]
    fn settings_split_presets_from_options() {
        let settings = sample_settings();
        assert_eq!(settings.presets.len(), 3);
        assert!(settings.options.contains_key("goal"));
        assert!(!settings.options.contains_key("presets"));
        assert_eq!(settings.preset("open").unwrap().get("ganon_open"), Some(&json!(7)));
    }

    #[test]
    fn preset_names_skip_custom() {
        let settings = sample_settings();
        let names: Vec<_> = settings.preset_names().collect();
        assert_eq!(names, vec!["default", "open"]);
    }

    #[test]
    fn choices_list_values_with_descriptions() {
        let settings = sample_settings();
        let choices = settings.choices("goal").unwrap();
        assert!(choices.contains(&("fast_ganon".to_string(), "Fast Ganon".to_string())));
        assert!(settings.choices("hints").is_none());
    }

    #[test]
    fn settings_fetch_is_memoized() {
        let tmp = tempfile::tempdir().unwrap();
        let caches = Caches::open(tmp.path());
        let provider = CountingProvider { calls: Cell::new(0) };

        let first = fetch_settings_cached(&provider, &caches.misc).unwrap();
        let second = fetch_settings_cached(&provider, &caches.misc).unwrap();

        assert_eq!(provider.calls.get(), 1);
        assert_eq!(first, second);
        assert!(caches.misc.exists(SETTINGS_KEY));
    }

    struct Noop;

    impl PatchApplier for Noop {
        fn apply(
            &self,
            image: &[u8],
            _patch: &[u8],
        ) -> std::result::Result<Vec<u8>, ReconstructionError> {
            Ok(image.to_vec())
        }
    }

    #[test]
    fn default_expand_pads_and_refuses_to_shrink() {
        assert_eq!(Noop.expand(vec![1, 2], 4).unwrap(), vec![1, 2, 0, 0]);
        assert!(matches!(
            Noop.expand(vec![1, 2, 3], 2),
            Err(ReconstructionError::Expand { have: 3, want: 2 })
        ));
    }
}
