//! Conversion between the seed generation schema and the preset schema.
//!
//! The seed generation dict is canonical: strict to read, total to write.
//! Preset dicts are flat and partial, so reading one overlays defaults and
//! never fails: keys no value object maps, and values a field cannot take,
//! are skipped.

use serde_json::Value;

use crate::config::{
    json_kind, ConfigError, PresetConvertible, PresetDict, RandomizerConfig, SeedGenDict,
};

pub fn from_seed_gen_dict(dict: &SeedGenDict) -> Result<RandomizerConfig, ConfigError> {
    RandomizerConfig::from_seed_gen_dict(dict)
}

/// Same as [`from_seed_gen_dict`] for input that has not been checked to be
/// an object yet, e.g. freshly parsed JSON.
pub fn from_seed_gen_value(value: &Value) -> Result<RandomizerConfig, ConfigError> {
    match value {
        Value::Object(map) => from_seed_gen_dict(map),
        other => Err(ConfigError::NotAnObject {
            found: json_kind(other),
        }),
    }
}

pub fn to_seed_gen_dict(config: &RandomizerConfig) -> SeedGenDict {
    config.to_seed_gen_dict()
}

/// Builds a config from defaults and a flat preset.
///
/// Each nested object is overlaid separately against the same preset and
/// reassigned; the top-level overlay never recurses on its own.
pub fn from_preset_dict(preset: &PresetDict) -> RandomizerConfig {
    let mut config = RandomizerConfig::default().replace_from_preset(preset);
    config.crystals = config.crystals.replace_from_preset(preset);
    config.item = config.item.replace_from_preset(preset);
    config.enemizer = config.enemizer.replace_from_preset(preset);
    config
}

pub fn to_preset_dict(config: &RandomizerConfig) -> PresetDict {
    config.export_as_preset()
}

/// Fills in every option a preset leaves out by importing it and exporting
/// the result again.
pub fn complete_preset(preset: &PresetDict) -> PresetDict {
    to_preset_dict(&from_preset_dict(preset))
}
