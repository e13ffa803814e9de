use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::warn;

/// Complete, nested settings accepted by the seed generator.
pub type SeedGenDict = Map<String, Value>;

/// Flat, partial settings as used by the service's preset picker.
pub type PresetDict = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid seed generation settings: {0}")]
    Canonical(#[source] serde_json::Error),

    #[error("seed generation settings must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("unknown preset key '{0}'")]
    UnknownPresetKey(String),
}

/// A single option value. The service sends some options as strings and
/// others as numbers or booleans (crystal counts arrive either way), so the
/// JSON type is kept as received and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PresetScalar {
    Bool(bool),
    Num(Number),
    Str(String),
}

impl PresetScalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PresetScalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PresetScalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PresetScalar::Bool(b) => Value::Bool(*b),
            PresetScalar::Num(n) => Value::Number(n.clone()),
            PresetScalar::Str(s) => Value::String(s.clone()),
        }
    }

    /// `None` for null, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(PresetScalar::Bool(*b)),
            Value::Number(n) => Some(PresetScalar::Num(n.clone())),
            Value::String(s) => Some(PresetScalar::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PresetScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetScalar::Bool(b) => write!(f, "{b}"),
            PresetScalar::Num(n) => write!(f, "{n}"),
            PresetScalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PresetScalar {
    fn from(s: &str) -> Self {
        PresetScalar::Str(s.to_string())
    }
}

impl From<String> for PresetScalar {
    fn from(s: String) -> Self {
        PresetScalar::Str(s)
    }
}

impl From<bool> for PresetScalar {
    fn from(b: bool) -> Self {
        PresetScalar::Bool(b)
    }
}

impl From<u64> for PresetScalar {
    fn from(n: u64) -> Self {
        PresetScalar::Num(n.into())
    }
}

impl PartialEq<str> for PresetScalar {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for PresetScalar {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<bool> for PresetScalar {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

/// Links a field's canonical (seed generation) name to its preset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub canonical_name: &'static str,
    pub preset_name: &'static str,
}

/// Conversion between a value object and the flat preset schema.
///
/// Every value object owns its mapping table; nothing here recurses into
/// nested objects on the overlay side.
pub trait PresetConvertible: Sized {
    fn field_mappings() -> &'static [FieldMapping];

    /// Flattens this object into preset keys. Nested convertible fields are
    /// merged in at the same level under their own preset names.
    fn export_as_preset(&self) -> PresetDict;

    /// Returns a copy with every field whose preset name appears in `preset`
    /// replaced. Unrecognised keys, and recognised keys holding a value the
    /// field cannot take, are skipped.
    fn replace_from_preset(&self, preset: &PresetDict) -> Self;
}

/// Per-field behaviour used by the generated converters.
pub trait ConfigField: Sized {
    fn to_canonical(&self) -> Value;

    fn export_into(&self, preset_name: &'static str, out: &mut PresetDict);

    /// `None` when `value` cannot be stored in this field.
    fn from_preset_value(key: &str, value: &Value) -> Option<Self>;
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl ConfigField for PresetScalar {
    fn to_canonical(&self) -> Value {
        self.to_value()
    }

    fn export_into(&self, preset_name: &'static str, out: &mut PresetDict) {
        out.insert(preset_name.to_string(), self.to_value());
    }

    fn from_preset_value(key: &str, value: &Value) -> Option<Self> {
        let scalar = PresetScalar::from_value(value);
        if scalar.is_none() {
            warn!(key, found = json_kind(value), "ignoring non-scalar preset value");
        }
        scalar
    }
}

/// Declares a value object together with its static field descriptor table.
///
/// Each field is `pub name: Type = default` optionally followed by
/// `, preset = "preset_name"` when the preset schema renames it.
macro_rules! preset_config {
    (@preset_name $field:ident) => {
        stringify!($field)
    };
    (@preset_name $field:ident $preset:literal) => {
        $preset
    };
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                pub $field:ident : $ty:ty = $default:expr $(, preset = $preset:literal)?;
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: ($default).into(), )+
                }
            }
        }

        impl $name {
            const FIELD_MAPPINGS: &'static [FieldMapping] = &[
                $(
                    FieldMapping {
                        canonical_name: stringify!($field),
                        preset_name: preset_config!(@preset_name $field $($preset)?),
                    },
                )+
            ];

            /// Strict construction from a seed generation dict. Missing keys
            /// take their defaults, unknown keys are rejected.
            pub fn from_seed_gen_dict(dict: &SeedGenDict) -> Result<Self, ConfigError> {
                serde_json::from_value(Value::Object(dict.clone()))
                    .map_err(ConfigError::Canonical)
            }

            pub fn to_seed_gen_dict(&self) -> SeedGenDict {
                let mut out = SeedGenDict::new();
                $(
                    out.insert(
                        stringify!($field).to_string(),
                        ConfigField::to_canonical(&self.$field),
                    );
                )+
                out
            }
        }

        impl PresetConvertible for $name {
            fn field_mappings() -> &'static [FieldMapping] {
                Self::FIELD_MAPPINGS
            }

            fn export_as_preset(&self) -> PresetDict {
                let mut out = PresetDict::new();
                $(
                    ConfigField::export_into(
                        &self.$field,
                        preset_config!(@preset_name $field $($preset)?),
                        &mut out,
                    );
                )+
                out
            }

            fn replace_from_preset(&self, preset: &PresetDict) -> Self {
                let mut next = self.clone();
                $(
                    let key = preset_config!(@preset_name $field $($preset)?);
                    if let Some(value) = preset.get(key) {
                        if let Some(parsed) = ConfigField::from_preset_value(key, value) {
                            next.$field = parsed;
                        }
                    }
                )+
                next
            }
        }

        impl ConfigField for $name {
            fn to_canonical(&self) -> Value {
                Value::Object(self.to_seed_gen_dict())
            }

            fn export_into(&self, _preset_name: &'static str, out: &mut PresetDict) {
                out.extend(self.export_as_preset());
            }

            fn from_preset_value(key: &str, value: &Value) -> Option<Self> {
                let parsed = match value {
                    Value::Object(map) => Self::from_seed_gen_dict(map).ok(),
                    _ => None,
                };
                if parsed.is_none() {
                    warn!(key, found = json_kind(value), "ignoring malformed nested preset value");
                }
                parsed
            }
        }
    };
}

preset_config! {
    /// Crystal requirements. Usually digit strings, but `"random"` is a
    /// valid value and plain numbers show up too.
    pub struct CrystalConfig {
        pub ganon: PresetScalar = "7", preset = "ganon_open";
        pub tower: PresetScalar = "7", preset = "tower_open";
    }
}

preset_config! {
    pub struct ItemConfig {
        pub functionality: PresetScalar = "normal", preset = "item_functionality";
        pub pool: PresetScalar = "normal", preset = "item_pool";
    }
}

preset_config! {
    pub struct EnemizerConfig {
        pub boss_shuffle: PresetScalar = "none";
        pub enemy_damage: PresetScalar = "default";
        pub enemy_health: PresetScalar = "default";
        pub enemy_shuffle: PresetScalar = "none";
    }
}

preset_config! {
    /// Full seed generation settings. This is the canonical form; presets
    /// are a lossy projection of it.
    pub struct RandomizerConfig {
        pub accessibility: PresetScalar = "items";
        pub dungeon_items: PresetScalar = "standard";
        pub entrances: PresetScalar = "none", preset = "entrance_shuffle";
        pub glitches: PresetScalar = "none", preset = "glitches_required";
        pub goal: PresetScalar = "ganon";
        pub hints: PresetScalar = "on";
        pub item_placement: PresetScalar = "advanced";
        pub lang: PresetScalar = "en";
        pub mode: PresetScalar = "open", preset = "world_state";
        pub spoilers: PresetScalar = "off";
        pub tournament: PresetScalar = true;
        pub weapons: PresetScalar = "randomized";
        pub crystals: CrystalConfig = CrystalConfig::default();
        pub item: ItemConfig = ItemConfig::default();
        pub enemizer: EnemizerConfig = EnemizerConfig::default();
    }
}

/// Every preset key recognised by any of the four value objects.
pub fn known_preset_keys() -> impl Iterator<Item = &'static str> {
    RandomizerConfig::field_mappings()
        .iter()
        .chain(CrystalConfig::field_mappings())
        .chain(ItemConfig::field_mappings())
        .chain(EnemizerConfig::field_mappings())
        .map(|m| m.preset_name)
}

/// Sets one entry of a flat working preset. Only keys that some value
/// object maps are accepted; nested object names are not preset keys.
pub fn set_preset_value(
    preset: &mut PresetDict,
    key: &str,
    value: Value,
) -> Result<(), ConfigError> {
    let nested = ["crystals", "item", "enemizer"];
    if nested.contains(&key) || !known_preset_keys().any(|k| k == key) {
        return Err(ConfigError::UnknownPresetKey(key.to_string()));
    }
    preset.insert(key.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn preset(value: Value) -> PresetDict {
        match value {
            Value::Object(map) => map,
            _ => panic!("test preset must be an object"),
        }
    }

    #[test]
    fn mappings_default_to_canonical_name() {
        let mappings = EnemizerConfig::field_mappings();
        assert_eq!(mappings.len(), 4);
        assert!(mappings.iter().all(|m| m.canonical_name == m.preset_name));
    }

    #[test]
    fn mappings_keep_declaration_order_and_overrides() {
        let names: Vec<_> = RandomizerConfig::field_mappings()
            .iter()
            .map(|m| (m.canonical_name, m.preset_name))
            .collect();
        assert_eq!(names[0], ("accessibility", "accessibility"));
        assert_eq!(names[2], ("entrances", "entrance_shuffle"));
        assert_eq!(names[3], ("glitches", "glitches_required"));
        assert_eq!(names[8], ("mode", "world_state"));
        assert_eq!(names.last(), Some(&("enemizer", "enemizer")));
    }

    #[test]
    fn partial_overlay_changes_only_mapped_field() {
        let cfg = CrystalConfig::default();
        let next = cfg.replace_from_preset(&preset(json!({ "ganon_open": "3" })));
        assert_eq!(next.ganon, "3");
        assert_eq!(next.tower, "7");
        // the input config is untouched
        assert_eq!(cfg.ganon, "7");
    }

    #[test]
    fn empty_overlay_is_identity() {
        let mut cfg = RandomizerConfig::default();
        cfg.goal = "fast_ganon".into();
        cfg.crystals.tower = "random".into();
        assert_eq!(cfg.replace_from_preset(&PresetDict::new()), cfg);
    }

    #[test]
    fn top_level_overlay_does_not_touch_nested_objects() {
        let cfg = RandomizerConfig::default();
        let next = cfg.replace_from_preset(&preset(json!({
            "ganon_open": "0",
            "world_state": "inverted",
        })));
        assert_eq!(next.mode, "inverted");
        assert_eq!(next.crystals.ganon, "7");
    }

    #[test]
    fn preset_values_keep_their_json_type() {
        let next = CrystalConfig::default()
            .replace_from_preset(&preset(json!({ "ganon_open": 5, "tower_open": "random" })));
        assert_eq!(next.ganon, PresetScalar::from(5u64));
        assert_eq!(next.tower, "random");

        let next = RandomizerConfig::default()
            .replace_from_preset(&preset(json!({ "tournament": "false" })));
        assert_eq!(next.tournament, "false");
        assert_ne!(next.tournament, false);
    }

    #[test]
    fn non_scalar_preset_values_are_skipped() {
        let next = RandomizerConfig::default().replace_from_preset(&preset(json!({
            "goal": ["ganon"],
            "hints": null,
            "weapons": "swordless",
        })));
        assert_eq!(next.goal, "ganon");
        assert_eq!(next.hints, "on");
        assert_eq!(next.weapons, "swordless");
    }

    #[test]
    fn nested_object_under_its_own_key_is_built_strictly() {
        let next = RandomizerConfig::default()
            .replace_from_preset(&preset(json!({ "crystals": { "ganon": "2" } })));
        assert_eq!(next.crystals.ganon, "2");
        assert_eq!(next.crystals.tower, "7");

        let next = RandomizerConfig::default()
            .replace_from_preset(&preset(json!({ "crystals": { "ganon_open": "2" } })));
        assert_eq!(next.crystals, CrystalConfig::default());
    }

    #[test]
    fn export_flattens_nested_objects() {
        let exported = RandomizerConfig::default().export_as_preset();
        assert_eq!(exported.get("ganon_open"), Some(&json!("7")));
        assert_eq!(exported.get("item_pool"), Some(&json!("normal")));
        assert_eq!(exported.get("boss_shuffle"), Some(&json!("none")));
        assert_eq!(exported.get("world_state"), Some(&json!("open")));
        assert_eq!(exported.get("tournament"), Some(&json!(true)));
        assert!(!exported.contains_key("crystals"));
        assert!(!exported.contains_key("mode"));
        // 12 scalar top-level fields + 2 + 2 + 4 nested
        assert_eq!(exported.len(), 20);
    }

    #[test]
    fn seed_gen_dict_is_nested() {
        let dict = RandomizerConfig::default().to_seed_gen_dict();
        assert_eq!(dict.get("crystals"), Some(&json!({ "ganon": "7", "tower": "7" })));
        assert_eq!(dict.get("mode"), Some(&json!("open")));
        assert_eq!(dict.get("tournament"), Some(&json!(true)));
        assert_eq!(dict.len(), 15);
    }

    #[test]
    fn scalar_serde_is_untyped_json() {
        let values: Vec<PresetScalar> = serde_json::from_value(json!([7, "7", true])).unwrap();
        assert_eq!(
            values,
            vec![PresetScalar::from(7u64), PresetScalar::from("7"), PresetScalar::from(true)]
        );
        assert_eq!(serde_json::to_value(&values).unwrap(), json!([7, "7", true]));
        assert_eq!(values[0].to_string(), "7");
    }

    #[test]
    fn set_preset_value_only_accepts_known_keys() {
        let mut working = RandomizerConfig::default().export_as_preset();
        set_preset_value(&mut working, "tower_open", json!("4")).unwrap();
        assert_eq!(working.get("tower_open"), Some(&json!("4")));

        assert!(matches!(
            set_preset_value(&mut working, "not_a_field", json!(1)),
            Err(ConfigError::UnknownPresetKey(_))
        ));
        assert!(set_preset_value(&mut working, "crystals", json!({})).is_err());
    }
}
