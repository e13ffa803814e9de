use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use alttpr_core::config::set_preset_value;
use alttpr_core::convert::{complete_preset, from_seed_gen_value};
use alttpr_core::service::SETTINGS_KEY;
use alttpr_core::snapshot::{load_snapshot, save_snapshot, saved_slots, SNAPSHOT_SLOTS};
use alttpr_core::{
    from_preset_dict, store_base_image, to_preset_dict, to_seed_gen_dict, Caches, PatchApplier,
    PresetDict, RandomizerConfig, RandomizerSettings, ReconstructionError,
};

use crate::{Command, Schema};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn run(command: Command, caches: &Caches) -> CliResult {
    match command {
        Command::Defaults { schema } => print_config(&RandomizerConfig::default(), schema),
        Command::Convert { from, to, file } => convert(&file, from, to),
        Command::ImportSettings { file } => import_settings(caches, &file),
        Command::Presets => list_presets(caches),
        Command::Save { slot, preset, file } => {
            save(caches, &slot, preset.as_deref(), file.as_deref())
        }
        Command::Load { slot, schema } => load(caches, &slot, schema),
        Command::Set { slot, key, value } => set(caches, &slot, &key, value),
        Command::Slots => {
            for slot in saved_slots(&caches.config) {
                println!("{slot}");
            }
            Ok(())
        }
        Command::BaseRom { path } => register_base_rom(caches, &path),
        Command::CacheDir => {
            println!("{}", caches.root().display());
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_config(config: &RandomizerConfig, schema: Schema) -> CliResult {
    let dict = match schema {
        Schema::SeedGen => to_seed_gen_dict(config),
        Schema::Preset => to_preset_dict(config),
    };
    print_json(&Value::Object(dict))
}

fn read_object(path: &Path) -> CliResult<PresetDict> {
    let value: Value = serde_json::from_slice(&fs::read(path)?)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(format!("{} does not contain a JSON object", path.display()).into()),
    }
}

fn convert(file: &Path, from: Schema, to: Schema) -> CliResult {
    let config = match from {
        Schema::SeedGen => {
            let value: Value = serde_json::from_slice(&fs::read(file)?)?;
            from_seed_gen_value(&value)?
        }
        Schema::Preset => from_preset_dict(&read_object(file)?),
    };
    print_config(&config, to)
}

fn cached_settings(caches: &Caches) -> CliResult<Option<RandomizerSettings>> {
    match caches.misc.get(SETTINGS_KEY)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn require_settings(caches: &Caches) -> CliResult<RandomizerSettings> {
    cached_settings(caches)?
        .ok_or_else(|| "no cached randomizer settings, run `import-settings` first".into())
}

fn import_settings(caches: &Caches, file: &Path) -> CliResult {
    let settings: RandomizerSettings = serde_json::from_slice(&fs::read(file)?)?;
    caches.misc.put(SETTINGS_KEY, &serde_json::to_vec(&settings)?)?;
    info!(presets = settings.presets.len(), "cached randomizer settings");
    Ok(())
}

fn list_presets(caches: &Caches) -> CliResult {
    for name in require_settings(caches)?.preset_names() {
        println!("{name}");
    }
    Ok(())
}

fn save(caches: &Caches, slot: &str, preset: Option<&str>, file: Option<&Path>) -> CliResult {
    if !SNAPSHOT_SLOTS.contains(&slot) {
        warn!(slot, "saving outside the usual snapshot slots");
    }

    let source = match (preset, file) {
        (Some(name), _) => {
            let settings = require_settings(caches)?;
            settings
                .preset(name)
                .cloned()
                .ok_or_else(|| format!("unknown preset '{name}'"))?
        }
        (None, Some(path)) => read_object(path)?,
        (None, None) => return Err("either --preset or --file is required".into()),
    };

    // presets leave options out, store the completed form
    save_snapshot(&caches.config, slot, &complete_preset(&source))?;
    info!(slot, "saved snapshot");
    Ok(())
}

fn load(caches: &Caches, slot: &str, schema: Schema) -> CliResult {
    let preset = load_snapshot(&caches.config, slot)?
        .ok_or_else(|| format!("slot '{slot}' is empty"))?;
    print_config(&from_preset_dict(&preset), schema)
}

fn set(caches: &Caches, slot: &str, key: &str, value: String) -> CliResult {
    if let Some(settings) = cached_settings(caches)? {
        if let Some(choices) = settings.choices(key) {
            if !choices.iter().any(|(allowed, _)| *allowed == value) {
                let allowed: Vec<_> = choices.into_iter().map(|(v, _)| v).collect();
                return Err(format!(
                    "'{value}' is not a valid {key}, expected one of: {}",
                    allowed.join(", ")
                )
                .into());
            }
        }
    }

    let mut preset = match load_snapshot(&caches.config, slot)? {
        Some(preset) => preset,
        None => to_preset_dict(&RandomizerConfig::default()),
    };
    set_preset_value(&mut preset, key, Value::String(value))?;
    save_snapshot(&caches.config, slot, &complete_preset(&preset))?;
    info!(slot, key, "updated snapshot");
    Ok(())
}

/// Unheadered and copier-headered sizes of the 1 MiB Japan 1.0 image.
const BASE_ROM_SIZES: [usize; 2] = [0x10_0000, 0x10_0200];

/// The CLI has no patch library; it only registers the base image.
struct BaseRomCheck;

impl PatchApplier for BaseRomCheck {
    fn apply(
        &self,
        _image: &[u8],
        _patch: &[u8],
    ) -> std::result::Result<Vec<u8>, ReconstructionError> {
        Err(ReconstructionError::Patch(
            "no patch library is available to the command line tool".to_string(),
        ))
    }

    fn validate_base(&self, image: &[u8]) -> std::result::Result<(), ReconstructionError> {
        if BASE_ROM_SIZES.contains(&image.len()) {
            Ok(())
        } else {
            Err(ReconstructionError::Patch(format!(
                "a base ROM is {} or {} bytes, got {}",
                BASE_ROM_SIZES[0],
                BASE_ROM_SIZES[1],
                image.len()
            )))
        }
    }
}

fn register_base_rom(caches: &Caches, path: &Path) -> CliResult {
    let bytes = fs::read(path)?;
    store_base_image(&caches.misc, &BaseRomCheck, &bytes)?;
    info!(path = %path.display(), len = bytes.len(), "stored base ROM");
    Ok(())
}
