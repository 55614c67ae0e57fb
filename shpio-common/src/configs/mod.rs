use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

/// Library settings. Backed by an optional settings.json file in the working directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Configs {
    pub verbose_mode: bool,
    /// Defer reading each .shx entry until its record is first requested.
    pub lazy_index_loading: bool,
    /// Rebuild a missing .shx from the .shp record headers when opening.
    pub restore_index_if_missing: bool,
    pub max_record_count: u32,
    pub max_parts_per_record: u32,
    pub max_points_per_record: u32,
    /// Records at least this large have their extent checked against the
    /// real file length before a buffer is allocated for them.
    pub large_record_size: usize,
}

impl Configs {
    pub fn new() -> Configs {
        Configs {
            verbose_mode: false,
            lazy_index_loading: false,
            restore_index_if_missing: false,
            max_record_count: 256_000_000,
            max_parts_per_record: 10_000_000,
            max_points_per_record: 50_000_000,
            large_record_size: 10 * 1024 * 1024,
        }
    }

    pub fn from_file<P: AsRef<Path>>(file_name: P) -> Result<Configs, Error> {
        let contents = fs::read_to_string(file_name)?;
        Configs::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Configs, Error> {
        serde_json::from_str(contents).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Failed to parse settings.json file: {}", e),
            )
        })
    }
}

impl Default for Configs {
    fn default() -> Configs {
        Configs::new()
    }
}

fn config_file_path() -> Result<PathBuf, Error> {
    Ok(std::env::current_dir()?.join("settings.json"))
}

/// Reads settings.json from the working directory, falling back to the
/// defaults when the file does not exist.
pub fn get_configs() -> Result<Configs, Error> {
    let config_file = config_file_path()?;
    match Configs::from_file(&config_file) {
        Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(Configs::new()),
        result => result,
    }
}

pub fn save_configs(configs: &Configs) -> Result<(), Error> {
    let configs_json = serde_json::to_string_pretty(configs)
        .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
    fs::write(config_file_path()?, configs_json)
}
