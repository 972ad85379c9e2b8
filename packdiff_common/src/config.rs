use crate::{AppConfig, PackDiffError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "packdiff.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

/// Load the default configuration file, falling back to defaults when absent
pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig, PackDiffError> {
    let (path, portable) = resolve_config_path(prefer_portable)?;
    let exists = path.exists();

    let mut config = if exists {
        parse_config_file(&path)?
    } else {
        AppConfig::default()
    };

    config.portable_mode = portable;

    Ok(LoadedConfig {
        config,
        path,
        exists,
        portable,
    })
}

/// Load an explicitly named configuration file. A missing file is an error.
pub fn load_config_from(path: &Path) -> Result<LoadedConfig, PackDiffError> {
    if !path.is_file() {
        return Err(PackDiffError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    Ok(LoadedConfig {
        config: parse_config_file(path)?,
        path: path.to_path_buf(),
        exists: true,
        portable: false,
    })
}

/// Load the default configuration, writing the defaults when no file exists yet
pub fn ensure_config(prefer_portable: bool) -> Result<LoadedConfig, PackDiffError> {
    let loaded = load_config(prefer_portable)?;
    if !loaded.exists {
        save_config(&loaded.path, &loaded.config)?;
    }
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), PackDiffError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| PackDiffError::Serialization(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

/// TOML by default; `.json` files are read as JSON (camelCase keys accepted)
fn parse_config_file(path: &Path) -> Result<AppConfig, PackDiffError> {
    let data = fs::read_to_string(path).map_err(|e| PackDiffError::io_at(path, e))?;
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&data)
            .map_err(|e| PackDiffError::Serialization(format!("{}: {}", path.display(), e)))
    } else {
        toml::from_str(&data)
            .map_err(|e| PackDiffError::Serialization(format!("{}: {}", path.display(), e)))
    }
}

fn resolve_config_path(prefer_portable: bool) -> Result<(PathBuf, bool), PackDiffError> {
    if let Some(portable_path) = portable_config_path() {
        if prefer_portable || portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    let dirs = ProjectDirs::from("", "packdiff", "packdiff")
        .ok_or_else(|| PackDiffError::Config("Unable to determine config directory".to_string()))?;
    Ok((dirs.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
