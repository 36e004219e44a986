use crate::error::{AppError, Result};
use crate::sheets::{SheetRange, ValueRender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_PREFIX: &str = "sheets2csv";
pub const DEFAULT_CELL_RANGE: &str = "A1:ZZ";

/// Optional defaults read from `$XDG_CONFIG_HOME/sheets2csv/config.toml`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub client_secret: Option<PathBuf>,
    pub sheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub cell_range: Option<String>,
    pub token_cache: Option<PathBuf>,
    pub value_render: Option<ValueRender>,
}

impl Config {
    /// Load the config file if there is one; a missing file means no defaults.
    pub fn load() -> Result<Self> {
        match Self::config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Path of the config file, if one exists
    pub fn config_file() -> Option<PathBuf> {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX).find_config_file("config.toml")
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub client_secret: Option<PathBuf>,
    pub sheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub cell_range: Option<String>,
    pub token_cache: Option<PathBuf>,
    pub value_render: Option<ValueRender>,
    /// Positional `[SPREADSHEET_ID] [SHEET_NAME] [CELL_RANGE]`, consumed in
    /// order for whichever of those was not given as a flag.
    pub positional: Vec<String>,
}

/// Everything one export needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub client_secret: PathBuf,
    pub spreadsheet_id: String,
    pub range: SheetRange,
    pub token_cache: Option<PathBuf>,
    pub value_render: ValueRender,
}

impl ExportSettings {
    pub fn resolve(overrides: Overrides, config: Config) -> Result<Self> {
        if overrides.positional.len() > 3 {
            return Err(AppError::Config(format!(
                "expected at most three arguments (SPREADSHEET_ID SHEET_NAME CELL_RANGE), got {}",
                overrides.positional.len()
            )));
        }
        let mut positional = overrides.positional.into_iter().map(|s| s.trim().to_string());

        let spreadsheet_id = overrides
            .sheet_id
            .or_else(|| positional.next())
            .or(config.sheet_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::Config(
                    "a spreadsheet ID is required (--sheet-id, GOOGLE_SHEET_ID or first argument)"
                        .to_string(),
                )
            })?;
        let sheet_name = overrides
            .sheet_name
            .or_else(|| positional.next())
            .or(config.sheet_name);
        let cell_range = overrides
            .cell_range
            .or_else(|| positional.next())
            .or(config.cell_range)
            .unwrap_or_else(|| DEFAULT_CELL_RANGE.to_string());

        let client_secret = overrides
            .client_secret
            .or(config.client_secret)
            .ok_or_else(|| {
                AppError::Config(
                    "a client secret JSON file is required (--client-secret or GOOGLE_CLIENT_SECRET_JSON)"
                        .to_string(),
                )
            })?;

        Ok(Self {
            client_secret,
            spreadsheet_id,
            range: SheetRange::new(sheet_name, cell_range),
            token_cache: overrides.token_cache.or(config.token_cache),
            value_render: overrides
                .value_render
                .or(config.value_render)
                .unwrap_or_default(),
        })
    }
}
