use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the optional config file looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "cnc-suite.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SuiteConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_materials_file")]
    pub materials_file: String,
    #[serde(default = "default_elements_file")]
    pub elements_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            materials_file: default_materials_file(),
            elements_file: default_elements_file(),
        }
    }
}

impl StorageConfig {
    pub fn materials_path(&self) -> PathBuf {
        self.data_dir.join(&self.materials_file)
    }

    pub fn elements_path(&self) -> PathBuf {
        self.data_dir.join(&self.elements_file)
    }
}

fn default_materials_file() -> String {
    "materials.json".to_string()
}
fn default_elements_file() -> String {
    "elements.json".to_string()
}

/// Per-user application data directory for the plugin.
///
/// `%APPDATA%\RhinoCncSuite` on Windows, `$XDG_DATA_HOME/rhino-cnc-suite`
/// or `~/.local/share/rhino-cnc-suite` elsewhere, and `./rhino-cnc-suite`
/// as a last resort.
pub fn default_data_dir() -> PathBuf {
    if let Some(appdata) = std::env::var_os("APPDATA") {
        return PathBuf::from(appdata).join("RhinoCncSuite");
    }
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("rhino-cnc-suite");
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("rhino-cnc-suite");
    }
    PathBuf::from("rhino-cnc-suite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaletteConfig {
    /// Length of the line inserted for Length and SolidWood stock (mm).
    #[serde(default = "default_profile_length")]
    pub profile_length_mm: f64,
    /// User-string key prefix stamped on host objects (`Material_Id`, ...).
    #[serde(default = "default_attribute_prefix")]
    pub attribute_prefix: String,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            profile_length_mm: default_profile_length(),
            attribute_prefix: default_attribute_prefix(),
        }
    }
}

fn default_profile_length() -> f64 {
    3000.0
}
fn default_attribute_prefix() -> String {
    "Material_".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `CNC_SUITE_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Include the event target (module path) in each line.
    #[serde(default)]
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            with_target: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl SuiteConfig {
    /// Config rooted at `data_dir` with every other setting defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = data_dir.into();
        config
    }
}

pub fn load_config(path: &Path) -> Result<SuiteConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: SuiteConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.storage.materials_file.trim().is_empty() {
        anyhow::bail!("storage.materials_file must not be empty");
    }
    if config.storage.elements_file.trim().is_empty() {
        anyhow::bail!("storage.elements_file must not be empty");
    }
    if config.storage.materials_file == config.storage.elements_file {
        anyhow::bail!("storage.materials_file and storage.elements_file must differ");
    }

    let profile = config.palette.profile_length_mm;
    if profile.is_nan() || profile <= 0.0 {
        anyhow::bail!("palette.profile_length_mm must be > 0");
    }

    if config.palette.attribute_prefix.trim().is_empty() {
        anyhow::bail!("palette.attribute_prefix must not be empty");
    }

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_or_default(path: &Path) -> Result<SuiteConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(SuiteConfig::default())
    }
}
