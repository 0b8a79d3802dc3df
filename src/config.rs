use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::commands::{Bindings, ChordTable};

pub const CONFIG_DIR_VAR: &str = "STRATA_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "strata.toml";
pub const SESSION_STARTUP_VAR: &str = "STRATA_SESSION_STARTUP";
pub const SESSION_SHUTDOWN_VAR: &str = "STRATA_SESSION_SHUTDOWN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid command option: {0}")]
    InvalidCommand(String),
    #[error("Unrecognised key in command option: {0}")]
    UnrecognisedKey(String),
    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub shell_component: Vec<String>,
    pub shell_meta: Vec<String>,
    pub shell_ctrl_alt: Vec<String>,
    pub shell_alt: Vec<String>,
    pub meta: Vec<String>,
    pub ctrl_alt: Vec<String>,
    pub alt: Vec<String>,
    pub lockscreen_app: Option<String>,
    pub lockscreen_on_idle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell_component: Vec::new(),
            shell_meta: Vec::new(),
            shell_ctrl_alt: Vec::new(),
            shell_alt: Vec::new(),
            meta: Vec::new(),
            ctrl_alt: Vec::new(),
            alt: Vec::new(),
            lockscreen_app: None,
            lockscreen_on_idle: true,
        }
    }
}

/// `(key, type, description)` for the documentation written next to a fresh install.
const OPTIONS: &[(&str, &str, &str)] = &[
    (
        "shell-component",
        "string[]",
        "Shell component to launch on startup",
    ),
    (
        "shell-meta",
        "string[]",
        "meta <key>:<command> shortcut with shell privileges",
    ),
    (
        "shell-ctrl-alt",
        "string[]",
        "ctrl-alt <key>:<command> shortcut with shell privileges",
    ),
    (
        "shell-alt",
        "string[]",
        "alt <key>:<command> shortcut with shell privileges",
    ),
    ("meta", "string[]", "meta <key>:<command> shortcut"),
    ("ctrl-alt", "string[]", "ctrl-alt <key>:<command> shortcut"),
    ("alt", "string[]", "alt <key>:<command> shortcut"),
    (
        "lockscreen-app",
        "string",
        "Lockscreen app to be triggered when the session is locked",
    ),
    (
        "lockscreen-on-idle",
        "bool",
        "Trigger the lockscreen on idle timeout (default: true)",
    ),
];

impl Config {
    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Reads the config at `path`, which must exist.
    pub fn load_existing(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_existing(path) {
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            result => result,
        }
    }

    pub fn bindings(&self) -> Result<Bindings, ConfigError> {
        Ok(Bindings {
            ctrl_alt: ChordTable::parse(&self.shell_ctrl_alt, &self.ctrl_alt)?,
            meta: ChordTable::parse(&self.shell_meta, &self.meta)?,
            alt: ChordTable::parse(&self.shell_alt, &self.alt)?,
        })
    }

    pub fn shell_components(&self) -> Result<Vec<Vec<String>>, ConfigError> {
        self.shell_component.iter().map(|it| split_command(it)).collect()
    }

    pub fn lockscreen_command(&self) -> Result<Option<Vec<String>>, ConfigError> {
        self.lockscreen_app.as_deref().map(split_command).transpose()
    }
}

fn split_command(command: &str) -> Result<Vec<String>, ConfigError> {
    shell_words::split(command)
        .ok()
        .filter(|argv| !argv.is_empty())
        .ok_or_else(|| ConfigError::InvalidCommand(command.to_owned()))
}

pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_DIR_VAR) {
        Some(dir) => PathBuf::from(dir).join(CONFIG_FILE_NAME),
        None => default_config_dir().join(CONFIG_FILE_NAME),
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
}

/// Writes a commented template listing every option, unless `path` already exists.
/// Returns whether a file was written.
pub fn write_documented_defaults(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut doc = std::io::BufWriter::new(std::fs::File::create_new(path)?);
    writeln!(doc, "# Options for strata. Uncomment to change the defaults.")?;
    writeln!(doc)?;
    for (key, ty, description) in OPTIONS {
        writeln!(doc, "# {ty}: {description}")?;
        match *ty {
            "string[]" => writeln!(doc, "#{key} = []")?,
            "bool" => writeln!(doc, "#{key} = true")?,
            _ => writeln!(doc, "#{key} = \"\"")?,
        }
        writeln!(doc)?;
    }
    doc.flush()?;
    Ok(true)
}
