use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::input::decode_error_message;
use crate::CliError;

/// Connection settings for the admin API. An immutable value: every
/// change produces a fresh record through [`Settings::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub api_request_timeout: u64,
    pub shutdown_disabled: bool,
}

impl Settings {
    pub fn generate(host: String, api_request_timeout: u64, shutdown_disabled: bool) -> Self {
        Self {
            host,
            api_request_timeout,
            shutdown_disabled,
        }
    }

    /// Reads and validates a settings file. All three fields must be
    /// present and carry usable values; a file that parses as JSON but
    /// leaves the host empty or the timeout at zero is still an error.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|error| read_error(&error, path))?;
        let settings: Settings = serde_json::from_str(&text).map_err(|error| {
            CliError::Config(format!(
                "{}. File {}",
                decode_error_message(&error, &text),
                path.display()
            ))
        })?;

        if settings.host.is_empty() {
            return Err(CliError::Config(format!(
                "Default host not set in {}",
                path.display()
            )));
        }
        if settings.api_request_timeout == 0 {
            return Err(CliError::Config(format!(
                "api_request_timeout not set in {}",
                path.display()
            )));
        }
        Ok(settings)
    }

    pub fn write(&self, path: &Path) -> Result<(), CliError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|error| CliError::Config(format!("Unable to encode settings: {error}")))?;
        fs::write(path, text).map_err(|error| write_error(&error, path))
    }
}

fn read_error(error: &std::io::Error, path: &Path) -> CliError {
    let message = match error.kind() {
        ErrorKind::NotFound => format!("No such file {}", path.display()),
        ErrorKind::IsADirectory => format!("{} is a directory", path.display()),
        ErrorKind::PermissionDenied => {
            format!("Unable to read, permission denied {}", path.display())
        }
        _ => format!("Unable to read {}: {error}", path.display()),
    };
    CliError::Config(message)
}

fn write_error(error: &std::io::Error, path: &Path) -> CliError {
    let message = match error.kind() {
        ErrorKind::IsADirectory => format!("{} is a directory", path.display()),
        ErrorKind::PermissionDenied => {
            format!("Unable to write, permission denied {}", path.display())
        }
        _ => format!("Unable to write {}: {error}", path.display()),
    };
    CliError::Config(message)
}

/// Owns the settings file and the currently active record. Mutations
/// replace the record in memory first and only then persist it, so a
/// failed autosave never loses the change for the running invocation.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Option<Settings>,
    pub autosave: bool,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current: None,
            autosave: true,
        }
    }

    pub fn current(&self) -> Option<&Settings> {
        self.current.as_ref()
    }

    /// Replaces the current record from disk. On failure the previous
    /// record (usually none) is left untouched.
    pub fn load(&mut self) -> Result<(), CliError> {
        self.current = Some(Settings::load(&self.path)?);
        Ok(())
    }

    pub fn save(&self) -> Result<(), CliError> {
        match &self.current {
            Some(settings) => settings.write(&self.path),
            None => Err(CliError::Config(
                "No current settings found to save".to_owned(),
            )),
        }
    }

    fn autosaved(&self) -> Result<(), CliError> {
        if self.autosave {
            self.save()
        } else {
            Ok(())
        }
    }

    pub fn generate(
        &mut self,
        host: String,
        api_request_timeout: u64,
        shutdown_disabled: bool,
    ) -> Result<(), CliError> {
        self.current = Some(Settings::generate(
            host,
            api_request_timeout,
            shutdown_disabled,
        ));
        self.autosaved()
    }

    pub fn change_host(&mut self, host: String) -> Result<(), CliError> {
        let current = self.require_current()?;
        self.current = Some(Settings::generate(
            host,
            current.api_request_timeout,
            current.shutdown_disabled,
        ));
        self.autosaved()
    }

    pub fn change_timeout(&mut self, api_request_timeout: u64) -> Result<(), CliError> {
        let current = self.require_current()?;
        self.current = Some(Settings::generate(
            current.host,
            api_request_timeout,
            current.shutdown_disabled,
        ));
        self.autosaved()
    }

    pub fn enable_shutdown(&mut self) -> Result<(), CliError> {
        self.change_shutdown_disabled(false)
    }

    pub fn disable_shutdown(&mut self) -> Result<(), CliError> {
        self.change_shutdown_disabled(true)
    }

    fn change_shutdown_disabled(&mut self, shutdown_disabled: bool) -> Result<(), CliError> {
        let current = self.require_current()?;
        self.current = Some(Settings::generate(
            current.host,
            current.api_request_timeout,
            shutdown_disabled,
        ));
        self.autosaved()
    }

    fn require_current(&self) -> Result<Settings, CliError> {
        self.current
            .clone()
            .ok_or_else(|| CliError::Config("No current settings loaded".to_owned()))
    }
}

/// Per-platform location of the settings file.
pub fn config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("wmk").join("settings.json"))
        .ok_or_else(|| {
            CliError::Config(
                "Unable to determine a configuration directory for this platform".to_owned(),
            )
        })
}
