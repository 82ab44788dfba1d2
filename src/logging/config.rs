//! Logging configuration
//!
//! Global and per-component log levels plus the output destinations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in console logs
    pub include_file_location: bool,

    /// Level for the registration engine
    pub registration_level: String,

    /// Level for resampling and interpolation
    pub resample_level: String,

    /// Level for the registration backends and the optimizer
    pub backend_level: String,

    /// Level for the foreign-callable entry points
    pub bindings_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            registration_level: "info".to_string(),
            resample_level: "info".to_string(),
            backend_level: "info".to_string(),
            bindings_level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose logging with file output under `logs/`
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            registration_level: "debug".to_string(),
            resample_level: "debug".to_string(),
            backend_level: "trace".to_string(),
            bindings_level: "debug".to_string(),
        }
    }

    /// Warnings only, written to files
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("/var/log/image-registration")),
            include_file_location: false,
            registration_level: "info".to_string(),
            resample_level: "warn".to_string(),
            backend_level: "warn".to_string(),
            bindings_level: "warn".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let levels = [
            ("global_level", &self.global_level),
            ("registration_level", &self.registration_level),
            ("resample_level", &self.resample_level),
            ("backend_level", &self.backend_level),
            ("bindings_level", &self.bindings_level),
        ];
        for (name, level) in levels {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!("Invalid {}: {}. Must be one of: {:?}", name, level, VALID_LEVELS));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Get the effective log level for a specific component
    pub fn get_component_level(&self, component: &str) -> &str {
        match component {
            "registration" => &self.registration_level,
            "resample" | "interpolation" => &self.resample_level,
            "backend" | "algorithms" => &self.backend_level,
            "bindings" => &self.bindings_level,
            _ => &self.global_level,
        }
    }

    /// `EnvFilter` directives: the global level for the crate, overridden per module
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        let mut directives = vec![format!("{krate}={}", self.global_level)];
        for (module, component) in [
            ("registration", "registration"),
            ("resample", "resample"),
            ("interpolation", "interpolation"),
            ("algorithms", "backend"),
            ("bindings", "bindings"),
        ] {
            directives.push(format!("{krate}::{module}={}", self.get_component_level(component)));
        }
        directives.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let development = LoggingConfig::development();
        assert_eq!(development.backend_level, "trace");
        assert!(development.include_file_location);

        let production = LoggingConfig::production();
        assert_eq!(production.global_level, "warn");
        assert!(!production.console_output);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggingConfig::default();
        config.backend_level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("backend_level"));

        config.backend_level = "debug".to_string();
        config.log_directory = Some(PathBuf::from("/no/such/parent/logs"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_levels_become_directives() {
        let config = LoggingConfig::development();
        assert_eq!(config.get_component_level("algorithms"), "trace");
        assert_eq!(config.get_component_level("unknown"), "debug");

        let directives = config.filter_directives();
        assert!(directives.starts_with("image_registration=debug"));
        assert!(directives.contains("image_registration::algorithms=trace"));
    }
}
