// src/config/loader.rs
//! Layered configuration loader
//!
//! Built-in defaults, then each configuration file in order, then
//! `GRIP__SECTION__KEY=value` environment overrides. The merged result is
//! validated before it is handed out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::constants::paths;
use crate::config::SystemConfig;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("configuration parse error: {0}")]
    ParseError(String),

    #[error("configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

#[derive(Debug, Clone)]
struct ConfigSource {
    path: PathBuf,
    required: bool,
}

/// Configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_overrides: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader over the optional default files in the working directory
    pub fn new() -> Self {
        Self::with_paths(vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ])
    }

    /// Loader over custom optional paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            sources: paths
                .into_iter()
                .map(|path| ConfigSource { path, required: false })
                .collect(),
            env_overrides: None,
        }
    }

    /// Add a file that must exist, layered over the earlier ones
    pub fn with_required_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource {
            path: path.as_ref().to_path_buf(),
            required: true,
        });
        self
    }

    /// Use a fixed variable map instead of the process environment
    pub fn with_env_overrides(mut self, vars: HashMap<String, String>) -> Self {
        self.env_overrides = Some(vars);
        self
    }

    /// Load and validate the system configuration
    pub fn load_system_config(&self) -> Result<SystemConfig, ConfigError> {
        let mut builder = config::Config::builder();

        for source in &self.sources {
            if source.required && !source.path.exists() {
                return Err(ConfigError::FileNotFound(source.path.display().to_string()));
            }
            debug!(path = %source.path.display(), exists = source.path.exists(), "configuration source");
            builder = builder.add_source(
                config::File::from(source.path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(source.required),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(paths::ENV_PREFIX)
                .separator(paths::ENV_SEPARATOR)
                .try_parsing(true)
                .source(self.env_overrides.clone()),
        );

        let config: SystemConfig = builder.build()?.try_deserialize()?;
        config
            .validate_consistency()
            .map_err(ConfigError::ValidationError)?;

        Ok(config)
    }

    /// Validate a configuration file without loading environment overrides
    pub fn validate_config_file<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        Self::with_paths(Vec::new())
            .with_required_file(path)
            .with_env_overrides(HashMap::new())
            .load_system_config()
            .map(|_| ())
    }

    /// Export a configuration as pretty TOML
    pub fn export_config<P: AsRef<Path>>(config: &SystemConfig, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.as_ref().display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn isolated(loader: ConfigLoader) -> ConfigLoader {
        loader.with_env_overrides(HashMap::new())
    }

    #[test]
    fn test_defaults_without_files() {
        let loader = isolated(ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/grip.toml")]));
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_later_files_override_earlier() {
        let base = write_toml("[acquisition]\nbuffer_capacity = 1024\nwindow_samples = 256\n");
        let local = write_toml("[acquisition]\nwindow_samples = 128\n");

        let loader = isolated(ConfigLoader::with_paths(vec![
            base.path().to_path_buf(),
            local.path().to_path_buf(),
        ]));
        let config = loader.load_system_config().unwrap();

        assert_eq!(config.acquisition.buffer_capacity, 1024);
        assert_eq!(config.acquisition.window_samples, 128);
    }

    #[test]
    fn test_environment_overrides_files() {
        let file = write_toml("[scheduler]\nrender_rate_hz = 30.0\n");
        let mut vars = HashMap::new();
        vars.insert("GRIP__SCHEDULER__RENDER_RATE_HZ".to_string(), "60".to_string());

        let config = ConfigLoader::with_paths(vec![file.path().to_path_buf()])
            .with_env_overrides(vars)
            .load_system_config()
            .unwrap();

        assert_eq!(config.scheduler.render_rate_hz, 60.0);
    }

    #[test]
    fn test_required_file_missing() {
        let loader = isolated(ConfigLoader::with_paths(Vec::new()).with_required_file("/nonexistent/grip.toml"));
        assert!(matches!(loader.load_system_config(), Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_toml("[acquisition]\nbuffer_capacity = 64\nwindow_samples = 128\n");
        let result = ConfigLoader::validate_config_file(file.path());

        match result {
            Err(ConfigError::ValidationError(errors)) => {
                assert!(errors.iter().any(|e| e.contains("window_samples")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let file = write_toml("[acquisition\nbuffer_capacity = ");
        assert!(matches!(
            ConfigLoader::validate_config_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_export_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exported.toml");

        ConfigLoader::export_config(&SystemConfig::default(), &path).unwrap();
        assert!(ConfigLoader::validate_config_file(&path).is_ok());
    }
}
