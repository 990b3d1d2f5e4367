//! Merges configuration layers: defaults, an optional TOML file,
//! `PERIDOT_`-prefixed environment variables, then CLI flags.

use std::path::{Path, PathBuf};

use crate::cli::CliArgs;
use crate::error::ConfigResult;
use crate::ServerConfig;

const ENV_PREFIX: &str = "PERIDOT";

/// Builds a [`ServerConfig`] from defaults, a TOML file, environment
/// variables, and CLI flags, in increasing order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Sets the TOML file to read as the second layer. Missing files are
    /// silently skipped, matching the defaults-then-overlay model.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Overrides the environment variable prefix (default `PERIDOT`).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads and merges every layer, then applies `cli` on top.
    pub fn load(&self, cli: CliArgs) -> ConfigResult<ServerConfig> {
        let defaults = ServerConfig::default();
        let defaults_toml = toml::to_string(&defaults).expect("ServerConfig always serializes");

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(&defaults_toml, config::FileFormat::Toml));

        let file_path = cli.config.clone().or_else(|| self.file_path.clone());
        if let Some(path) = file_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let mut merged: ServerConfig = builder.build()?.try_deserialize()?;
        cli.apply(&mut merged);
        Ok(merged)
    }
}
