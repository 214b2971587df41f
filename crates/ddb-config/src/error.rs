//! Configuration loading errors.

use thiserror::Error;

/// Errors raised while reading or parsing a `ddb` YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The path that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file's contents are not valid YAML, or don't match the schema.
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A recognized key held a value outside its accepted set (e.g. an
    /// unrecognized `Conf.on_exit`).
    #[error("invalid value for `{key}`: {value}")]
    InvalidValue {
        /// The offending key's path, e.g. `"Conf.on_exit"`.
        key: String,
        /// The value that failed validation.
        value: String,
    },
}

/// Convenience result alias.
pub type ConfigResult<T> = Result<T, ConfigError>;
