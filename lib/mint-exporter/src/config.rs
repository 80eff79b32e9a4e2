//! Exporter configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    error::Kind,
    providers::{Env, Format as _, Yaml},
    Figment,
};
use http::Uri;
use mint_protocol::Dimension;
use serde::Deserialize;
use snafu::Snafu;
use tracing::debug;

use crate::{metadata::METADATA_INDIRECTION_FILE, ErrorContext as _, GenericError};

/// Default ingest endpoint: the metric ingest API of a local host agent.
pub const DEFAULT_INGEST_URL: &str = "http://localhost:14499/metrics/ingest";

fn default_url() -> String {
    DEFAULT_INGEST_URL.to_string()
}

const fn default_enrich_with_metadata() -> bool {
    true
}

fn default_metadata_file() -> PathBuf {
    PathBuf::from(METADATA_INDIRECTION_FILE)
}

const fn default_export_interval_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    20
}

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration.", field))]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// Field had an unexpected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Ingest URL could not be parsed.
    #[snafu(display("Invalid ingest URL '{}': {}", url, source))]
    InvalidUrl {
        /// Configured URL.
        url: String,

        /// Error source.
        source: http::uri::InvalidUri,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to load configuration: {}", source))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match &e.kind {
            Kind::MissingField(field) => Self::MissingField {
                field: field.to_string(),
            },
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty: expected_ty.clone(),
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e.into() },
        }
    }
}

/// A configuration loader that can pull from YAML files and environment variables.
///
/// Sources added later take precedence over sources added earlier.
#[derive(Default)]
pub struct ConfigurationLoader {
    figment: Figment,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, an error will be returned. Syntax errors are reported when the configuration is
    /// deserialized.
    pub fn from_yaml<P>(self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_error_context(|| format!("Failed to read configuration file '{}'.", path.display()))
            .map_err(|source| ConfigurationError::Generic { source })?;

        Ok(Self {
            figment: self.figment.merge(Yaml::string(&contents)),
        })
    }

    /// Attempts to load the given YAML configuration file, ignoring it if it cannot be read.
    pub fn try_from_yaml<P>(self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self {
                figment: self.figment.merge(Yaml::string(&contents)),
            },
            Err(e) => {
                debug!(error = %e, file_path = %path.display(), "Unable to read YAML configuration file. Ignoring.");
                self
            }
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with one. For example, with a
    /// prefix of `MINT`, the environment variable `MINT_API_TOKEN` sets the `api_token` field.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error will be returned.
    pub fn from_environment(self, prefix: &str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_string()
        } else {
            format!("{}_", prefix)
        };

        Ok(Self {
            figment: self.figment.merge(Env::prefixed(&prefix)),
        })
    }

    /// Deserializes the loaded configuration into `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.figment.extract().map_err(Into::into)
    }
}

/// A dimension added to every exported metric.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ConfiguredDimension {
    key: String,
    value: String,
}

/// Exporter configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct MintExporterConfiguration {
    /// Ingest endpoint URL.
    ///
    /// Defaults to the metric ingest API of a local host agent.
    #[serde(default = "default_url")]
    url: String,

    /// API token used to authenticate with the ingest endpoint.
    ///
    /// Not required when sending to a local host agent.
    #[serde(default)]
    api_token: Option<String>,

    /// Prefix prepended to every metric key.
    #[serde(default)]
    prefix: Option<String>,

    /// Dimensions added to every exported metric, in order.
    #[serde(default)]
    default_dimensions: Vec<ConfiguredDimension>,

    /// Whether to enrich metrics with process metadata dimensions.
    ///
    /// Defaults to `true`.
    #[serde(default = "default_enrich_with_metadata")]
    enrich_with_metadata: bool,

    /// Path of the process metadata indirection file.
    ///
    /// Defaults to the well-known file name, relative to the working directory.
    #[serde(default = "default_metadata_file")]
    metadata_file: PathBuf,

    /// Interval between periodic exports, in seconds.
    ///
    /// Exports are scheduled by the caller; this is only surfaced for it. Defaults to 60 seconds.
    #[serde(default = "default_export_interval_secs")]
    export_interval_secs: u64,

    /// Per-request timeout, in seconds.
    ///
    /// Defaults to 20 seconds.
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

impl MintExporterConfiguration {
    /// Creates a new `MintExporterConfiguration` from the given configuration loader.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, an error will be returned.
    pub fn from_loader(loader: &ConfigurationLoader) -> Result<Self, ConfigurationError> {
        let config = loader.into_typed::<Self>()?;

        // Validate the URL up front rather than on first use.
        config.endpoint()?;

        Ok(config)
    }

    /// Sets the ingest endpoint URL.
    pub fn with_url<U>(mut self, url: U) -> Self
    where
        U: Into<String>,
    {
        self.url = url.into();
        self
    }

    /// Sets the API token.
    pub fn with_api_token<T>(mut self, api_token: T) -> Self
    where
        T: Into<String>,
    {
        self.api_token = Some(api_token.into());
        self
    }

    /// Sets the metric key prefix.
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: Into<String>,
    {
        self.prefix = Some(prefix.into());
        self
    }

    /// Adds a default dimension.
    pub fn with_default_dimension<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.default_dimensions.push(ConfiguredDimension {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Sets whether to enrich metrics with process metadata dimensions.
    pub fn with_metadata_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_with_metadata = enabled;
        self
    }

    /// Sets the path of the process metadata indirection file.
    pub fn with_metadata_file<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.metadata_file = path.into();
        self
    }

    /// Returns the ingest endpoint.
    ///
    /// # Errors
    ///
    /// If the configured URL is not a valid URI, an error will be returned.
    pub fn endpoint(&self) -> Result<Uri, ConfigurationError> {
        self.url.parse().map_err(|source| ConfigurationError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }

    /// Returns the API token, if any.
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Returns the metric key prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the default dimensions, in order.
    pub fn default_dimensions(&self) -> Vec<Dimension> {
        self.default_dimensions
            .iter()
            .map(|dimension| Dimension::new(dimension.key.clone(), dimension.value.clone()))
            .collect()
    }

    /// Returns whether metrics are enriched with process metadata dimensions.
    pub const fn enrich_with_metadata(&self) -> bool {
        self.enrich_with_metadata
    }

    /// Returns the path of the process metadata indirection file.
    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Returns the interval between periodic exports.
    pub const fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }

    /// Returns the per-request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MintExporterConfiguration {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_token: None,
            prefix: None,
            default_dimensions: Vec::new(),
            enrich_with_metadata: default_enrich_with_metadata(),
            metadata_file: default_metadata_file(),
            export_interval_secs: default_export_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
