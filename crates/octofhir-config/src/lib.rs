//! Configuration for the canonical resolution context and the `$extract`
//! invoker.
//!
//! Values come from `octofhir.toml` (or an explicit path) and are overridden
//! by `OCTOFHIR__SECTION__KEY` environment variables.

use std::time::Duration;

use octofhir_core::FhirVersion;
use octofhir_transform::{FhirFormat, Isolation, TransformOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub transform: TransformSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Versions
        parse_version("context.working_version", &self.context.working_version)?;
        parse_version("transform.source_version", &self.transform.source_version)?;
        parse_version("transform.output_version", &self.transform.output_version)?;
        parse_version("packages.version", &self.packages.version)?;

        // Transform
        self.transform
            .default_format
            .parse::<FhirFormat>()
            .map_err(|_| "transform.default_format must be one of [\"json\", \"xml\"]".to_string())?;
        self.transform
            .isolation
            .parse::<Isolation>()
            .map_err(|_| "transform.isolation must be one of [\"scoped\", \"shared\"]".to_string())?;

        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }

        if let Some(dir) = &self.packages.store_dir
            && dir.trim().is_empty()
        {
            return Err("packages.store_dir must not be empty when set".into());
        }
        Ok(())
    }

    /// Options for a `TransformInvoker`. Call after [`validate`](Self::validate).
    pub fn transform_options(&self) -> Result<TransformOptions, String> {
        let t = &self.transform;
        Ok(TransformOptions {
            isolation: t.isolation.parse()?,
            promote_on_success: t.promote_on_success,
            default_format: t.default_format.parse().map_err(|e| format!("{e}"))?,
            source_version: parse_version("transform.source_version", &t.source_version)?,
            output_version: parse_version("transform.output_version", &t.output_version)?,
        })
    }
}

fn parse_version(key: &str, value: &str) -> Result<FhirVersion, String> {
    value
        .parse::<FhirVersion>()
        .map_err(|_| format!("{key} must be one of R4, R5 (got '{value}')"))
}

/// Settings for the shared resolution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Version every cached canonical is held in.
    #[serde(default = "default_working_version")]
    pub working_version: String,
    /// Upper bound on a single store lookup; 0 disables the limit.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_generate_snapshots")]
    pub generate_snapshots: bool,
}

fn default_working_version() -> String {
    "R5".to_string()
}
fn default_store_timeout_ms() -> u64 {
    5000
}
fn default_generate_snapshots() -> bool {
    true
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            working_version: default_working_version(),
            store_timeout_ms: default_store_timeout_ms(),
            generate_snapshots: default_generate_snapshots(),
        }
    }
}

impl ContextSettings {
    pub fn working_version(&self) -> Result<FhirVersion, String> {
        parse_version("context.working_version", &self.working_version)
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        (self.store_timeout_ms > 0).then(|| Duration::from_millis(self.store_timeout_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSettings {
    #[serde(default = "default_r4")]
    pub source_version: String,
    #[serde(default = "default_r4")]
    pub output_version: String,
    /// `json` or `xml`; used when a request has no acceptable format.
    #[serde(default = "default_format")]
    pub default_format: String,
    /// `scoped` or `shared`.
    #[serde(default = "default_isolation")]
    pub isolation: String,
    #[serde(default)]
    pub promote_on_success: bool,
}

fn default_r4() -> String {
    "R4".to_string()
}
fn default_format() -> String {
    "xml".to_string()
}
fn default_isolation() -> String {
    "scoped".to_string()
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            source_version: default_r4(),
            output_version: default_r4(),
            default_format: default_format(),
            isolation: default_isolation(),
            promote_on_success: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Where canonical resources are loaded from at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Directory of base definitions registered into the cache before use.
    #[serde(default)]
    pub base_dir: Option<String>,
    /// Directory backing the resource store.
    #[serde(default)]
    pub store_dir: Option<String>,
    /// Version the files in both directories are written in.
    #[serde(default = "default_r4")]
    pub version: String,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            store_dir: None,
            version: default_r4(),
        }
    }
}

impl PackagesConfig {
    pub fn version(&self) -> Result<FhirVersion, String> {
        parse_version("packages.version", &self.version)
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("octofhir.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // e.g. OCTOFHIR__CONTEXT__STORE_TIMEOUT_MS=250
        builder = builder.add_source(
            Environment::with_prefix("OCTOFHIR")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
