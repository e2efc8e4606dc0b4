use crate::consts::{
    DEFAULT_JS_RUNTIME, DEFAULT_MODULE_REGISTRY, DEFAULT_NATIVE_ARCHIVE, DOWNLOAD_DIR_NAME,
};
use anyhow::anyhow;
use config::{Config, File};
use serde::{de::IgnoredAny, Deserialize};
use serde_with::{serde_as, DurationSeconds};
use std::{path::PathBuf, time::Duration};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub compilers: CompilersSettings,
    pub tracing: TracingSettings,

    // Is required as we deny unknown fields, but allow users provide
    // path to config through PREFIX__CONFIG env variable. If removed,
    // the setup would fail with `unknown field `config`, expected one of...`
    #[serde(rename = "config")]
    pub config_path: IgnoredAny,
}

impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.compilers == other.compilers && self.tracing == other.tracing
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilersSettings {
    /// Primary repository of native compiler binaries.
    pub native_dir: PathBuf,
    /// Repository of compiler modules (`soljson-<version>.js`).
    pub module_dir: PathBuf,
    /// Where downloaded compilers are stored. Searched before the repositories.
    pub download_dir: PathBuf,
    pub archive_url: Url,
    pub module_registry_url: Url,
    /// Executable used to host compiler modules.
    pub js_runtime: PathBuf,
    /// Applies to every remote request. No timeout if unset.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub fetch_timeout: Option<Duration>,
    /// Applies to a single compiler invocation. No timeout if unset.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub compile_timeout: Option<Duration>,
}

impl Default for CompilersSettings {
    fn default() -> Self {
        let temp_dir = std::env::temp_dir();
        Self {
            native_dir: temp_dir.join("solc-compilers"),
            module_dir: temp_dir.join("solc-modules"),
            download_dir: temp_dir.join(DOWNLOAD_DIR_NAME),
            archive_url: Url::try_from(DEFAULT_NATIVE_ARCHIVE).expect("valid url"),
            module_registry_url: Url::try_from(DEFAULT_MODULE_REGISTRY).expect("valid url"),
            js_runtime: PathBuf::from(DEFAULT_JS_RUNTIME),
            fetch_timeout: None,
            compile_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    #[default]
    Default,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingSettings {
    pub enabled: bool,
    pub format: TracingFormat,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: Default::default(),
        }
    }
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let config_path = std::env::var("SOLC_RECOMPILER__CONFIG");

        let mut builder = Config::builder();
        if let Ok(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        };
        // Use `__` so that it would be possible to address keys with underscores in names (e.g. `native_dir`)
        builder = builder
            .add_source(config::Environment::with_prefix("SOLC_RECOMPILER").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("archive_url", &self.compilers.archive_url),
            ("module_registry_url", &self.compilers.module_registry_url),
        ] {
            if url.cannot_be_a_base() {
                return Err(anyhow!("`{name}` cannot be used as a base url: {url}"));
            }
        }
        Ok(())
    }
}
