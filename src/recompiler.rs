use crate::{
    compiler::{CompilerLocator, CompilerVersion},
    settings::Settings,
    solidity::{self, CompilerInvoker, InputFormatter, MetadataFormatter, RecompilationResult},
    Error,
};
use anyhow::{anyhow, Context};
use serde_json::Value;
use std::{collections::BTreeMap, str::FromStr, sync::Arc};

/// Recompiles contracts from their metadata with the compiler version the
/// metadata names.
pub struct Recompiler {
    locator: Arc<CompilerLocator>,
    formatter: Arc<dyn InputFormatter>,
    invoker: CompilerInvoker,
}

impl Recompiler {
    pub fn new(
        locator: Arc<CompilerLocator>,
        formatter: Arc<dyn InputFormatter>,
        invoker: CompilerInvoker,
    ) -> Self {
        Self {
            locator,
            formatter,
            invoker,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let locator = CompilerLocator::from_settings(&settings.compilers)?;
        Ok(Self::new(
            Arc::new(locator),
            Arc::new(MetadataFormatter),
            CompilerInvoker::new(settings.compilers.compile_timeout),
        ))
    }

    pub async fn recompile(
        &self,
        metadata: &Value,
        sources: &BTreeMap<String, String>,
    ) -> Result<RecompilationResult, Error> {
        let version = compiler_version(metadata).map_err(Error::Input)?;
        let formatted = self
            .formatter
            .format(metadata, sources)
            .map_err(Error::Input)?;

        tracing::info!(
            target: "recompiler",
            version = %version,
            file_name = %formatted.file_name,
            contract_name = %formatted.contract_name,
            "recompiling contract"
        );

        let compiler = self.locator.locate(&version).await?;
        let output = self
            .invoker
            .invoke(&compiler, &version, &formatted.input)
            .await?;
        solidity::extract(
            &output,
            &formatted.file_name,
            &formatted.contract_name,
            &version,
        )
    }
}

fn compiler_version(metadata: &Value) -> anyhow::Result<CompilerVersion> {
    let version = metadata
        .pointer("/compiler/version")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("metadata has no compiler version"))?;
    CompilerVersion::from_str(version).context("invalid compiler version")
}
