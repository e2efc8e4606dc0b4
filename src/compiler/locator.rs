use super::{
    download_cache::DownloadCache,
    fetcher::{FetchError, Fetcher},
    handle::{CompilerHandle, ModuleLoader, NodeModuleLoader},
    resolvers::{CachedBinary, CachedModule, RemoteBinary, RemoteModule, ResolverChain},
    version::CompilerVersion,
};
use crate::settings::CompilersSettings;
use anyhow::Context;
use std::sync::Arc;
use tracing::instrument;

/// Resolves compiler versions into runnable compilers and remembers the result.
pub struct CompilerLocator {
    cache: DownloadCache,
    fetcher: Arc<dyn Fetcher>,
}

impl CompilerLocator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            cache: Default::default(),
            fetcher,
        }
    }

    pub fn from_settings(settings: &CompilersSettings) -> anyhow::Result<Self> {
        let loader = Arc::new(NodeModuleLoader::new(&settings.js_runtime));
        Self::with_loader(settings, loader)
    }

    /// Standard tier order, with compiler modules loaded by `loader`.
    pub fn with_loader(
        settings: &CompilersSettings,
        loader: Arc<dyn ModuleLoader>,
    ) -> anyhow::Result<Self> {
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = settings.fetch_timeout {
            client = client.timeout(timeout);
        }
        let client = client.build().context("building http client")?;

        let download_dir = settings.download_dir.clone();
        let chain = ResolverChain::new(vec![
            Box::new(CachedBinary::new(vec![
                download_dir.clone(),
                settings.native_dir.clone(),
            ])),
            Box::new(RemoteBinary::new(
                client.clone(),
                settings.archive_url.clone(),
                download_dir.clone(),
            )),
            Box::new(CachedModule::new(
                vec![download_dir.clone(), settings.module_dir.clone()],
                loader.clone(),
            )),
            Box::new(RemoteModule::new(
                client,
                settings.module_registry_url.clone(),
                download_dir,
                loader,
            )),
        ]);
        Ok(Self::new(Arc::new(chain)))
    }

    #[instrument(name = "locate_compiler", skip(self), fields(version = %ver), level = "debug")]
    pub async fn locate(&self, ver: &CompilerVersion) -> Result<CompilerHandle, FetchError> {
        self.cache.get(self.fetcher.as_ref(), ver).await
    }
}
