//! Resolution tiers tried, in order, to obtain a runnable compiler:
//! cached native binary, downloaded native binary, cached compiler module
//! and downloaded compiler module.

use super::{
    fetcher::{write_file, FetchError, Fetcher},
    handle::{CompilerHandle, ModuleLoader},
    version::CompilerVersion,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use url::Url;

#[async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the tier has no compiler for the version and the next one should be tried.
    async fn resolve(&self, ver: &CompilerVersion) -> Result<Option<CompilerHandle>, FetchError>;
}

/// Makes `url.join(..)` append to the path instead of replacing the last segment.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn file_url(base: &Url, name: &str) -> Result<Url, url::ParseError> {
    let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    base.join(&encoded)
}

async fn find_file(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    for dir in dirs {
        let path = dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => return Some(path),
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(
                    target: "compiler_locator",
                    path = %path.display(),
                    "cannot access cached compiler: {}",
                    err
                );
            }
        }
    }
    None
}

/// Native binaries already present on disk.
pub struct CachedBinary {
    dirs: Vec<PathBuf>,
}

impl CachedBinary {
    /// `dirs` are searched in the given order.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

#[async_trait]
impl Resolver for CachedBinary {
    fn name(&self) -> &'static str {
        "cached binary"
    }

    async fn resolve(&self, ver: &CompilerVersion) -> Result<Option<CompilerHandle>, FetchError> {
        let path = find_file(&self.dirs, &ver.native_file_name()).await;
        Ok(path.map(CompilerHandle::Native))
    }
}

/// Native binaries downloaded from the public archive.
///
/// Any failure here is only logged, so that module tiers get their chance.
pub struct RemoteBinary {
    client: reqwest::Client,
    archive_url: Url,
    download_dir: PathBuf,
}

impl RemoteBinary {
    pub fn new(client: reqwest::Client, archive_url: Url, download_dir: PathBuf) -> Self {
        Self {
            client,
            archive_url: with_trailing_slash(archive_url),
            download_dir,
        }
    }

    async fn download(&self, ver: &CompilerVersion) -> Result<Option<PathBuf>, anyhow::Error> {
        let name = ver.native_file_name();
        let url = file_url(&self.archive_url, &name).context("building download url")?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?;
        if response.status() != StatusCode::OK {
            tracing::info!(
                target: "compiler_locator",
                version = %ver,
                status = %response.status(),
                "native binary is not available in the archive"
            );
            return Ok(None);
        }
        let data = response.bytes().await.context("reading response body")?;
        let path = write_file(data, &self.download_dir, &name, true).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl Resolver for RemoteBinary {
    fn name(&self) -> &'static str {
        "remote binary"
    }

    async fn resolve(&self, ver: &CompilerVersion) -> Result<Option<CompilerHandle>, FetchError> {
        match self.download(ver).await {
            Ok(path) => Ok(path.map(CompilerHandle::Native)),
            Err(err) => {
                tracing::warn!(
                    target: "compiler_locator",
                    version = %ver,
                    "native binary download failed: {:#}",
                    err
                );
                Ok(None)
            }
        }
    }
}

/// Compiler modules already present on disk.
pub struct CachedModule {
    dirs: Vec<PathBuf>,
    loader: Arc<dyn ModuleLoader>,
}

impl CachedModule {
    pub fn new(dirs: Vec<PathBuf>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self { dirs, loader }
    }
}

#[async_trait]
impl Resolver for CachedModule {
    fn name(&self) -> &'static str {
        "cached module"
    }

    async fn resolve(&self, ver: &CompilerVersion) -> Result<Option<CompilerHandle>, FetchError> {
        let path = match find_file(&self.dirs, &ver.module_file_name()).await {
            Some(path) => path,
            None => return Ok(None),
        };
        match self.loader.load(&path).await {
            Ok(module) => Ok(Some(CompilerHandle::Module(module))),
            Err(err) => {
                tracing::warn!(
                    target: "compiler_locator",
                    version = %ver,
                    path = %path.display(),
                    "cannot load cached compiler module: {:#}",
                    err
                );
                Ok(None)
            }
        }
    }
}

/// Compiler modules downloaded from the module registry. The last tier:
/// a failed download here fails the whole resolution.
pub struct RemoteModule {
    client: reqwest::Client,
    registry_url: Url,
    download_dir: PathBuf,
    loader: Arc<dyn ModuleLoader>,
}

impl RemoteModule {
    pub fn new(
        client: reqwest::Client,
        registry_url: Url,
        download_dir: PathBuf,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self {
            client,
            registry_url: with_trailing_slash(registry_url),
            download_dir,
            loader,
        }
    }

    async fn load(&self, path: &Path) -> Result<CompilerHandle, FetchError> {
        let module = self.loader.load(path).await.map_err(FetchError::Module)?;
        Ok(CompilerHandle::Module(module))
    }
}

#[async_trait]
impl Resolver for RemoteModule {
    fn name(&self) -> &'static str {
        "remote module"
    }

    async fn resolve(&self, ver: &CompilerVersion) -> Result<Option<CompilerHandle>, FetchError> {
        let name = ver.module_file_name();
        let url = file_url(&self.registry_url, &name)
            .map_err(|err| FetchError::Fetch(anyhow::Error::new(err)))?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("requesting {url}"))
            .map_err(FetchError::Fetch)?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(FetchError::Fetch(anyhow::anyhow!(
                    "module registry returned {status} for {url}"
                )))
            }
            _ => {}
        }

        let data = response
            .bytes()
            .await
            .context("reading response body")
            .map_err(FetchError::Fetch)?;
        let path = write_file(data, &self.download_dir, &name, false).await?;
        self.load(&path).await.map(Some)
    }
}

/// Tries every tier in order; the first one to return a compiler wins.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl Fetcher for ResolverChain {
    async fn fetch(&self, ver: &CompilerVersion) -> Result<CompilerHandle, FetchError> {
        for resolver in &self.resolvers {
            if let Some(handle) = resolver.resolve(ver).await? {
                tracing::info!(
                    target: "compiler_locator",
                    version = %ver,
                    tier = resolver.name(),
                    compiler = ?handle,
                    "compiler resolved"
                );
                return Ok(handle);
            }
            tracing::debug!(
                target: "compiler_locator",
                version = %ver,
                tier = resolver.name(),
                "compiler not found"
            );
        }
        Err(FetchError::NotFound(ver.clone()))
    }
}
