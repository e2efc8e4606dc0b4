use super::{
    fetcher::{FetchError, Fetcher},
    handle::CompilerHandle,
    version::CompilerVersion,
};
use std::{collections::HashMap, sync::Arc};
use tracing::Instrument;

type Entry = Arc<tokio::sync::RwLock<Option<CompilerHandle>>>;

/// Remembers resolved compilers so that each version is resolved once.
///
/// Resolution of one version never blocks requests for other versions.
#[derive(Default)]
pub struct DownloadCache {
    cache: parking_lot::Mutex<HashMap<CompilerVersion, Entry>>,
}

impl DownloadCache {
    async fn try_get(&self, ver: &CompilerVersion) -> Option<CompilerHandle> {
        let entry = {
            let cache = self.cache.lock();
            cache.get(ver).cloned()
        };
        match entry {
            Some(lock) => {
                let handle = lock.read().await;
                handle.as_ref().cloned()
            }
            None => None,
        }
    }

    pub async fn get<D: Fetcher + ?Sized>(
        &self,
        fetcher: &D,
        ver: &CompilerVersion,
    ) -> Result<CompilerHandle, FetchError> {
        match self.try_get(ver).await {
            Some(handle) => Ok(handle),
            None => {
                let span = tracing::debug_span!("resolve compiler", ver = %ver);
                self.fetch(fetcher, ver).instrument(span).await
            }
        }
    }

    async fn fetch<D: Fetcher + ?Sized>(
        &self,
        fetcher: &D,
        ver: &CompilerVersion,
    ) -> Result<CompilerHandle, FetchError> {
        let lock = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(ver.clone()).or_default())
        };
        let mut entry = lock.write().await;
        if let Some(handle) = entry.as_ref() {
            return Ok(handle.clone());
        }

        tracing::debug!(target: "compiler_cache", "resolving compiler version {}", ver);
        match fetcher.fetch(ver).await {
            Ok(handle) => {
                *entry = Some(handle.clone());
                Ok(handle)
            }
            Err(err) => {
                drop(entry);
                self.forget(ver, &lock);
                Err(err)
            }
        }
    }

    /// Drops the entry of a version that failed to resolve, unless someone
    /// is resolving it right now. Versions come from untrusted metadata.
    fn forget(&self, ver: &CompilerVersion, lock: &Entry) {
        let mut cache = self.cache.lock();
        let unresolved = cache.get(ver).map_or(false, |current| {
            Arc::ptr_eq(current, lock)
                && current
                    .try_read()
                    .map(|handle| handle.is_none())
                    .unwrap_or(false)
        });
        if unresolved {
            cache.remove(ver);
        }
    }
}
