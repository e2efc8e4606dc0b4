use super::{handle::CompilerHandle, version::CompilerVersion};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("solc not found: {0}")]
    NotFound(CompilerVersion),
    #[error("couldn't fetch the file: {0:#}")]
    Fetch(anyhow::Error),
    #[error("couldn't create file: {0}")]
    File(#[from] std::io::Error),
    #[error("tokio sheduling error: {0}")]
    Schedule(#[from] tokio::task::JoinError),
    #[error("couldn't load compiler module: {0:#}")]
    Module(anyhow::Error),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, ver: &CompilerVersion) -> Result<CompilerHandle, FetchError>;
}

#[cfg(target_family = "unix")]
fn create_file(path: &Path, executable: bool) -> Result<File, std::io::Error> {
    use std::os::unix::prelude::{OpenOptionsExt, PermissionsExt};

    let mode = if executable { 0o755 } else { 0o644 };
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    // `mode` above is filtered by umask
    file.set_permissions(std::fs::Permissions::from_mode(mode))?;
    Ok(file)
}

#[cfg(not(target_family = "unix"))]
fn create_file(path: &Path, _executable: bool) -> Result<File, std::io::Error> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

/// Replaces `folder/name` with `data`, creating the folder tree if needed.
///
/// Concurrent writers of the same file are tolerated: the content is the
/// same download, so whoever finishes last wins.
pub async fn write_file(
    data: Bytes,
    folder: &Path,
    name: &str,
    executable: bool,
) -> Result<PathBuf, FetchError> {
    let folder = folder.to_path_buf();
    let file = folder.join(name);

    let span = tracing::debug_span!("save file", path = %file.display());
    {
        let file = file.clone();
        tokio::task::spawn_blocking(move || -> Result<(), FetchError> {
            let _guard = span.enter();
            std::fs::create_dir_all(&folder)?;
            std::fs::remove_file(file.as_path()).or_else(|e| {
                if e.kind() == ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
            let mut file = create_file(file.as_path(), executable)?;
            std::io::copy(&mut data.as_ref(), &mut file)?;
            Ok(())
        })
        .await??;
    }

    Ok(file)
}
