use anyhow::Context;
use clap::Parser;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Contract metadata json.
    #[clap(long)]
    pub metadata: PathBuf,
    /// Directory with the source files, keyed by their paths relative to it.
    #[clap(long)]
    pub sources: PathBuf,
    /// On-chain deployed bytecode to compare the result with.
    #[clap(long)]
    pub reference: Option<String>,
}

pub async fn read_metadata(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading metadata from {}", path.display()))?;
    serde_json::from_str(&content).context("metadata is not valid json")
}

/// Reads every file under `root`. Keys use `/` as the separator.
pub async fn read_sources(root: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("reading directory {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                dirs.push(path);
            } else {
                files.push(path);
            }
        }
    }

    let sources = futures::future::try_join_all(files.into_iter().map(|path| async move {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading source file {}", path.display()))?;
        let name = path
            .strip_prefix(root)?
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok::<_, anyhow::Error>((name, content))
    }))
    .await?;
    Ok(sources.into_iter().collect())
}
