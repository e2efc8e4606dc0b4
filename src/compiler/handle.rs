use anyhow::Context;
use async_trait::async_trait;
use std::{
    fmt::{Debug, Formatter},
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};
use tokio::{io::AsyncWriteExt, process::Command};

/// A compiler build that runs standard-json input without a native executable.
#[async_trait]
pub trait CompilerModule: Send + Sync {
    async fn compile(&self, input: &str) -> Result<String, anyhow::Error>;
}

/// Turns a module file found on disk into something that can compile.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Arc<dyn CompilerModule>, anyhow::Error>;
}

/// A resolved compiler, ready to be invoked.
#[derive(Clone)]
pub enum CompilerHandle {
    Native(PathBuf),
    Module(Arc<dyn CompilerModule>),
}

impl Debug for CompilerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CompilerHandle::Native(path) => f.debug_tuple("Native").field(path).finish(),
            CompilerHandle::Module(_) => f.write_str("Module(..)"),
        }
    }
}

// Emscripten builds expose `solidity_compile` since 0.5.0 and
// `compileStandard` between 0.4.11 and 0.5.0.
const BOOTSTRAP: &str = r#"
const soljson = require(process.argv[1]);
const name = soljson._solidity_compile ? "solidity_compile" : "compileStandard";
const compile = soljson.cwrap(name, "string", ["string", "number", "number"]);
const input = require("fs").readFileSync(0, "utf8");
process.stdout.write(compile(input, 0, 0));
"#;

/// Loads `soljson` builds and runs them inside a JavaScript runtime process.
#[derive(Clone, Debug)]
pub struct NodeModuleLoader {
    runtime: PathBuf,
}

impl NodeModuleLoader {
    pub fn new(runtime: impl Into<PathBuf>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }
}

#[async_trait]
impl ModuleLoader for NodeModuleLoader {
    async fn load(&self, path: &Path) -> Result<Arc<dyn CompilerModule>, anyhow::Error> {
        let module = tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("module file {} is not accessible", path.display()))?;
        Ok(Arc::new(NodeModule {
            runtime: self.runtime.clone(),
            module,
        }))
    }
}

struct NodeModule {
    runtime: PathBuf,
    module: PathBuf,
}

#[async_trait]
impl CompilerModule for NodeModule {
    async fn compile(&self, input: &str) -> Result<String, anyhow::Error> {
        let mut child = Command::new(&self.runtime)
            .arg("-e")
            .arg(BOOTSTRAP)
            .arg(&self.module)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run {}", self.runtime.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .context("module process has no stdin")?;
        stdin
            .write_all(input.as_bytes())
            .await
            .context("failed to write input into module process stdin")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("module process wait failed")?;
        if !output.status.success() {
            anyhow::bail!(
                "module process exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8(output.stdout).context("module output is not valid utf-8")
    }
}
