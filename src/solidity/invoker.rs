use super::input::CompilationInput;
use crate::{
    compiler::{CompilerHandle, CompilerModule, CompilerVersion},
    Error,
};
use anyhow::Context;
use std::{io::ErrorKind, path::Path, process::Stdio, time::Duration};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::instrument;

// `--standard-json` appeared in 0.4.11
const STANDARD_JSON_SINCE: semver::Version = semver::Version::new(0, 4, 11);

/// Runs a resolved compiler against standard-json input.
///
/// Without `compile_timeout` a hanging compiler blocks the caller forever.
#[derive(Clone, Debug, Default)]
pub struct CompilerInvoker {
    compile_timeout: Option<Duration>,
}

impl CompilerInvoker {
    pub fn new(compile_timeout: Option<Duration>) -> Self {
        Self { compile_timeout }
    }

    /// Returns raw compiler output.
    #[instrument(name = "invoke_compiler", skip(self, input), fields(version = %version), level = "debug")]
    pub async fn invoke(
        &self,
        handle: &CompilerHandle,
        version: &CompilerVersion,
        input: &CompilationInput,
    ) -> Result<String, Error> {
        let input = serde_json::to_string(input)
            .context("serializing compiler input")
            .map_err(Error::Internal)?;

        let invocation = async {
            match handle {
                CompilerHandle::Native(path) => {
                    if let Some(release) = version.release() {
                        if release < STANDARD_JSON_SINCE {
                            tracing::warn!(
                                target: "compiler_invoker",
                                version = %version,
                                "compiler version may not support --standard-json"
                            );
                        }
                    }
                    compile_native(path, &input).await
                }
                CompilerHandle::Module(module) => compile_module(module.as_ref(), &input).await,
            }
        };

        match self.compile_timeout {
            Some(timeout) => tokio::time::timeout(timeout, invocation)
                .await
                .map_err(|_| {
                    tracing::error!(
                        target: "compiler_invoker",
                        version = %version,
                        "compiler did not finish in {:?}",
                        timeout
                    );
                    Error::Timeout(timeout)
                })?,
            None => invocation.await,
        }
    }
}

async fn compile_native(path: &Path, input: &str) -> Result<String, Error> {
    let mut child = Command::new(path)
        .arg("--standard-json")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to execute {}", path.display()))
        .map_err(Error::Internal)?;

    let mut stdin = child
        .stdin
        .take()
        .context("compiler process has no stdin")
        .map_err(Error::Internal)?;
    let write_input = async move {
        let result = stdin.write_all(input.as_bytes()).await;
        drop(stdin);
        result
    };
    let (written, output) = tokio::join!(write_input, child.wait_with_output());
    let output = output
        .context("compiler process wait failed")
        .map_err(Error::Internal)?;
    match written {
        // the compiler may exit before reading its input; its output tells what happened
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {
            tracing::debug!(target: "compiler_invoker", "compiler closed its input early")
        }
        Err(err) => {
            return Err(Error::Internal(
                anyhow::Error::new(err).context("failed to write input into compiler stdin"),
            ))
        }
        Ok(()) => {}
    }

    if output.stdout.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!(
            target: "compiler_invoker",
            path = %path.display(),
            status = %output.status,
            stderr = %stderr,
            "compiler produced no output"
        );
        return Err(Error::Invocation {
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }

    String::from_utf8(output.stdout)
        .context("compiler output is not valid utf-8")
        .map_err(Error::Internal)
}

async fn compile_module(module: &dyn CompilerModule, input: &str) -> Result<String, Error> {
    match module.compile(input).await {
        Ok(output) if !output.is_empty() => Ok(output),
        Ok(_) => {
            tracing::error!(target: "compiler_invoker", "compiler module produced no output");
            Err(Error::Invocation { stderr: None })
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::error!(
                target: "compiler_invoker",
                error = %message,
                "compiler module failed"
            );
            Err(Error::Invocation {
                stderr: Some(message),
            })
        }
    }
}

#[cfg(all(test, target_family = "unix"))]
mod tests {
    use super::{super::input::Source, *};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::{
        collections::BTreeMap, os::unix::fs::PermissionsExt, path::PathBuf, str::FromStr,
        sync::Arc,
    };

    fn fake_compiler(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("solc-linux-amd64-vtest");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn input() -> CompilationInput {
        CompilationInput {
            language: "Solidity".to_string(),
            sources: BTreeMap::from([(
                "A.sol".to_string(),
                Source {
                    content: "contract A {}".to_string(),
                },
            )]),
            settings: serde_json::json!({}),
        }
    }

    fn version() -> CompilerVersion {
        CompilerVersion::from_str("0.8.9+commit.e5eed63a").unwrap()
    }

    #[tokio::test]
    async fn native_compiler_reads_input_from_stdin() {
        let dir = tempfile::tempdir().unwrap();
        // echoes the input back only when called with --standard-json
        let path = fake_compiler(dir.path(), r#"[ "$1" = "--standard-json" ] && cat"#);

        let output = CompilerInvoker::default()
            .invoke(&CompilerHandle::Native(path), &version(), &input())
            .await
            .unwrap();
        let output: CompilationInput = serde_json::from_str(&output).unwrap();
        assert_eq!(output, input());
    }

    #[tokio::test]
    async fn empty_output_is_an_invocation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_compiler(dir.path(), "echo 'internal compiler error' >&2; exit 1");

        let err = CompilerInvoker::default()
            .invoke(&CompilerHandle::Native(path), &version(), &input())
            .await
            .expect_err("compiler writes nothing to stdout");
        match err {
            Error::Invocation { stderr } => {
                assert_eq!(stderr.as_deref(), Some("internal compiler error"))
            }
            err => panic!("unexpected error: {err:?}"),
        }
    }

    #[tokio::test]
    async fn silent_compiler_is_an_invocation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_compiler(dir.path(), "cat > /dev/null");

        let err = CompilerInvoker::default()
            .invoke(&CompilerHandle::Native(path), &version(), &input())
            .await
            .expect_err("compiler writes nothing at all");
        assert!(matches!(err, Error::Invocation { stderr: None }), "{err:?}");
    }

    #[tokio::test]
    async fn missing_executable_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompilerInvoker::default()
            .invoke(
                &CompilerHandle::Native(dir.path().join("does-not-exist")),
                &version(),
                &input(),
            )
            .await
            .expect_err("nothing to execute");
        assert!(matches!(err, Error::Internal(_)), "{err:?}");
    }

    #[tokio::test]
    async fn hanging_compiler_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_compiler(dir.path(), "sleep 30");
        let timeout = Duration::from_millis(200);

        let err = CompilerInvoker::new(Some(timeout))
            .invoke(&CompilerHandle::Native(path), &version(), &input())
            .await
            .expect_err("compiler hangs");
        assert!(matches!(err, Error::Timeout(t) if t == timeout), "{err:?}");
    }

    struct StaticModule(Result<&'static str, &'static str>);

    #[async_trait]
    impl CompilerModule for StaticModule {
        async fn compile(&self, _input: &str) -> Result<String, anyhow::Error> {
            self.0
                .map(|output| output.to_string())
                .map_err(|err| anyhow::anyhow!(err))
        }
    }

    #[tokio::test]
    async fn module_compiler() {
        let invoker = CompilerInvoker::default();
        let handle = CompilerHandle::Module(Arc::new(StaticModule(Ok(r#"{"contracts":{}}"#))));
        let output = invoker.invoke(&handle, &version(), &input()).await.unwrap();
        assert_eq!(output, r#"{"contracts":{}}"#);

        let handle = CompilerHandle::Module(Arc::new(StaticModule(Err("abort(OOM)"))));
        let err = invoker
            .invoke(&handle, &version(), &input())
            .await
            .expect_err("module fails");
        assert_eq!(err.to_string(), "compiler produced no output");
        assert!(matches!(err, Error::Invocation { stderr: Some(s) } if s == "abort(OOM)"));
    }
}
