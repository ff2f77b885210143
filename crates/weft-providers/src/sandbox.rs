//! Remote code-execution sandbox seam, plus a process-backed local
//! implementation and the scoped acquisition helper.

use std::future::Future;
use std::path::{Component, Path};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Parameters for acquiring a sandbox.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub runtime: String,
    pub timeout: Duration,
}

/// Combined output of one sandbox command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Interleaved stdout/stderr as a single text blob.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// A live, exclusively-owned execution environment.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn mk_dir(&self, path: &str) -> anyhow::Result<()>;

    async fn run_command(&self, cmd: &str, args: &[String]) -> anyhow::Result<CommandOutput>;

    /// Release the sandbox. Further commands must fail.
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Acquires sandboxes on demand.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn create(&self, spec: SandboxSpec) -> anyhow::Result<Arc<dyn Sandbox>>;
}

/// Run `body` against a freshly acquired sandbox, releasing it on every exit
/// path. Exactly one `stop` is issued per acquisition; a body error wins
/// over a release error.
pub async fn with_sandbox<T, F, Fut>(
    provider: &dyn SandboxProvider,
    spec: SandboxSpec,
    body: F,
) -> anyhow::Result<T>
where
    F: FnOnce(Arc<dyn Sandbox>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let sandbox = provider.create(spec).await?;
    let result = body(Arc::clone(&sandbox)).await;
    let released = sandbox.stop().await;
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(e), released) => {
            if let Err(stop_err) = released {
                warn!(%stop_err, "sandbox release failed after body error");
            }
            Err(e)
        }
        (Ok(_), Err(stop_err)) => Err(stop_err),
    }
}

// --- local implementation ---

/// Spawns each command as a local process inside a scratch directory.
///
/// Stands in for a remote sandbox service behind the same trait: a lifetime
/// deadline from the spec timeout, and a hard stop after `stop()`.
pub struct LocalSandboxProvider;

#[async_trait]
impl SandboxProvider for LocalSandboxProvider {
    async fn create(&self, spec: SandboxSpec) -> anyhow::Result<Arc<dyn Sandbox>> {
        let root = tempfile::tempdir()?;
        debug!(runtime = %spec.runtime, dir = %root.path().display(), "sandbox created");
        Ok(Arc::new(LocalSandbox {
            root,
            deadline: Instant::now() + spec.timeout,
            stopped: AtomicBool::new(false),
        }))
    }
}

struct LocalSandbox {
    root: tempfile::TempDir,
    deadline: Instant,
    stopped: AtomicBool,
}

impl LocalSandbox {
    fn check_live(&self) -> anyhow::Result<Duration> {
        if self.stopped.load(Ordering::SeqCst) {
            anyhow::bail!("sandbox is stopped");
        }
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("sandbox timeout exceeded");
        }
        Ok(remaining)
    }
}

/// Reject absolute paths and traversal out of the sandbox root.
fn guard_relative(path: &str) -> anyhow::Result<&Path> {
    let p = Path::new(path);
    if p.components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        anyhow::bail!("path escapes sandbox: {path}");
    }
    Ok(p)
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn mk_dir(&self, path: &str) -> anyhow::Result<()> {
        self.check_live()?;
        let rel = guard_relative(path)?;
        tokio::fs::create_dir_all(self.root.path().join(rel)).await?;
        Ok(())
    }

    async fn run_command(&self, cmd: &str, args: &[String]) -> anyhow::Result<CommandOutput> {
        let remaining = self.check_live()?;
        debug!(cmd, ?args, "sandbox command");

        let run = tokio::process::Command::new(cmd)
            .args(args)
            .current_dir(self.root.path())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(remaining, run)
            .await
            .map_err(|_| anyhow::anyhow!("sandbox command timed out: {cmd}"))??;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        debug!("sandbox stopped");
        Ok(())
    }
}
