//! Persisting candidate artifacts and running the verification toolchain.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::SandboxError;
use crate::models::{Draft, SandboxConfig, TestOutcome};

/// Stores the current draft and reports whether it passes its tests
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Load the previously persisted draft (resume only)
    async fn read_existing(&self) -> Result<Draft, SandboxError>;

    /// Replace both artifacts with `draft`, then run the toolchain against them
    async fn write_and_test(&self, draft: &Draft, show_diff: bool)
        -> Result<TestOutcome, SandboxError>;
}

#[async_trait]
impl<T: Sandbox + ?Sized> Sandbox for Box<T> {
    async fn read_existing(&self) -> Result<Draft, SandboxError> {
        (**self).read_existing().await
    }

    async fn write_and_test(
        &self,
        draft: &Draft,
        show_diff: bool,
    ) -> Result<TestOutcome, SandboxError> {
        (**self).write_and_test(draft, show_diff).await
    }
}

/// Result of one shell command
struct CommandRun {
    success: bool,
    output: String,
}

/// Filesystem sandbox driving an external toolchain through `sh -c`
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    impl_path: PathBuf,
    test_path: PathBuf,
    working_dir: PathBuf,
    prepare_commands: Vec<String>,
    format_commands: Vec<String>,
    test_command: String,
    command_timeout: Duration,
}

impl LocalSandbox {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            impl_path: config.impl_path.clone(),
            test_path: config.test_path.clone(),
            working_dir: config.effective_working_dir(),
            prepare_commands: config.prepare_commands.clone(),
            format_commands: config.format_commands.clone(),
            test_command: config.test_command.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_seconds),
        }
    }

    pub fn impl_path(&self) -> &Path {
        &self.impl_path
    }

    pub fn test_path(&self) -> &Path {
        &self.test_path
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Write both staged files. On failure nothing staged is left behind.
    async fn stage(&self, draft: &Draft) -> Result<(PathBuf, PathBuf), SandboxError> {
        let staged_test = staged_path(&self.test_path);
        let staged_impl = staged_path(&self.impl_path);

        if let Err(e) = write_with_parents(&staged_test, &draft.test_code).await {
            discard(&staged_test).await;
            return Err(SandboxError::StageError(staged_test, e));
        }
        if let Err(e) = write_with_parents(&staged_impl, &draft.impl_code).await {
            discard(&staged_test).await;
            discard(&staged_impl).await;
            return Err(SandboxError::StageError(staged_impl, e));
        }

        debug!(
            "Staged {} and {}",
            staged_test.display(),
            staged_impl.display()
        );
        Ok((staged_test, staged_impl))
    }

    /// Side-by-side diff of the current artifact against its staged copy
    async fn show_diff(&self, current: &Path, staged: &Path) {
        if !current.exists() {
            debug!("No existing {} to diff against", current.display());
            return;
        }
        let status = Command::new("diff")
            .arg("-y")
            .arg(current)
            .arg(staged)
            .stdin(Stdio::null())
            .status()
            .await;
        // diff exits 1 when the files differ
        if let Err(e) = status {
            warn!("Could not run diff on {}: {}", current.display(), e);
        }
    }

    /// Promote both staged files, or neither.
    ///
    /// Existing targets are moved to `<path>.bak` first so a failure part way
    /// through can put the previous artifacts back.
    async fn promote_all(&self, staged: [(&Path, &Path); 2]) -> Result<(), SandboxError> {
        let mut promoted: Vec<(&Path, Option<PathBuf>)> = Vec::new();

        for (from, target) in staged {
            match promote(from, target).await {
                Ok(backup) => promoted.push((target, backup)),
                Err(e) => {
                    warn!("Rolling back partial write: {}", e);
                    for (target, backup) in promoted.iter().rev() {
                        restore(target, backup.as_deref()).await;
                    }
                    for (from, _) in staged {
                        discard(from).await;
                    }
                    return Err(e);
                }
            }
        }

        for (_, backup) in &promoted {
            if let Some(backup) = backup {
                discard(backup).await;
            }
        }
        Ok(())
    }

    /// Run one command in the working directory, bounded by the command timeout
    async fn run_command(&self, cmd: &str) -> Result<CommandRun, SandboxError> {
        debug!("Running `{}` in {}", cmd, self.working_dir.display());
        let child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.command_timeout, child).await {
            Ok(result) => result.map_err(|source| SandboxError::SpawnError {
                command: cmd.to_string(),
                source,
            })?,
            Err(_) => {
                warn!("`{}` timed out after {:?}", cmd, self.command_timeout);
                return Ok(CommandRun {
                    success: false,
                    output: format!(
                        "`{}` timed out after {} seconds and was killed\n",
                        cmd,
                        self.command_timeout.as_secs()
                    ),
                });
            }
        };

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        Ok(CommandRun {
            success: output.status.success(),
            output: combined,
        })
    }

    /// prepare, then format (best effort), then test
    async fn run_toolchain(&self) -> Result<TestOutcome, SandboxError> {
        for cmd in &self.prepare_commands {
            let run = self.run_command(cmd).await?;
            if !run.success {
                warn!("Prepare command `{}` failed", cmd);
                return Ok(TestOutcome::failed(run.output));
            }
        }

        for cmd in &self.format_commands {
            match self.run_command(cmd).await {
                Ok(run) if run.success => {}
                Ok(run) => warn!("Format command `{}` failed: {}", cmd, run.output.trim()),
                Err(e) => warn!("{}", e),
            }
        }

        let run = self.run_command(&self.test_command).await?;
        info!(
            "Test command `{}` {}",
            self.test_command,
            if run.success { "passed" } else { "failed" }
        );
        Ok(TestOutcome {
            passed: run.success,
            raw_output: run.output,
        })
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn read_existing(&self) -> Result<Draft, SandboxError> {
        let test_code = fs::read_to_string(&self.test_path)
            .await
            .map_err(|e| SandboxError::ReadError(self.test_path.clone(), e))?;
        let impl_code = fs::read_to_string(&self.impl_path)
            .await
            .map_err(|e| SandboxError::ReadError(self.impl_path.clone(), e))?;

        if test_code.trim().is_empty() || impl_code.trim().is_empty() {
            return Err(SandboxError::NothingToResume);
        }
        Ok(Draft::new(test_code, impl_code))
    }

    async fn write_and_test(
        &self,
        draft: &Draft,
        show_diff: bool,
    ) -> Result<TestOutcome, SandboxError> {
        let (staged_test, staged_impl) = self.stage(draft).await?;

        if show_diff {
            self.show_diff(&self.test_path, &staged_test).await;
            self.show_diff(&self.impl_path, &staged_impl).await;
        }

        self.promote_all([
            (staged_test.as_path(), self.test_path.as_path()),
            (staged_impl.as_path(), self.impl_path.as_path()),
        ])
        .await?;
        info!(
            "Wrote {} and {}",
            self.test_path.display(),
            self.impl_path.display()
        );

        self.run_toolchain().await
    }
}

/// `<path>.new`
fn staged_path(path: &Path) -> PathBuf {
    with_suffix(path, ".new")
}

/// `<path>.bak`
fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Move `target` aside, then rename `staged` over it. Returns the backup, if any.
async fn promote(staged: &Path, target: &Path) -> Result<Option<PathBuf>, SandboxError> {
    let promote_error = |source| SandboxError::PromoteError {
        from: staged.to_path_buf(),
        to: target.to_path_buf(),
        source,
    };

    let backup = match fs::metadata(target).await {
        Ok(meta) if meta.is_dir() => {
            return Err(promote_error(std::io::Error::other("target is a directory")));
        }
        Ok(_) => {
            let backup = backup_path(target);
            fs::rename(target, &backup).await.map_err(promote_error)?;
            Some(backup)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(promote_error(e)),
    };

    if let Err(e) = fs::rename(staged, target).await {
        restore(target, backup.as_deref()).await;
        return Err(promote_error(e));
    }
    Ok(backup)
}

/// Put `target` back the way it was before `promote`
async fn restore(target: &Path, backup: Option<&Path>) {
    match backup {
        Some(backup) => {
            if let Err(e) = fs::rename(backup, target).await {
                warn!(
                    "Could not restore {} from {}: {}",
                    target.display(),
                    backup.display(),
                    e
                );
            }
        }
        None => discard(target).await,
    }
}

async fn write_with_parents(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, contents).await
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove staged file {}: {}", path.display(), e);
        }
    }
}
