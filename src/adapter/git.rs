//! [`RepositoryAdapter`] backed by the `git` executable.
//!
//! Pack exchanges run `git upload-pack` / `git receive-pack` in stateless RPC mode, the same
//! plumbing `git http-backend` uses. Client input is fed to the child's stdin while its stdout is
//! copied into the response as it is produced.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

use super::{ExchangeOptions, FileSource, PackInput, PackOutput, RepositoryAdapter};
use crate::errors::AdapterError;
use crate::protocol::types::ServiceType;
use crate::protocol::utils::service_advertisement;

/// Adapter that shells out to git for every repository operation.
#[derive(Clone, Debug)]
pub struct GitAdapter {
    git_path: Arc<PathBuf>,
    repository_path: Option<PathBuf>,
}

impl Default for GitAdapter {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitAdapter {
    pub fn new(git_path: impl Into<PathBuf>) -> Self {
        Self {
            git_path: Arc::new(git_path.into()),
            repository_path: None,
        }
    }

    fn repo(&self) -> Result<&Path, AdapterError> {
        self.repository_path
            .as_deref()
            .ok_or(AdapterError::RepositoryPathUnset)
    }

    /// Create a git command with the appropriate git-dir.
    fn git_cmd(&self) -> Result<Command, AdapterError> {
        let mut cmd = Command::new(&*self.git_path);
        cmd.arg("--git-dir").arg(self.repo()?);
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    /// Read a single config value; `None` when unset or when git fails.
    async fn config(&self, key: &str) -> Option<String> {
        let output = self
            .git_cmd()
            .ok()?
            .args(["config", "--get", key])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| tracing::warn!("git config {} failed: {}", key, e))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl RepositoryAdapter for GitAdapter {
    fn set_repository_path(&mut self, path: PathBuf) {
        self.repository_path = Some(path);
    }

    fn repository_path(&self) -> Option<&Path> {
        self.repository_path.as_deref()
    }

    async fn exists(&self) -> bool {
        match self.repo() {
            Ok(path) => tokio::fs::metadata(path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Pushes are off unless the repository sets `http.receivepack = true`.
    async fn allow_push(&self) -> bool {
        self.config("http.receivepack").await.as_deref() == Some("true")
    }

    /// Fetches are on unless the repository sets `http.uploadpack = false`.
    async fn allow_pull(&self) -> bool {
        self.config("http.uploadpack").await.as_deref() != Some("false")
    }

    async fn refresh_server_info(&self) -> Result<(), AdapterError> {
        let output = self
            .git_cmd()?
            .arg("update-server-info")
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(AdapterError::command_failed(
                "git update-server-info",
                output.status,
                &output.stderr,
            ));
        }
        Ok(())
    }

    async fn open_file(&self, relative_path: &str) -> Option<FileSource> {
        let path = self.repo().ok()?.join(relative_path);
        FileSource::open(&path).await
    }

    async fn exchange(
        &self,
        service: ServiceType,
        input: Option<PackInput>,
        mut output: PackOutput,
        options: ExchangeOptions,
    ) -> Result<(), AdapterError> {
        let repo = self.repo()?.to_path_buf();
        let mut cmd = Command::new(&*self.git_path);
        cmd.arg(service.command()).arg("--stateless-rpc");
        if options.advertise_refs {
            cmd.arg("--advertise-refs");
        }
        cmd.arg(&repo)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if options.advertise_refs {
            let prefix = service_advertisement(service);
            output.write_all(&prefix).await?;
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            AdapterError::Custom(format!("git {} has no stdout", service.command()))
        })?;
        let mut stderr = child.stderr.take();

        tracing::debug!(service = %service, repo = ?repo, advertise = options.advertise_refs, "starting git");

        let feed = async {
            if let (Some(mut input), Some(mut stdin)) = (input, stdin) {
                copy_to_child(&mut input, &mut stdin).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        // Once the client is gone nothing reads stdout, so the child must not outlive the sink.
        let drain = async {
            let mut stdout = stdout;
            match tokio::io::copy(&mut stdout, &mut output).await {
                Ok(_) => output.shutdown().await,
                Err(e) => {
                    drop(stdout);
                    if let Err(kill) = child.start_kill() {
                        tracing::debug!("git {} already exited: {}", service.command(), kill);
                    }
                    Err(e)
                }
            }
        };
        let collect_stderr = async {
            let mut buf = Vec::new();
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        };

        let (fed, drained, stderr) = tokio::join!(feed, drain, collect_stderr);
        let status = child.wait().await?;
        drained?;
        // The child exiting early closes stdin under us; its exit status is the better report.
        if !status.success() {
            return Err(AdapterError::command_failed(
                &format!("git {}", service.command()),
                status,
                &stderr,
            ));
        }
        fed?;
        Ok(())
    }
}

/// Copy client input to the child in bounded chunks.
async fn copy_to_child<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(COPY_CHUNK);
    let mut total = 0u64;
    loop {
        buf.clear();
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buf).await?;
        total += n as u64;
    }
}

const COPY_CHUNK: usize = 64 * 1024;
