//! Process control on the host OS.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::errors::{DesktopError, DesktopResult};
use crate::domain::ports::ProcessControl;

/// Starts detached child processes and signals processes by pid.
///
/// Started children are reaped by a background task so they never linger
/// as zombies.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcesses;

impl HostProcesses {
    /// Process control for the current host.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessControl for HostProcesses {
    async fn start(&self, path: &Path) -> DesktopResult<u32> {
        let spawn_failed = |reason: String| DesktopError::SpawnFailed {
            path: path.display().to_string(),
            reason,
        };

        let mut child = Command::new(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => spawn_failed("no such executable".to_string()),
                _ => spawn_failed(e.to_string()),
            })?;

        let pid = child
            .id()
            .ok_or_else(|| spawn_failed("process exited before reporting a pid".to_string()))?;
        info!(pid, path = %path.display(), "application started");

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(pid, %status, "application exited"),
                Err(e) => warn!(pid, error = %e, "failed to wait on application"),
            }
        });

        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> DesktopResult<()> {
        // kill(0) signals our whole process group.
        if pid == 0 {
            return Err(DesktopError::PermissionDenied(
                "refusing to signal process group 0".to_string(),
            ));
        }
        if pid == std::process::id() {
            return Err(DesktopError::PermissionDenied(format!(
                "refusing to terminate the bridge itself (pid {pid})"
            )));
        }
        let raw = i32::try_from(pid).map_err(|_| DesktopError::ProcessNotFound(pid))?;

        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => {
                info!(pid, "sent SIGTERM");
                Ok(())
            }
            Err(Errno::ESRCH) => Err(DesktopError::ProcessNotFound(pid)),
            Err(Errno::EPERM) => Err(DesktopError::PermissionDenied(format!(
                "not allowed to signal process {pid}"
            ))),
            Err(errno) => Err(DesktopError::Backend(format!(
                "failed to signal process {pid}: {errno}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[tokio::test]
    async fn test_start_returns_pid() {
        let pid = HostProcesses::new().start(Path::new("/bin/sh")).await.unwrap();
        assert!(pid > 0);
    }

    #[tokio::test]
    async fn test_start_missing_executable() {
        let err = HostProcesses::new()
            .start(Path::new("/no/such/program"))
            .await
            .unwrap_err();
        match err {
            DesktopError::SpawnFailed { path, reason } => {
                assert_eq!(path, "/no/such/program");
                assert_eq!(reason, "no such executable");
            }
            other => panic!("Expected SpawnFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_running_process() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        HostProcesses::new().terminate(child.id()).await.unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_terminate_unknown_pid() {
        let err = HostProcesses::new()
            .terminate(i32::MAX as u32)
            .await
            .unwrap_err();
        assert!(matches!(err, DesktopError::ProcessNotFound(_)));
    }

    #[tokio::test]
    async fn test_terminate_self_refused() {
        let err = HostProcesses::new()
            .terminate(std::process::id())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "PermissionDenied");

        let err = HostProcesses::new().terminate(0).await.unwrap_err();
        assert_eq!(err.category(), "PermissionDenied");
    }
}
