use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{RelayError, Result};

/// STT engine run as a child process.
///
/// The engine binds the WebSocket endpoint the session connects to. Its
/// stdout and stderr are re-logged line by line under the `engine` target
/// so one console shows both sides. `kill_on_drop` backstops teardown if
/// the relay aborts before `terminate` runs.
pub struct EngineProcess {
    child: Child,
    command: String,
    shutdown_grace: Duration,
}

impl EngineProcess {
    pub fn spawn(config: &EngineConfig, host: &str, port: u16) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .arg("--host")
            .arg(host)
            .arg("--port")
            .arg(port.to_string())
            .args(&config.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "Starting STT engine: {} --host {} --port {}",
            config.command, host, port
        );

        let mut child = command.spawn().map_err(|e| RelayError::Engine {
            message: format!("failed to spawn {}: {}", config.command, e),
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }

        Ok(Self {
            child,
            command: config.command.clone(),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        })
    }

    /// Ask the engine to exit, escalating to SIGKILL after the grace period.
    pub async fn terminate(mut self) {
        let pid = match self.child.id() {
            Some(pid) => pid,
            None => {
                // Already exited; reap so it does not linger as a zombie
                let _ = self.child.try_wait();
                return;
            }
        };

        info!("Terminating engine {} (pid {})...", self.command, pid);

        #[cfg(unix)]
        // SAFETY: pid belongs to a child we spawned and have not reaped
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(Ok(status)) => info!("Engine exited: {}", status),
            Ok(Err(e)) => warn!("Failed to reap engine: {}", e),
            Err(_elapsed) => {
                warn!(
                    "Engine ignored SIGTERM for {}s, killing",
                    self.shutdown_grace.as_secs()
                );
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill engine: {}", e);
                }
            }
        }
    }
}

/// Re-log one of the engine's output streams until it closes.
async fn forward_output<R>(reader: R, label: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(target: "engine", "{}", line);
    }
    debug!(target: "engine", "{} closed", label);
}
