//! HTTP test server management

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::process::{ManagedProcess, ProcessLauncher, ProcessSpec};

/// Starts the server that hosts the application under test
pub trait TestServerLauncher: Send + Sync {
    fn start(&self, port: u16) -> RunnerResult<Box<dyn TestServerHandle>>;
}

/// A running HTTP test server
pub trait TestServerHandle: Send {
    fn port(&self) -> u16;

    fn stop(&mut self) -> RunnerResult<()>;
}

/// Serves the application by spawning a configured command.
///
/// The port is handed to the command through `PORT` and
/// `SELTEST_TESTSERVER_PORT`.
pub struct CommandTestServer {
    argv: Vec<String>,
    launcher: Arc<dyn ProcessLauncher>,
    grace_period: Duration,
    inherit_output: bool,
}

impl CommandTestServer {
    pub fn new(argv: Vec<String>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            argv,
            launcher,
            grace_period: Duration::from_millis(500),
            inherit_output: false,
        }
    }

    /// How long to wait after SIGTERM before force-killing
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_inherit_output(mut self, inherit_output: bool) -> Self {
        self.inherit_output = inherit_output;
        self
    }
}

impl TestServerLauncher for CommandTestServer {
    fn start(&self, port: u16) -> RunnerResult<Box<dyn TestServerHandle>> {
        let mut spec = ProcessSpec::from_argv(&self.argv).ok_or_else(|| {
            RunnerError::Config("test server command is not set".to_string())
        })?;
        spec = spec
            .env("PORT", port.to_string())
            .env("SELTEST_TESTSERVER_PORT", port.to_string());
        spec.inherit_output = self.inherit_output;

        info!("Starting test server on port {}: {}", port, spec.display());
        let process = self.launcher.spawn(&spec)?;

        Ok(Box::new(ProcessTestServer {
            process,
            port,
            grace_period: self.grace_period,
        }))
    }
}

struct ProcessTestServer {
    process: Box<dyn ManagedProcess>,
    port: u16,
    grace_period: Duration,
}

impl TestServerHandle for ProcessTestServer {
    fn port(&self) -> u16 {
        self.port
    }

    fn stop(&mut self) -> RunnerResult<()> {
        info!("Stopping test server (pid: {})", self.process.id());

        if self.process.poll()?.is_some() {
            warn!("Test server had already exited");
            return Ok(());
        }

        // Try graceful shutdown first
        if self.process.terminate().is_ok() {
            std::thread::sleep(self.grace_period);
        }

        if self.process.poll()?.is_none() {
            self.process.kill()?;
        }
        self.process.wait()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::SystemLauncher;

    #[test]
    fn test_start_and_stop() {
        let server = CommandTestServer::new(
            vec!["sh".to_string(), "-c".to_string(), r#"test "$PORT" = "8123" && exec sleep 30"#.to_string()],
            Arc::new(SystemLauncher),
        )
        .with_grace_period(Duration::from_millis(50));

        let mut handle = server.start(8123).unwrap();
        assert_eq!(handle.port(), 8123);
        handle.stop().unwrap();
    }

    #[test]
    fn test_missing_command_is_config_error() {
        let server = CommandTestServer::new(Vec::new(), Arc::new(SystemLauncher));
        assert!(matches!(server.start(8011), Err(RunnerError::Config(_))));
    }
}
