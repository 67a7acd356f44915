//! Browser automation server process

use tracing::{info, warn};

use crate::config::BrowserConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::process::{ManagedProcess, ProcessLauncher, ProcessSpec};

/// Command line for the automation server.
///
/// The display is set on the child's environment only.
pub fn automation_spec(config: &BrowserConfig) -> RunnerResult<ProcessSpec> {
    let path = config
        .automation_server_path
        .as_ref()
        .ok_or_else(|| RunnerError::Config("automation server path is not set".to_string()))?;

    Ok(ProcessSpec::new(&config.java_binary)
        .arg("-jar")
        .arg(path.to_string_lossy())
        .arg("-port")
        .arg(config.automation_port.to_string())
        .env("DISPLAY", &config.display))
}

/// Handle to the running automation server
pub struct AutomationServer {
    process: Box<dyn ManagedProcess>,
}

impl AutomationServer {
    pub fn start(launcher: &dyn ProcessLauncher, spec: &ProcessSpec) -> RunnerResult<Self> {
        info!("Starting automation server: {}", spec.display());
        let process = launcher.spawn(spec)?;
        Ok(Self { process })
    }

    pub fn id(&self) -> u32 {
        self.process.id()
    }

    /// Interrupt the server, force-killing it if it has not exited.
    ///
    /// The exit check happens right after the interrupt with no grace
    /// period. The final wait has no timeout.
    pub fn stop(&mut self) -> RunnerResult<()> {
        info!("Stopping automation server (pid: {})", self.process.id());

        if let Err(e) = self.process.interrupt() {
            warn!("Failed to interrupt automation server: {}", e);
        }

        if self.process.poll()?.is_none() {
            info!("Force killing automation server {}", self.process.id());
            self.process.kill()?;
            self.process.wait()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_spec_carries_display_and_jar() {
        let config = BrowserConfig {
            display: ":99".to_string(),
            automation_server_path: Some(PathBuf::from("/opt/selenium-server.jar")),
            ..Default::default()
        };

        let spec = automation_spec(&config).unwrap();

        assert_eq!(spec.program, "java");
        assert_eq!(
            spec.args,
            vec!["-jar", "/opt/selenium-server.jar", "-port", "4444"]
        );
        assert_eq!(spec.env, vec![("DISPLAY".to_string(), ":99".to_string())]);
    }

    #[test]
    fn test_spec_requires_path() {
        let err = automation_spec(&BrowserConfig::default()).unwrap_err();
        assert!(matches!(err, RunnerError::Config(_)));
    }
}
