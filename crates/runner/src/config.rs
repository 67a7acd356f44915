//! Browser-testing configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RunnerError, RunnerResult};

/// Module namespace holding ordinary unit/integration tests
pub const STANDARD_NAMESPACE: &str = "tests";

/// Module namespace holding browser-driven tests
pub const BROWSER_NAMESPACE: &str = "seltests";

/// Configuration consumed when browser testing is enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// X display the automation server renders the browser on
    pub display: String,

    /// Path to the automation server jar
    pub automation_server_path: Option<PathBuf>,

    /// Java launcher used to run the automation server
    pub java_binary: String,

    /// Host the automation server listens on
    pub automation_host: String,

    /// Port the automation server listens on
    pub automation_port: u16,

    /// Seconds to wait for the automation server to accept connections
    pub readiness_timeout_secs: u32,

    /// Port the HTTP test server listens on
    pub testserver_port: u16,

    /// Command that serves the application under test
    pub testserver_command: Vec<String>,

    /// Namespace searched for standard tests
    pub standard_namespace: String,

    /// Namespace searched for browser tests
    pub browser_namespace: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            display: ":0".to_string(),
            automation_server_path: None,
            java_binary: "java".to_string(),
            automation_host: "127.0.0.1".to_string(),
            automation_port: 4444,
            readiness_timeout_secs: 60,
            testserver_port: 8011,
            testserver_command: Vec::new(),
            standard_namespace: STANDARD_NAMESPACE.to_string(),
            browser_namespace: BROWSER_NAMESPACE.to_string(),
        }
    }
}

impl BrowserConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> RunnerResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> RunnerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check the settings browser mode cannot run without.
    pub fn validate(&self) -> RunnerResult<()> {
        let path = match &self.automation_server_path {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => {
                return Err(RunnerError::Config(
                    "automation server path is not set".to_string(),
                ))
            }
        };

        if !path.is_file() {
            return Err(RunnerError::Config(format!(
                "automation server not found at {}",
                path.display()
            )));
        }

        if self.java_binary.trim().is_empty() {
            return Err(RunnerError::Config("java binary is empty".to_string()));
        }

        Ok(())
    }

    /// Base URL of the HTTP test server
    pub fn server_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.testserver_port)
    }

    /// Remote-control endpoint of the automation server
    pub fn automation_url(&self) -> String {
        format!(
            "http://{}:{}/wd/hub",
            self.automation_host, self.automation_port
        )
    }
}
