//! Manifest-driven discovery and command execution
//!
//! Each application directory under the root may hold one YAML manifest per
//! namespace, e.g. `shop/tests.yaml` and `shop/seltests.yaml`:
//!
//! ```yaml
//! units:
//!   - name: checkout
//!     kind: database
//!     command: ["cargo", "test", "--test", "checkout"]
//!     timeout_secs: 300
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::backend::{SuiteBackend, SuiteResult, UnitResult};
use crate::error::{RunnerError, RunnerResult};
use crate::suite::{Suite, TestUnit, UnitKind};

/// Manifest file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub units: Vec<ManifestUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestUnit {
    pub name: String,

    #[serde(default)]
    pub kind: UnitKind,

    pub command: Vec<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> RunnerResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> RunnerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Turn manifest entries into units with ids `<app>.<namespace>.<name>`
    pub fn into_suite(self, app: &str, namespace: &str) -> Suite {
        self.units
            .into_iter()
            .map(|unit| TestUnit {
                id: format!("{}.{}.{}", app, namespace, unit.name),
                name: unit.name,
                kind: unit.kind,
                command: unit.command,
                timeout_secs: unit.timeout_secs,
            })
            .collect()
    }
}

/// Discovers units from YAML manifests and runs each unit's command
#[derive(Debug, Clone)]
pub struct ManifestBackend {
    root: PathBuf,
    env: Vec<(String, String)>,
    failfast: bool,
}

impl ManifestBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            env: Vec::new(),
            failfast: false,
        }
    }

    /// Add an environment variable passed to every unit
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Skip the remaining units after the first failure
    pub fn with_failfast(mut self, failfast: bool) -> Self {
        self.failfast = failfast;
        self
    }

    /// All application directories under the root, sorted by name.
    /// Hidden directories (`.git` and friends) are skipped.
    fn apps(&self) -> RunnerResult<Vec<String>> {
        let mut apps = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| RunnerError::Discovery(e.to_string()))?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() && !name.starts_with('.') {
                apps.push(name.into_owned());
            }
        }
        Ok(apps)
    }

    fn load_app(&self, app: &str, namespace: &str) -> RunnerResult<Suite> {
        let app_dir = self.root.join(app);
        if !app_dir.is_dir() {
            return Err(RunnerError::Discovery(format!(
                "unknown application '{}' (no directory under {})",
                app,
                self.root.display()
            )));
        }

        let path = ["yaml", "yml"]
            .iter()
            .map(|ext| app_dir.join(format!("{}.{}", namespace, ext)))
            .find(|p| p.is_file());

        match path {
            Some(path) => {
                debug!("Loading manifest {}", path.display());
                Ok(Manifest::from_file(&path)?.into_suite(app, namespace))
            }
            None => Ok(Suite::new()),
        }
    }

    fn load_label(&self, label: &str, namespace: &str) -> RunnerResult<Suite> {
        match label.split_once('.') {
            None => self.load_app(label, namespace),
            Some((app, unit)) => Ok(self
                .load_app(app, namespace)?
                .into_iter()
                .filter(|u| u.name == unit)
                .collect()),
        }
    }

    async fn run_unit(&self, unit: &TestUnit) -> UnitResult {
        let start = Instant::now();
        let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

        let Some((program, args)) = unit.command.split_first() else {
            return UnitResult::failed(&unit.id, 0, None, "empty command".to_string());
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match unit.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return UnitResult::failed(
                        &unit.id,
                        elapsed(start),
                        None,
                        format!("timed out after {}s", secs),
                    )
                }
            },
            None => cmd.output().await,
        };

        match output {
            Ok(output) if output.status.success() => UnitResult::passed(&unit.id, elapsed(start)),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
                let mut message = format!("exited with {}", output.status);
                if !tail.is_empty() {
                    message.push('\n');
                    message.push_str(&tail.into_iter().rev().collect::<Vec<_>>().join("\n"));
                }
                UnitResult::failed(&unit.id, elapsed(start), output.status.code(), message)
            }
            Err(e) => UnitResult::failed(
                &unit.id,
                elapsed(start),
                None,
                format!("failed to spawn {}: {}", program, e),
            ),
        }
    }
}

#[async_trait]
impl SuiteBackend for ManifestBackend {
    fn build_suite(
        &self,
        labels: &[String],
        extra_tests: &[TestUnit],
        namespace: &str,
    ) -> RunnerResult<Suite> {
        let mut suite = Suite::new();

        if labels.is_empty() {
            for app in self.apps()? {
                suite.extend(self.load_app(&app, namespace)?);
            }
        } else {
            for label in labels {
                suite.extend(self.load_label(label, namespace)?);
            }
        }

        for unit in extra_tests {
            suite.push(unit.clone());
        }

        debug!("Discovered {} unit(s) in namespace '{}'", suite.len(), namespace);
        Ok(suite)
    }

    async fn execute_suite(&self, suite: &Suite) -> RunnerResult<SuiteResult> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(suite.len());
        let mut failed = false;

        info!("Running {} unit(s)...", suite.len());

        for unit in suite {
            if failed && self.failfast {
                results.push(UnitResult::skipped(&unit.id));
                continue;
            }

            let result = self.run_unit(unit).await;
            if result.success {
                info!("✓ {} ({} ms)", result.id, result.duration_ms);
            } else {
                failed = true;
                error!(
                    "✗ {} - {}",
                    result.id,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let result = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            result.passed, result.failed, result.skipped, result.duration_ms
        );
        Ok(result)
    }
}
