//! Suite building and execution capability wrapped by the lifecycle runner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::RunnerResult;
use crate::suite::{Suite, TestUnit};

/// Builds suites from labels and executes them.
///
/// `namespace` selects which test module set discovery reads, so browser
/// tests can be collected without touching how standard tests are found.
#[async_trait]
pub trait SuiteBackend: Send + Sync {
    fn build_suite(
        &self,
        labels: &[String],
        extra_tests: &[TestUnit],
        namespace: &str,
    ) -> RunnerResult<Suite>;

    async fn execute_suite(&self, suite: &Suite) -> RunnerResult<SuiteResult>;
}

/// Outcome of a single unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    pub id: String,
    pub success: bool,
    pub skipped: bool,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl UnitResult {
    pub fn passed(id: &str, duration_ms: u64) -> Self {
        Self {
            id: id.to_string(),
            success: true,
            skipped: false,
            duration_ms,
            exit_code: Some(0),
            error: None,
        }
    }

    pub fn failed(id: &str, duration_ms: u64, exit_code: Option<i32>, error: String) -> Self {
        Self {
            id: id.to_string(),
            success: false,
            skipped: false,
            duration_ms,
            exit_code,
            error: Some(error),
        }
    }

    pub fn skipped(id: &str) -> Self {
        Self {
            id: id.to_string(),
            success: false,
            skipped: true,
            duration_ms: 0,
            exit_code: None,
            error: None,
        }
    }
}

/// Aggregated outcome of a suite run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<UnitResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<UnitResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed - skipped,
            skipped,
            duration_ms,
            results,
        }
    }

    pub fn was_successful(&self) -> bool {
        self.failed == 0
    }

    /// Write results as `test-results.json` under `output_dir`
    pub fn write_json(&self, output_dir: &Path) -> RunnerResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
