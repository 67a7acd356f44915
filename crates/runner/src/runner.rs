//! Lifecycle-aware suite runner
//!
//! Wraps a [`SuiteBackend`] and, when browser testing is enabled, brings the
//! HTTP test server and the automation server up around the suite run.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::automation::{automation_spec, AutomationServer};
use crate::backend::{SuiteBackend, SuiteResult};
use crate::config::BrowserConfig;
use crate::error::{FatalStartupError, RunnerError, RunnerResult};
use crate::probe::{ReadinessProbe, ReadinessTarget};
use crate::process::{ProcessLauncher, SystemLauncher};
use crate::server::{CommandTestServer, TestServerHandle, TestServerLauncher};
use crate::suite::{reorder_suite, BrowserMode, Suite, TestUnit, UnitKind, DEFAULT_PRIORITY};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    SuiteBuilt,
    ServersStarting,
    ServersReady,
    Executing,
    ServersStopping,
    Done,
    Failed,
}

pub struct LifecycleRunner {
    backend: Arc<dyn SuiteBackend>,
    config: BrowserConfig,
    mode: BrowserMode,
    launcher: Arc<dyn ProcessLauncher>,
    test_servers: Arc<dyn TestServerLauncher>,
    probe: ReadinessProbe,
    priority: Vec<UnitKind>,

    automation: Option<AutomationServer>,
    test_server: Option<Box<dyn TestServerHandle>>,
    state: RunState,
}

impl LifecycleRunner {
    /// Create a runner that launches real processes
    pub fn new(backend: Arc<dyn SuiteBackend>, config: BrowserConfig, mode: BrowserMode) -> Self {
        let launcher: Arc<dyn ProcessLauncher> = Arc::new(SystemLauncher);
        let test_servers = Arc::new(CommandTestServer::new(
            config.testserver_command.clone(),
            launcher.clone(),
        ));

        Self {
            backend,
            config,
            mode,
            launcher,
            test_servers,
            probe: ReadinessProbe::default(),
            priority: DEFAULT_PRIORITY.to_vec(),
            automation: None,
            test_server: None,
            state: RunState::Idle,
        }
    }

    pub fn with_process_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_test_server(mut self, test_servers: Arc<dyn TestServerLauncher>) -> Self {
        self.test_servers = test_servers;
        self
    }

    pub fn with_probe(mut self, probe: ReadinessProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_priority(mut self, priority: Vec<UnitKind>) -> Self {
        self.priority = priority;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> BrowserMode {
        self.mode
    }

    fn browser_enabled(&self) -> bool {
        self.mode.includes_browser()
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Build the merged suite for the configured mode.
    ///
    /// Browser units come from the same discovery pointed at the browser
    /// namespace and are appended to the standard units before reordering.
    /// Extra tests are added once, to whichever suite is built first.
    pub fn build_suite(&mut self, labels: &[String], extra_tests: &[TestUnit]) -> RunnerResult<Suite> {
        let mut suite = Suite::new();
        let mut extra_tests = extra_tests;

        if self.mode.includes_standard() {
            suite = self
                .backend
                .build_suite(labels, extra_tests, &self.config.standard_namespace)?;
            extra_tests = &[];
        }

        if self.browser_enabled() {
            let browser_suite =
                self.backend
                    .build_suite(labels, extra_tests, &self.config.browser_namespace)?;
            debug!("Collected {} browser unit(s)", browser_suite.len());
            suite.extend(browser_suite);
        }

        check_unit_labels(labels, &suite)?;

        let suite = reorder_suite(suite, &self.priority);
        info!("Built suite with {} unit(s) ({:?})", suite.len(), self.mode);
        self.transition(RunState::SuiteBuilt);
        Ok(suite)
    }

    /// Start the test server and the automation server, then wait until
    /// the automation server accepts connections.
    ///
    /// On failure the servers started so far stay up; [`Self::run`] tears
    /// them down.
    pub async fn start_servers(&mut self) -> RunnerResult<()> {
        if !self.browser_enabled() {
            self.transition(RunState::ServersReady);
            return Ok(());
        }

        self.transition(RunState::ServersStarting);
        self.config.validate()?;
        let spec = automation_spec(&self.config)?;

        self.test_server = Some(self.test_servers.start(self.config.testserver_port)?);
        self.automation = Some(AutomationServer::start(self.launcher.as_ref(), &spec)?);

        let target = ReadinessTarget {
            host: self.config.automation_host.clone(),
            port: self.config.automation_port,
            timeout_secs: self.config.readiness_timeout_secs,
        };
        info!("Waiting for automation server on {}", target.address());

        if !self.probe.wait_until_ready(&target).await {
            return Err(FatalStartupError::ReadinessTimeout {
                host: target.host,
                port: target.port,
                timeout_secs: target.timeout_secs,
            }
            .into());
        }

        info!("Automation server is ready at {}", self.config.automation_url());
        self.transition(RunState::ServersReady);
        Ok(())
    }

    /// Execute a built suite. Only allowed once the servers are ready.
    pub async fn run_suite(&mut self, suite: &Suite) -> RunnerResult<SuiteResult> {
        if self.state != RunState::ServersReady {
            return Err(RunnerError::Execution(format!(
                "cannot execute suite in state {:?}",
                self.state
            )));
        }

        self.transition(RunState::Executing);
        self.backend.execute_suite(suite).await
    }

    /// Stop the automation server, then the test server.
    ///
    /// Both are attempted even if the first fails; the first error is
    /// returned.
    pub fn stop_servers(&mut self) -> RunnerResult<()> {
        if !self.browser_enabled() {
            return Ok(());
        }

        self.transition(RunState::ServersStopping);
        let mut first_error = None;

        if let Some(mut automation) = self.automation.take() {
            if let Err(e) = automation.stop() {
                warn!("Failed to stop automation server: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(mut server) = self.test_server.take() {
            if let Err(e) = server.stop() {
                warn!("Failed to stop test server: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Build the suite, bring the servers up, execute and tear down.
    ///
    /// Teardown runs whenever servers may have been started, including when
    /// startup or execution fails. Teardown errors are logged and never
    /// replace the run's outcome.
    pub async fn run(&mut self, labels: &[String], extra_tests: &[TestUnit]) -> RunnerResult<SuiteResult> {
        let suite = match self.build_suite(labels, extra_tests) {
            Ok(suite) => suite,
            Err(e) => {
                self.transition(RunState::Failed);
                return Err(e);
            }
        };

        if let Err(e) = self.start_servers().await {
            error!("Server startup failed: {}", e);
            self.teardown_quietly();
            self.transition(RunState::Failed);
            return Err(e);
        }

        let result = self.run_suite(&suite).await;
        self.teardown_quietly();

        match result {
            Ok(result) => {
                self.transition(RunState::Done);
                Ok(result)
            }
            Err(e) => {
                self.transition(RunState::Failed);
                Err(e)
            }
        }
    }

    fn teardown_quietly(&mut self) {
        if let Err(e) = self.stop_servers() {
            warn!("Teardown incomplete: {}", e);
        }
    }
}

/// Every `app.unit` label must match a unit in at least one built namespace.
///
/// A unit may live in only one namespace, so the check runs on the merged
/// suite rather than per namespace.
fn check_unit_labels(labels: &[String], suite: &Suite) -> RunnerResult<()> {
    for label in labels {
        let Some((app, unit)) = label.split_once('.') else {
            continue;
        };
        let prefix = format!("{}.", app);
        if !suite.iter().any(|u| u.name == unit && u.id.starts_with(&prefix)) {
            return Err(RunnerError::Discovery(format!(
                "label '{}' does not match any test unit",
                label
            )));
        }
    }
    Ok(())
}

impl Drop for LifecycleRunner {
    fn drop(&mut self) {
        if self.automation.is_some() || self.test_server.is_some() {
            self.teardown_quietly();
        }
    }
}
