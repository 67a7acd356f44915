//! Seltest CLI - Main Entry Point
//!
//! Runs an application's standard test suite and, on request, its
//! browser-driven suite with the test and automation servers managed
//! around it.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use seltest_runner::manifest::Manifest;
use seltest_runner::{BrowserConfig, BrowserMode, LifecycleRunner, ManifestBackend, TestUnit};

#[derive(Parser, Debug)]
#[command(name = "seltest")]
#[command(about = "Run unit and browser-driven test suites with managed servers")]
#[command(version)]
struct Cli {
    /// Test labels: `app` or `app.unit` (all apps when empty)
    labels: Vec<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "seltest.toml", env = "SELTEST_CONFIG")]
    config: PathBuf,

    /// Directory holding one sub-directory per application
    #[arg(long, default_value = ".", env = "SELTEST_ROOT")]
    root: PathBuf,

    /// Also run browser tests
    #[arg(long)]
    selenium: bool,

    /// Run browser tests only
    #[arg(long)]
    selenium_only: bool,

    /// Display the automation server renders on
    #[arg(long, env = "SELTEST_DISPLAY")]
    display: Option<String>,

    /// Path to the automation server jar
    #[arg(long, env = "SELTEST_SELENIUM_PATH")]
    selenium_path: Option<PathBuf>,

    /// Port for the HTTP test server
    #[arg(long, env = "SELTEST_TESTSERVER_PORT")]
    testserver_port: Option<u16>,

    /// Program serving the application under test
    #[arg(long, env = "SELTEST_TESTSERVER_COMMAND")]
    testserver_command: Option<String>,

    /// Argument passed to the test server program (repeatable, kept verbatim)
    #[arg(long = "testserver-arg", allow_hyphen_values = true)]
    testserver_args: Vec<String>,

    /// Seconds to wait for the automation server
    #[arg(long)]
    readiness_timeout: Option<u32>,

    /// Manifest of additional units appended to the suite
    #[arg(long)]
    extra_tests: Option<PathBuf>,

    /// Stop after the first failing unit
    #[arg(long)]
    failfast: bool,

    /// Directory to write test-results.json into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> BrowserMode {
        BrowserMode::from_flags(self.selenium, self.selenium_only)
    }

    /// File configuration with command-line overrides applied
    fn browser_config(&self) -> anyhow::Result<BrowserConfig> {
        let mut config = BrowserConfig::load(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;

        if let Some(display) = &self.display {
            config.display = display.clone();
        }
        if let Some(path) = &self.selenium_path {
            config.automation_server_path = Some(path.clone());
        }
        if let Some(port) = self.testserver_port {
            config.testserver_port = port;
        }
        if let Some(program) = &self.testserver_command {
            config.testserver_command = std::iter::once(program.clone())
                .chain(self.testserver_args.iter().cloned())
                .collect();
        }
        if let Some(timeout) = self.readiness_timeout {
            config.readiness_timeout_secs = timeout;
        }

        Ok(config)
    }

    fn extra_tests(&self) -> anyhow::Result<Vec<TestUnit>> {
        match &self.extra_tests {
            Some(path) => {
                let manifest = Manifest::from_file(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(manifest.into_suite("extra", "tests").into_units())
            }
            None => Ok(Vec::new()),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let result = run(cli).await;
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }
    std::process::exit(exit_code(&result));
}

/// 0 when every unit passed, 1 on test failures, 2 on a fatal error
fn exit_code(result: &anyhow::Result<bool>) -> i32 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = cli.browser_config()?;
    let extra_tests = cli.extra_tests()?;
    let mode = cli.mode();

    let mut backend = ManifestBackend::new(cli.root.clone()).with_failfast(cli.failfast);
    if mode.includes_browser() {
        backend = backend
            .with_env("SELTEST_SERVER_URL", config.server_url())
            .with_env("SELTEST_AUTOMATION_URL", config.automation_url());
    }

    info!("seltest v{} ({:?})", env!("CARGO_PKG_VERSION"), mode);

    let mut runner = LifecycleRunner::new(Arc::new(backend), config, mode);
    let result = runner.run(&cli.labels, &extra_tests).await?;

    if let Some(output) = &cli.output {
        result.write_json(output)?;
    }

    Ok(result.was_successful())
}
