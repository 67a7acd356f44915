//! Seltest suite runner
//!
//! Runs a web application's standard test suite together with its
//! browser-driven acceptance suite:
//! - Builds one merged, category-ordered suite from two discovery namespaces
//! - Starts the HTTP test server and the browser automation server
//! - Blocks until the automation server accepts connections
//! - Executes the suite and always tears the servers down afterwards
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  LifecycleRunner                                            │
//! │    ├── build_suite(labels, extra) -> Suite                  │
//! │    ├── start_servers()  test server + automation server     │
//! │    │     └── ReadinessProbe::wait_until_ready(host:port)    │
//! │    ├── run_suite(suite) -> SuiteResult                      │
//! │    └── stop_servers()   SIGINT, poll, kill + wait           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Collaborators                                              │
//! │    ├── SuiteBackend       (ManifestBackend)                 │
//! │    ├── TestServerLauncher (CommandTestServer)               │
//! │    └── ProcessLauncher    (SystemLauncher)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod automation;
pub mod backend;
pub mod config;
pub mod error;
pub mod manifest;
pub mod probe;
pub mod process;
pub mod runner;
pub mod server;
pub mod suite;

pub use backend::{SuiteBackend, SuiteResult, UnitResult};
pub use config::BrowserConfig;
pub use error::{FatalStartupError, RunnerError, RunnerResult};
pub use manifest::ManifestBackend;
pub use probe::{wait_until_ready, ReadinessProbe, ReadinessTarget};
pub use runner::{LifecycleRunner, RunState};
pub use suite::{BrowserMode, Suite, TestUnit, UnitKind};
