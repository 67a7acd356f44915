//! Subprocess management for auxiliary servers

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::debug;

use crate::error::{FatalStartupError, RunnerResult};

/// Everything needed to launch a subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,

    /// Variables set on the child only
    pub env: Vec<(String, String)>,

    pub current_dir: Option<PathBuf>,

    /// Forward the child's output to ours instead of discarding it
    pub inherit_output: bool,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Build a spec from an argv vector
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            ..Default::default()
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A running subprocess
pub trait ManagedProcess: Send {
    fn id(&self) -> u32;

    /// Ask the process to stop (SIGINT on unix)
    fn interrupt(&mut self) -> std::io::Result<()>;

    /// Ask the process to terminate (SIGTERM on unix)
    fn terminate(&mut self) -> std::io::Result<()>;

    /// Non-blocking exit check; `Some(code)` once the process has exited
    fn poll(&mut self) -> std::io::Result<Option<i32>>;

    /// Force-kill the process
    fn kill(&mut self) -> std::io::Result<()>;

    /// Block until the process exits
    fn wait(&mut self) -> std::io::Result<i32>;
}

/// Starts subprocesses
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, spec: &ProcessSpec) -> RunnerResult<Box<dyn ManagedProcess>>;
}

/// Launches real OS processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn(&self, spec: &ProcessSpec) -> RunnerResult<Box<dyn ManagedProcess>> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());

        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        if spec.inherit_output {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = cmd.spawn().map_err(|e| FatalStartupError::Spawn {
            what: spec.display(),
            reason: e.to_string(),
        })?;

        debug!("Spawned '{}' (pid: {})", spec.display(), child.id());
        Ok(Box::new(ChildProcess { child }))
    }
}

/// [`ManagedProcess`] backed by a `std::process::Child`
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    #[cfg(unix)]
    fn signal(&mut self, signal: nix::sys::signal::Signal) -> std::io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(self.child.id() as i32), signal) {
            // Already gone
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from(e)),
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

impl ManagedProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn interrupt(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.signal(nix::sys::signal::Signal::SIGINT)
        }
        #[cfg(not(unix))]
        {
            self.kill()
        }
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.signal(nix::sys::signal::Signal::SIGTERM)
        }
        #[cfg(not(unix))]
        {
            self.kill()
        }
    }

    fn poll(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        match self.child.kill() {
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn wait(&mut self) -> std::io::Result<i32> {
        Ok(exit_code(self.child.wait()?))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::RunnerError;

    #[test]
    fn test_spec_from_argv() {
        let spec = ProcessSpec::from_argv(&["./serve".to_string(), "--port".to_string()]).unwrap();
        assert_eq!(spec.program, "./serve");
        assert_eq!(spec.args, vec!["--port"]);
        assert!(ProcessSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn test_spec_display() {
        let spec = ProcessSpec::new("java").arg("-jar").arg("server.jar");
        assert_eq!(spec.display(), "java -jar server.jar");
    }

    #[test]
    fn test_interrupt_then_kill() {
        let spec = ProcessSpec::new("sh")
            .arg("-c")
            .arg("trap '' INT; exec sleep 30");
        let mut process = SystemLauncher.spawn(&spec).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));

        process.interrupt().unwrap();
        assert_eq!(process.poll().unwrap(), None);

        process.kill().unwrap();
        assert_eq!(process.wait().unwrap(), -9);
        // Signalling a reaped process is harmless
        process.kill().unwrap();
    }

    #[test]
    fn test_poll_reports_exit_code() {
        let spec = ProcessSpec::new("sh").arg("-c").arg("exit 3");
        let mut process = SystemLauncher.spawn(&spec).unwrap();
        assert_eq!(process.wait().unwrap(), 3);
        assert_eq!(process.poll().unwrap(), Some(3));
    }

    #[test]
    fn test_env_is_set_on_child() {
        let spec = ProcessSpec::new("sh")
            .arg("-c")
            .arg(r#"test "$DISPLAY" = ":42""#)
            .env("DISPLAY", ":42");
        let mut process = SystemLauncher.spawn(&spec).unwrap();
        assert_eq!(process.wait().unwrap(), 0);
    }

    #[test]
    fn test_spawn_failure_is_fatal_startup() {
        let spec = ProcessSpec::new("/nonexistent/seltest-binary");
        let err = match SystemLauncher.spawn(&spec) {
            Err(e) => e,
            Ok(_) => panic!("spawn of a missing binary succeeded"),
        };
        assert!(matches!(err, RunnerError::FatalStartup(FatalStartupError::Spawn { .. })));
    }
}
