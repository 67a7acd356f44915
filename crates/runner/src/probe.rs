//! Port readiness probing
//!
//! Blocks the caller until a TCP endpoint accepts connections or the attempt
//! budget is spent. Each attempt opens a socket and drops it immediately.

use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Default number of retries before giving up
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// Host, port and retry budget for one readiness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessTarget {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u32,
}

impl ReadinessTarget {
    pub fn local(port: u16, timeout_secs: u32) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            timeout_secs,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Polls a TCP endpoint until it is connectable
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    /// Upper bound on a single connection attempt
    pub attempt_timeout: Duration,

    /// Pause between failed attempts
    pub interval: Duration,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(1),
            interval: Duration::from_secs(1),
        }
    }
}

impl ReadinessProbe {
    /// Try a single connection to the target.
    pub async fn is_connectable(&self, target: &ReadinessTarget) -> bool {
        match timeout(self.attempt_timeout, TcpStream::connect(target.address())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("{} not connectable: {}", target.address(), e);
                false
            }
            Err(_) => {
                debug!("{} connect attempt timed out", target.address());
                false
            }
        }
    }

    /// Wait until the target accepts connections.
    ///
    /// Returns `false` once `timeout_secs` retries have failed. A budget of
    /// zero makes exactly one attempt and never sleeps.
    pub async fn wait_until_ready(&self, target: &ReadinessTarget) -> bool {
        poll_until(target.timeout_secs, self.interval, move || self.is_connectable(target)).await
    }
}

/// Block until `port` on the loopback interface is connectable.
pub async fn wait_until_ready(port: u16, timeout_secs: u32) -> bool {
    ReadinessProbe::default()
        .wait_until_ready(&ReadinessTarget::local(port, timeout_secs))
        .await
}

/// Retry `attempt` until it succeeds or `budget` retries have been spent.
///
/// The budget is checked before sleeping, so the final failed attempt
/// returns without a trailing pause.
pub(crate) async fn poll_until<F, Fut>(budget: u32, interval: Duration, mut attempt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut count = 0;
    while !attempt().await {
        if count == budget {
            return false;
        }
        count += 1;
        sleep(interval).await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::net::TcpListener;
    use tokio::time::Instant;

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn fast_probe() -> ReadinessProbe {
        ReadinessProbe {
            attempt_timeout: Duration::from_millis(200),
            interval: Duration::from_millis(20),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_makes_one_attempt_without_sleeping() {
        let attempts = Cell::new(0);
        let start = Instant::now();

        let ready = poll_until(0, Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            async { false }
        })
        .await;

        assert!(!ready);
        assert_eq!(attempts.get(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_sleeps_budget_times() {
        let attempts = Cell::new(0);
        let start = Instant::now();

        let ready = poll_until(5, Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            async { false }
        })
        .await;

        assert!(!ready);
        assert_eq!(attempts.get(), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_later_attempt() {
        let attempts = Cell::new(0);

        let ready = poll_until(10, Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            let n = attempts.get();
            async move { n == 4 }
        })
        .await;

        assert!(ready);
        assert_eq!(attempts.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_last_allowed_attempt() {
        let attempts = Cell::new(0);

        let ready = poll_until(3, Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            let n = attempts.get();
            async move { n == 4 }
        })
        .await;

        assert!(ready);
        assert_eq!(attempts.get(), 4);
    }

    #[tokio::test]
    async fn test_listening_port_is_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(
            fast_probe()
                .wait_until_ready(&ReadinessTarget::local(port, 0))
                .await
        );
    }

    #[tokio::test]
    async fn test_closed_port_is_not_ready() {
        let port = closed_port();
        let start = std::time::Instant::now();

        let ready = fast_probe()
            .wait_until_ready(&ReadinessTarget::local(port, 3))
            .await;

        assert!(!ready);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_port_that_opens_later() {
        let port = closed_port();
        let opener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap()
        });

        let ready = fast_probe()
            .wait_until_ready(&ReadinessTarget::local(port, 50))
            .await;

        assert!(ready);
        drop(opener.await.unwrap());
    }

    #[test]
    fn test_target_address() {
        let target = ReadinessTarget::local(4444, DEFAULT_TIMEOUT_SECS);
        assert_eq!(target.address(), "127.0.0.1:4444");
        assert_eq!(target.timeout_secs, 60);
    }
}
