use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::DeployError;

#[derive(Debug, Clone, Copy)]
pub struct WaitOpts {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitOpts {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(5),
        }
    }
}

/// Polls a readiness predicate on a bounded interval instead of sleeping a
/// fixed duration. The probe is re-created per attempt; a probe that errors
/// should report `false` and let the timeout decide.
pub async fn poll_until<F, Fut>(what: &str, opts: WaitOpts, mut probe: F) -> Result<(), DeployError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    loop {
        if probe().await {
            return Ok(());
        }
        if started.elapsed() >= opts.timeout {
            return Err(DeployError::Timeout {
                what: what.to_owned(),
                waited: opts.timeout,
            });
        }
        sleep(opts.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn resolves_once_the_predicate_flips() {
        let attempts = AtomicU32::new(0);
        let result = poll_until("test readiness", WaitOpts::default(), || async {
            attempts.fetch_add(1, Ordering::SeqCst) >= 3
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_the_predicate_never_flips() {
        let opts = WaitOpts {
            timeout: Duration::from_secs(10),
            interval: Duration::from_secs(1),
        };
        let result = poll_until("never ready", opts, || async { false }).await;
        match result {
            Err(DeployError::Timeout { what, waited }) => {
                assert_eq!(what, "never ready");
                assert_eq!(waited, Duration::from_secs(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
