// Proactive token refresh
// Optional companion to the on-demand refresh in RdsIamAuthenticator

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::authenticator::RdsIamAuthenticator;
use crate::error::IamAuthError;

/// Background task refreshing a token on a fixed period
///
/// Dropping the handle cancels the task; [`BackgroundRefresher::stop`] also
/// waits for it to finish. Failures are logged and retried on the next tick,
/// callers still refresh on demand when the token goes stale.
pub struct BackgroundRefresher {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundRefresher {
    /// Start refreshing every `period`, first tick one period from now
    ///
    /// A zero period means the authenticator's refresh interval.
    pub fn start(authenticator: Arc<RdsIamAuthenticator>, period: Duration) -> Self {
        let period = if period.is_zero() {
            authenticator.refresh_interval()
        } else {
            period
        };
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(
                endpoint = %authenticator.endpoint(),
                period_secs = period.as_secs(),
                "Background RDS IAM token refresh started"
            );

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match authenticator.refresh(&task_cancel).await {
                            Ok(()) => {}
                            Err(IamAuthError::Cancelled) => break,
                            Err(e) => {
                                tracing::warn!(
                                    endpoint = %authenticator.endpoint(),
                                    error = %e,
                                    "Background RDS IAM token refresh failed"
                                );
                            }
                        }
                    }
                }
            }

            tracing::debug!(
                endpoint = %authenticator.endpoint(),
                "Background RDS IAM token refresh stopped"
            );
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Start with the authenticator's own refresh interval as period
    pub fn start_default(authenticator: Arc<RdsIamAuthenticator>) -> Self {
        let period = authenticator.refresh_interval();
        Self::start(authenticator, period)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the task and wait for it to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background RDS IAM token refresh task panicked");
            }
        }
    }
}

impl Drop for BackgroundRefresher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
