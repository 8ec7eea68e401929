//! Client-side presence heartbeat
//!
//! Pings on a fixed interval until stopped or dropped. Failures are logged
//! and swallowed; the next tick retries naturally.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

/// Handle to a running heartbeat; dropping it cancels the timer
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Start pinging every `period`, first ping one period from now
    pub fn spawn<F, Fut, E>(period: Duration, mut ping: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send,
        E: Display,
    {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = IntervalStream::new(interval);

            while ticks.next().await.is_some() {
                if let Err(e) = ping().await {
                    tracing::warn!("Heartbeat ping failed: {}", e);
                }
            }
        });

        Self { handle }
    }

    /// Cancel the timer immediately
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_heartbeat(period: Duration, fail: bool) -> (Heartbeat, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let heartbeat = Heartbeat::spawn(period, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err("store unavailable")
                } else {
                    Ok(())
                }
            }
        });
        (heartbeat, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_on_interval() {
        let (heartbeat, count) = counting_heartbeat(Duration::from_secs(30), false);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_heartbeat() {
        let (heartbeat, count) = counting_heartbeat(Duration::from_secs(30), true);
        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let (heartbeat, count) = counting_heartbeat(Duration::from_secs(30), false);
        tokio::time::sleep(Duration::from_secs(31)).await;
        heartbeat.stop();

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
