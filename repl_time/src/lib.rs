//! A `TimeProvider` abstraction so that every component that needs "now"
//! (heartbeats, expiration timers, `Performance` timestamps) can be driven by
//! a deterministic clock in tests.
//!
//! All timestamps in the persisted model are milliseconds since the Unix
//! epoch, UTC (see `repl_types::Performance`).

use std::{
    fmt::Debug,
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

/// A point in time, represented as milliseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Time(i64);

impl Time {
    pub const MIN: Time = Time(i64::MIN);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn checked_add(&self, d: Duration) -> Option<Self> {
        i64::try_from(d.as_millis())
            .ok()
            .and_then(|ms| self.0.checked_add(ms))
            .map(Self)
    }

    pub fn checked_duration_since(&self, earlier: Time) -> Option<Duration> {
        let delta = self.0.checked_sub(earlier.0)?;
        if delta < 0 {
            None
        } else {
            Some(Duration::from_millis(delta as u64))
        }
    }

    pub fn as_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0).single().unwrap_or(Utc::now())
    }
}

/// Provides the current time and a way to pause/await durations.
///
/// Implemented both by a real wall-clock provider and, for tests, by a
/// [`MockProvider`] that only advances when told to.
pub trait TimeProvider: Debug + Send + Sync + 'static {
    fn now(&self) -> Time;

    /// Sleeps until `deadline` has passed according to this provider's clock.
    fn sleep_until<'a>(
        &'a self,
        deadline: Time,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider;

impl SystemProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        Time(Utc::now().timestamp_millis())
    }

    fn sleep_until<'a>(
        &'a self,
        deadline: Time,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let now = self.now();
            if let Some(remaining) = deadline.checked_duration_since(now) {
                tokio::time::sleep(remaining).await;
            }
        })
    }
}

/// A clock that only moves when [`MockProvider::set`] or
/// [`MockProvider::inc`] is called, for deterministic tests of timer-driven
/// components (request expiration, job heartbeats).
#[derive(Debug)]
pub struct MockProvider {
    now: AtomicI64,
    // Wakers for tasks parked in `sleep_until`, released by `set`/`inc`.
    waiters: Mutex<Vec<(i64, tokio::sync::oneshot::Sender<()>)>>,
}

impl MockProvider {
    pub fn new(start: Time) -> Self {
        Self {
            now: AtomicI64::new(start.millis()),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, time: Time) {
        self.now.store(time.millis(), Ordering::SeqCst);
        let mut waiters = self.waiters.lock();
        let ready = time.millis();
        waiters.retain_mut(|(deadline, tx)| {
            if *deadline <= ready {
                // Sender may already be dropped if the waiter timed out some other way.
                let dummy = std::mem::replace(tx, tokio::sync::oneshot::channel().0);
                let _ = dummy.send(());
                false
            } else {
                true
            }
        });
    }

    pub fn inc(&self, d: Duration) {
        let now = Time(self.now.load(Ordering::SeqCst));
        self.set(now.checked_add(d).unwrap_or(now));
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        Time(self.now.load(Ordering::SeqCst))
    }

    fn sleep_until<'a>(
        &'a self,
        deadline: Time,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if self.now() >= deadline {
                return;
            }
            let (tx, rx) = tokio::sync::oneshot::channel();
            self.waiters.lock().push((deadline.millis(), tx));
            let _ = rx.await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_arithmetic() {
        let t = Time::from_millis(1_000);
        let later = t.checked_add(Duration::from_millis(500)).unwrap();
        assert_eq!(later.millis(), 1_500);
        assert_eq!(later.checked_duration_since(t), Some(Duration::from_millis(500)));
        assert_eq!(t.checked_duration_since(later), None);
    }

    #[tokio::test]
    async fn mock_provider_releases_sleepers_on_advance() {
        let provider = std::sync::Arc::new(MockProvider::new(Time::from_millis(0)));
        let deadline = Time::from_millis(1_000);

        let waiter = {
            let provider = std::sync::Arc::clone(&provider);
            tokio::spawn(async move {
                provider.sleep_until(deadline).await;
            })
        };

        tokio::task::yield_now().await;
        provider.set(Time::from_millis(1_000));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("timed out")
            .unwrap();
    }
}
