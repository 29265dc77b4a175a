use std::{future::Future, num::NonZeroU32, sync::Arc, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use switchyard_config::QueueConfig;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::QueueError;

/// Per-provider admission control for outbound HTTP calls
///
/// Admission is FIFO: waiters are served in the order they called
/// [`RequestQueue::enqueue`]. At most `max_concurrent` calls are in flight,
/// and an optional quota paces how often new calls start. One instance is
/// shared by every request routed to the same provider.
pub struct RequestQueue {
    name: String,
    max_concurrent: usize,
    slots: Arc<Semaphore>,
    pacer: Option<DefaultDirectRateLimiter>,
    queue_timeout: Option<Duration>,
}

impl RequestQueue {
    /// Create a queue with a concurrency ceiling and no pacing
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            name: name.into(),
            max_concurrent,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            pacer: None,
            queue_timeout: None,
        }
    }

    /// Build a queue from provider configuration
    pub fn from_config(name: impl Into<String>, config: &QueueConfig) -> Result<Self, QueueError> {
        let mut queue = Self::new(name, config.max_concurrent);

        if let Some(ref rate) = config.rate_limit {
            queue = queue.with_rate_limit(rate.requests, parse_duration(&rate.window)?)?;
        }
        if let Some(ref timeout) = config.queue_timeout {
            queue = queue.with_queue_timeout(parse_duration(timeout)?);
        }

        Ok(queue)
    }

    /// Pace admissions to `requests` per `window`, allowing a burst of `requests`
    pub fn with_rate_limit(mut self, requests: u32, window: Duration) -> Result<Self, QueueError> {
        let burst = NonZeroU32::new(requests)
            .ok_or_else(|| QueueError::Config("rate limit requests must be > 0".to_owned()))?;
        if window.is_zero() {
            return Err(QueueError::Config("rate limit window must be > 0".to_owned()));
        }

        let quota = Quota::with_period(window / requests)
            .ok_or_else(|| QueueError::Config("invalid rate limit period".to_owned()))?
            .allow_burst(burst);

        self.pacer = Some(RateLimiter::direct(quota));
        Ok(self)
    }

    /// Fail admissions that wait longer than `timeout`
    #[must_use]
    pub const fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    /// Queue name (the provider it guards)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of calls currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    /// Run `fetch` once a slot is available
    ///
    /// The slot is held until `fetch` settles. It is released whether the
    /// future resolves, returns an error, or is dropped by the caller.
    /// Errors from `fetch` are returned unchanged.
    pub async fn enqueue<F, Fut, T, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<QueueError>,
    {
        let ticket = self.acquire().await?;
        let result = fetch().await;
        drop(ticket);
        result
    }

    /// Wait for a slot, honoring the admission timeout
    pub async fn acquire(&self) -> Result<QueueTicket, QueueError> {
        match self.queue_timeout {
            Some(limit) => tokio::time::timeout(limit, self.admit()).await.unwrap_or_else(|_| {
                tracing::warn!(queue = %self.name, timeout_ms = limit.as_millis(), "queue admission timed out");
                Err(QueueError::Timeout {
                    queue: self.name.clone(),
                    waited: limit,
                })
            }),
            None => self.admit().await,
        }
    }

    async fn admit(&self) -> Result<QueueTicket, QueueError> {
        if self.slots.available_permits() == 0 {
            tracing::debug!(queue = %self.name, max_concurrent = self.max_concurrent, "call waiting for a slot");
        }

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| QueueError::Closed(self.name.clone()))?;

        // Pace after taking the slot so waiters keep their arrival order
        if let Some(ref pacer) = self.pacer {
            pacer.until_ready().await;
        }

        tracing::debug!(queue = %self.name, in_flight = self.in_flight(), "slot acquired");

        Ok(QueueTicket {
            _permit: permit,
            queue: self.name.clone(),
        })
    }
}

/// An in-flight slot in a [`RequestQueue`], released on drop
pub struct QueueTicket {
    _permit: OwnedSemaphorePermit,
    queue: String,
}

impl Drop for QueueTicket {
    fn drop(&mut self) {
        tracing::debug!(queue = %self.queue, "slot released");
    }
}

fn parse_duration(s: &str) -> Result<Duration, QueueError> {
    duration_str::parse(s).map_err(|e| QueueError::Config(format!("invalid duration '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::{Duration, Instant},
    };

    use switchyard_config::{QueueConfig, QueueRateLimit};

    use super::*;

    #[derive(Debug)]
    enum CallError {
        Queue(QueueError),
        Upstream(u16),
    }

    impl From<QueueError> for CallError {
        fn from(e: QueueError) -> Self {
            Self::Queue(e)
        }
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_ceiling() {
        let queue = Arc::new(RequestQueue::new("ceiling", 2));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let queue = Arc::clone(&queue);
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(|| async {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, CallError>(())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn fetch_error_propagates_and_releases_slot() {
        let queue = RequestQueue::new("errors", 1).with_queue_timeout(Duration::from_millis(200));

        let err = queue
            .enqueue(|| async { Err::<(), _>(CallError::Upstream(503)) })
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Upstream(503)));
        assert_eq!(queue.in_flight(), 0);

        let started = Instant::now();
        let value = queue.enqueue(|| async { Ok::<_, CallError>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn cancelled_caller_releases_slot() {
        let queue = Arc::new(RequestQueue::new("cancel", 1).with_queue_timeout(Duration::from_millis(500)));

        let held = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue
                    .enqueue(|| async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok::<_, CallError>(())
                    })
                    .await
            })
        };

        while queue.in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        held.abort();
        assert!(held.await.unwrap_err().is_cancelled());
        assert_eq!(queue.in_flight(), 0);

        queue.enqueue(|| async { Ok::<_, CallError>(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn admits_in_arrival_order() {
        let queue = Arc::new(RequestQueue::new("fifo", 1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let gate = queue.acquire().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let queue = Arc::clone(&queue);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(|| async {
                        order.lock().unwrap().push(i);
                        Ok::<_, CallError>(())
                    })
                    .await
            }));
            // let each waiter register before the next arrives
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(gate);
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn admission_timeout_surfaces_as_queue_error() {
        let queue = RequestQueue::new("slow", 1).with_queue_timeout(Duration::from_millis(20));
        let _held = queue.acquire().await.unwrap();

        let err = queue.enqueue(|| async { Ok::<_, CallError>(()) }).await.unwrap_err();
        assert!(matches!(err, CallError::Queue(QueueError::Timeout { .. })));
    }

    #[tokio::test]
    async fn rate_limit_paces_admissions() {
        let queue = RequestQueue::new("paced", 4)
            .with_rate_limit(2, Duration::from_millis(400))
            .unwrap();

        let started = Instant::now();
        for _ in 0..3 {
            queue.enqueue(|| async { Ok::<_, CallError>(()) }).await.unwrap();
        }

        // burst of two, the third waits one period (200ms)
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn from_config_parses_durations() {
        let config = QueueConfig {
            max_concurrent: 3,
            rate_limit: Some(QueueRateLimit {
                requests: 10,
                window: "1m".to_owned(),
            }),
            queue_timeout: Some("5s".to_owned()),
        };

        let queue = RequestQueue::from_config("cfg", &config).unwrap();
        assert_eq!(queue.name(), "cfg");
        assert_eq!(queue.max_concurrent, 3);
        assert_eq!(queue.queue_timeout, Some(Duration::from_secs(5)));
        assert!(queue.pacer.is_some());
    }

    #[test]
    fn from_config_rejects_invalid_window() {
        let config = QueueConfig {
            max_concurrent: 1,
            rate_limit: Some(QueueRateLimit {
                requests: 1,
                window: "whenever".to_owned(),
            }),
            queue_timeout: None,
        };

        let err = RequestQueue::from_config("bad", &config).err().unwrap();
        assert!(matches!(err, QueueError::Config(_)));
    }
}
