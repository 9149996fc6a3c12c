use std::future::Future;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::*;
use futures::future::LocalBoxFuture;
use futures::task::noop_waker;
use futures::FutureExt;

/// A snapshot of whatever the requesting team can see, handed to the external advisor (§6
/// "Strategic advisor").
#[derive(Debug, Clone)]
pub struct StrategicQuery {
    pub tick: u64,
    pub team_id: u32,
    pub credits: u32,
    pub active_unit_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StrategicAdvice {
    pub recommendations: Vec<String>,
    pub threats: Vec<String>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor request timed out")]
    Timeout,
    #[error("advisor circuit breaker is open")]
    CircuitOpen,
    #[error("an advisor request is already in flight")]
    Busy,
}

/// Implemented by whatever out-of-process advisor collaborator is wired in; `?Send` because the
/// core's tick loop is single-threaded and cooperative (§5).
#[async_trait(?Send)]
pub trait StrategicAdvisor {
    async fn advise(&self, query: StrategicQuery) -> Result<StrategicAdvice, AdvisorError>;
}

/// Non-blocking request/response port in front of a [StrategicAdvisor], with a timeout and a
/// circuit breaker (§6, §7 "external interface failure"). Never awaited from the tick: the tick
/// calls [AdvisorPort::poll] once and moves on regardless of the outcome.
pub struct AdvisorPort {
    timeout: Duration,
    circuit_breaker_threshold: u32,
    circuit_breaker_reset: Duration,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    pending: Option<(LocalBoxFuture<'static, Result<StrategicAdvice, AdvisorError>>, Instant)>,
}

impl AdvisorPort {
    pub fn new() -> Self {
        let cfg = config::get();
        Self::with_params(
            Duration::from_millis(cfg.advisor.timeout_ms),
            cfg.advisor.circuit_breaker_threshold,
            Duration::from_secs(cfg.advisor.circuit_breaker_reset_secs),
        )
    }

    pub fn with_params(
        timeout: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_reset: Duration,
    ) -> Self {
        Self {
            timeout,
            circuit_breaker_threshold,
            circuit_breaker_reset,
            consecutive_failures: 0,
            opened_at: None,
            pending: None,
        }
    }

    /// Half-open check: an open breaker rejects submissions until `circuit_breaker_reset` has
    /// elapsed, at which point a single trial submission is allowed through.
    fn circuit_is_open(&mut self) -> bool {
        match self.opened_at {
            Some(opened) if opened.elapsed() < self.circuit_breaker_reset => true,
            Some(_) => {
                self.opened_at = None;
                self.consecutive_failures = 0;
                false
            }
            None => false,
        }
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.circuit_breaker_threshold {
            self.opened_at = Some(Instant::now());
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Submits a new query. Fails fast if the breaker is open or a request is already in flight
    /// rather than queuing - callers decide whether to try again next tick.
    pub fn submit<A: StrategicAdvisor + 'static>(
        &mut self,
        advisor: &A,
        query: StrategicQuery,
    ) -> Result<(), AdvisorError> {
        if self.pending.is_some() {
            return Err(AdvisorError::Busy);
        }
        if self.circuit_is_open() {
            return Err(AdvisorError::CircuitOpen);
        }

        self.pending = Some((advisor.advise(query).boxed_local(), Instant::now()));
        Ok(())
    }

    /// Polls the in-flight request without blocking. Returns `None` while still pending; call
    /// once per tick and consume `Some` results opportunistically (§6).
    pub fn poll(&mut self) -> Option<Result<StrategicAdvice, AdvisorError>> {
        let (future, issued_at) = self.pending.as_mut()?;

        if issued_at.elapsed() >= self.timeout {
            self.pending = None;
            self.record_failure();
            return Some(Err(AdvisorError::Timeout));
        }

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Pending => None,
            Poll::Ready(result) => {
                self.pending = None;
                match &result {
                    Ok(_) => self.record_success(),
                    Err(_) => self.record_failure(),
                }
                Some(result)
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for AdvisorPort {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> StrategicQuery {
        StrategicQuery {
            tick: 0,
            team_id: 1,
            credits: 0,
            active_unit_count: 0,
        }
    }

    struct AlwaysOk;
    #[async_trait(?Send)]
    impl StrategicAdvisor for AlwaysOk {
        async fn advise(&self, _query: StrategicQuery) -> Result<StrategicAdvice, AdvisorError> {
            Ok(StrategicAdvice::default())
        }
    }

    struct AlwaysErr;
    #[async_trait(?Send)]
    impl StrategicAdvisor for AlwaysErr {
        async fn advise(&self, _query: StrategicQuery) -> Result<StrategicAdvice, AdvisorError> {
            Err(AdvisorError::Timeout)
        }
    }

    #[test]
    fn successful_request_resolves_on_poll() {
        let mut port = AdvisorPort::with_params(Duration::from_millis(500), 3, Duration::from_secs(30));
        port.submit(&AlwaysOk, query()).unwrap();
        assert!(matches!(port.poll(), Some(Ok(_))));
        assert!(!port.is_busy());
    }

    #[test]
    fn breaker_opens_after_threshold_failures_and_rejects_submissions() {
        let mut port = AdvisorPort::with_params(Duration::from_millis(500), 3, Duration::from_secs(30));
        for _ in 0..3 {
            port.submit(&AlwaysErr, query()).unwrap();
            assert!(matches!(port.poll(), Some(Err(_))));
        }
        assert!(matches!(
            port.submit(&AlwaysErr, query()),
            Err(AdvisorError::CircuitOpen)
        ));
    }

    #[test]
    fn busy_port_rejects_a_second_submission() {
        let mut port = AdvisorPort::with_params(Duration::from_millis(500), 3, Duration::from_secs(30));

        struct NeverResolves;
        #[async_trait(?Send)]
        impl StrategicAdvisor for NeverResolves {
            async fn advise(&self, _query: StrategicQuery) -> Result<StrategicAdvice, AdvisorError> {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }

        port.submit(&NeverResolves, query()).unwrap();
        assert!(port.poll().is_none());
        assert!(matches!(port.submit(&NeverResolves, query()), Err(AdvisorError::Busy)));
    }
}
