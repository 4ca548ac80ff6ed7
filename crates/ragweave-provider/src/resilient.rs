//! Resilient Caller (C2): retry with backoff, per-provider rate-limit
//! gating, and fallback across a chain of providers. Wraps every outbound
//! call to a `ProviderAdapter`.

use crate::backend::ProviderAdapter;
use ragweave_common::{ProviderConfig, RagError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    None,
    FixedDelay,
    LinearBackoff,
    ExponentialBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::ExponentialBackoff
    }
}

const EXPONENTIAL_CAP_MS: u64 = 60_000;

impl RetryPolicy {
    /// Delay before the given attempt (1-indexed), given a configured base delay.
    fn delay(&self, attempt: u32, base_delay_ms: u64) -> Duration {
        let ms = match self {
            RetryPolicy::None => 0,
            RetryPolicy::FixedDelay => base_delay_ms,
            RetryPolicy::LinearBackoff => base_delay_ms.saturating_mul(attempt as u64),
            RetryPolicy::ExponentialBackoff => {
                let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
                base_delay_ms.saturating_mul(factor).min(EXPONENTIAL_CAP_MS)
            }
        };
        Duration::from_millis(ms)
    }
}

fn is_retriable(err: &RagError) -> bool {
    err.is_retriable()
}

/// Single-holder gate enforcing a minimum interval between calls to one
/// provider. Acquired before issuing a call, released on every exit path
/// including cancellation because the guard's `Drop` does the release.
pub struct RateGate {
    min_interval: Duration,
    next_allowed: Mutex<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, next_allowed: Mutex::new(Instant::now()) }
    }

    /// Blocks the caller until the minimum interval since the last
    /// acquisition has elapsed, then reserves the next slot. Waiters are
    /// served FIFO because the mutex itself queues them in arrival order.
    pub async fn acquire(&self) {
        let mut next = self.next_allowed.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep(*next - now).await;
        }
        *next = Instant::now() + self.min_interval;
    }
}

/// Ordered list of providers to fall back to when the primary is
/// exhausted. Only consulted for generation and batch embedding calls,
/// per §4.2.
#[derive(Clone, Default)]
pub struct FallbackChain {
    pub providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { providers }
    }
}

/// Wraps a primary provider with retry, rate limiting, and fallback.
pub struct ResilientCaller {
    primary: Arc<dyn ProviderAdapter>,
    fallbacks: FallbackChain,
    enable_fallback: bool,
    max_attempts: u32,
    retry_policy: RetryPolicy,
    base_delay_ms: u64,
    gates: HashMap<String, Arc<RateGate>>,
}

impl ResilientCaller {
    pub fn new(primary: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            primary,
            fallbacks: FallbackChain::default(),
            enable_fallback: false,
            max_attempts: 3,
            retry_policy: RetryPolicy::ExponentialBackoff,
            base_delay_ms: 1000,
            gates: HashMap::new(),
        }
    }

    pub fn with_fallbacks(mut self, chain: FallbackChain) -> Self {
        self.enable_fallback = !chain.providers.is_empty();
        self.fallbacks = chain;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.retry_policy = policy;
        self.max_attempts = max_attempts.max(1);
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Registers (or replaces) the rate gate for a named provider. Pass a
    /// zero interval to effectively disable gating.
    pub fn with_gate(mut self, provider_name: impl Into<String>, min_interval: Duration) -> Self {
        self.gates.insert(provider_name.into(), Arc::new(RateGate::new(min_interval)));
        self
    }

    async fn gated_call<F, Fut, T>(&self, provider_name: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(gate) = self.gates.get(provider_name) {
            gate.acquire().await;
        }
        f().await
    }

    /// Retries `call` against one adapter up to `max_attempts`, honoring
    /// the configured retry policy and triggers from §4.2.
    async fn call_with_retry<F, Fut, T>(&self, provider_name: &str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            let result = self.gated_call(provider_name, &call).await;
            match result {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && is_retriable(&e) => {
                    let delay = self.retry_policy.delay(attempt, self.base_delay_ms);
                    tracing::warn!(provider = provider_name, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying provider call");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Calls `generateText` on the primary, falling back through the
    /// configured chain if the primary exhausts its retries.
    pub async fn generate_text(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        let primary = self.primary.clone();
        let primary_result = self.call_with_retry("primary", || {
            let primary = primary.clone();
            let prompt = prompt.to_string();
            async move { primary.generate_text(&prompt, config).await }
        }).await;

        match primary_result {
            Ok(v) => Ok(v),
            Err(primary_err) if self.enable_fallback => {
                for (idx, fb) in self.fallbacks.providers.iter().enumerate() {
                    let name = format!("fallback-{idx}");
                    let fb = fb.clone();
                    let prompt = prompt.to_string();
                    let attempt = self.call_with_retry(&name, || {
                        let fb = fb.clone();
                        let prompt = prompt.clone();
                        async move { fb.generate_text(&prompt, config).await }
                    }).await;
                    if let Ok(v) = attempt {
                        tracing::info!(primary = "fail", fallback = "success", "fallback provider served request");
                        return Ok(v);
                    }
                }
                Err(primary_err)
            }
            Err(e) => Err(e),
        }
    }

    /// Calls `embedBatch` on the primary; falls back to the chain only if
    /// fallback is enabled, matching the "partial success acceptable for
    /// batch operations" rule in §4.2.
    pub async fn embed_batch(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        let primary = self.primary.clone();
        let texts_owned = texts.to_vec();
        let primary_result = self.call_with_retry("primary", || {
            let primary = primary.clone();
            let texts = texts_owned.clone();
            async move { primary.embed_batch(&texts, config).await }
        }).await;

        match primary_result {
            Ok(v) => Ok(v),
            Err(primary_err) if self.enable_fallback => {
                for (idx, fb) in self.fallbacks.providers.iter().enumerate() {
                    let name = format!("fallback-{idx}");
                    let fb = fb.clone();
                    let texts = texts_owned.clone();
                    let attempt = self.call_with_retry(&name, || {
                        let fb = fb.clone();
                        let texts = texts.clone();
                        async move { fb.embed_batch(&texts, config).await }
                    }).await;
                    if let Ok(v) = attempt {
                        return Ok(v);
                    }
                }
                Err(primary_err)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let p = RetryPolicy::ExponentialBackoff;
        assert_eq!(p.delay(1, 1000), Duration::from_millis(1000));
        assert_eq!(p.delay(2, 1000), Duration::from_millis(2000));
        assert_eq!(p.delay(3, 1000), Duration::from_millis(4000));
        assert_eq!(p.delay(20, 1000), Duration::from_millis(EXPONENTIAL_CAP_MS));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let p = RetryPolicy::FixedDelay;
        assert_eq!(p.delay(1, 500), Duration::from_millis(500));
        assert_eq!(p.delay(5, 500), Duration::from_millis(500));
    }

    #[test]
    fn none_policy_never_waits() {
        let p = RetryPolicy::None;
        assert_eq!(p.delay(4, 1000), Duration::ZERO);
    }

    #[tokio::test]
    async fn rate_gate_enforces_minimum_interval() {
        let gate = RateGate::new(Duration::from_millis(200));
        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
