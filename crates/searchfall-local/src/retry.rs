//! Bounded retry with exponential backoff around a single provider adapter.
//! Only an explicit transient signal earns another attempt; fatal failures
//! and exhausted budgets return immediately. There is no cross-tier retry.

use std::time::Duration;

use searchfall_core::{AttemptPlan, ProviderAdapter, ProviderResult, SearchRequest, TierId};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Per-tier defaults. The secondary tier's backend is community
    /// rate-limited and noisier, so it gets a wider budget; the scrape tier
    /// is already a degraded path and gets exactly one shot.
    pub fn for_tier(tier: TierId) -> Self {
        match tier {
            TierId::Premium | TierId::Primary => Self {
                max_attempts: 3,
                base_delay: Duration::from_millis(500),
                backoff_factor: 2.0,
            },
            TierId::Secondary => Self {
                max_attempts: 5,
                base_delay: Duration::from_millis(500),
                backoff_factor: 2.0,
            },
            TierId::Scrape => Self {
                max_attempts: 1,
                base_delay: Duration::ZERO,
                backoff_factor: 1.0,
            },
        }
    }
}

pub async fn run(
    policy: &RetryPolicy,
    adapter: &dyn ProviderAdapter,
    req: &SearchRequest,
    plan: &AttemptPlan,
) -> ProviderResult {
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;
    let mut attempt = 1;
    loop {
        let result = adapter.query(req, plan).await;
        if !result.is_transient() || attempt >= max_attempts {
            return result;
        }
        if let ProviderResult::Transient { reason } = &result {
            warn!(
                tier = %adapter.tier(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "transient failure, backing off"
            );
        }
        tokio::time::sleep(delay).await;
        delay = delay.mul_f64(policy.backoff_factor);
        attempt += 1;
    }
}
