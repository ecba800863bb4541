//! Fallback orchestrator: sequences the eligible tiers in fixed priority
//! order and resolves every request to exactly one user-facing string. The
//! engine never raises to its caller; the worst case is a degraded
//! explanatory text from the last attempted tier.

use std::sync::Arc;

use searchfall_core::{
    resolve_plan, ProviderAdapter, ProviderResult, QuotaGuard, SearchOutcome, SearchRequest,
    TierId, UsageEvent, UsageRecorder, UserSearchPreferences, NO_RESULTS, QUOTA_NOTICE,
};
use tracing::{debug, info, warn};

use crate::brave::BraveSearch;
use crate::duckduckgo::DuckDuckGoSearch;
use crate::retry::{self, RetryPolicy};
use crate::scrape::ScrapeSearch;
use crate::xai::XaiLiveSearch;

pub struct TieredSearch {
    adapters: Vec<Box<dyn ProviderAdapter>>,
    quota: Option<Arc<dyn QuotaGuard>>,
    usage: Option<Arc<dyn UsageRecorder>>,
}

impl TieredSearch {
    pub fn new(adapters: Vec<Box<dyn ProviderAdapter>>) -> Self {
        Self {
            adapters,
            quota: None,
            usage: None,
        }
    }

    /// Build every adapter whose configuration is present. The key-less
    /// tiers are always available, so the chain never comes up empty.
    pub fn from_env(client: reqwest::Client) -> Self {
        let mut adapters: Vec<Box<dyn ProviderAdapter>> = Vec::new();
        match XaiLiveSearch::from_env(client.clone()) {
            Ok(a) => adapters.push(Box::new(a)),
            Err(e) => debug!(error = %e, "premium tier not configured; skipping"),
        }
        match BraveSearch::from_env(client.clone()) {
            Ok(a) => adapters.push(Box::new(a)),
            Err(e) => debug!(error = %e, "primary tier not configured; skipping"),
        }
        adapters.push(Box::new(DuckDuckGoSearch::new(client.clone())));
        adapters.push(Box::new(ScrapeSearch::new(client)));
        Self::new(adapters)
    }

    pub fn with_quota_guard(mut self, guard: Arc<dyn QuotaGuard>) -> Self {
        self.quota = Some(guard);
        self
    }

    pub fn with_usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.usage = Some(recorder);
        self
    }

    fn adapter_for(&self, tier: TierId) -> Option<&dyn ProviderAdapter> {
        self.adapters
            .iter()
            .find(|a| a.tier() == tier)
            .map(|a| a.as_ref())
    }

    /// Resolve one request to grounded text. Always returns; all tier-local
    /// failures are absorbed into the fallback chain.
    pub async fn search(
        &self,
        prefs: &UserSearchPreferences,
        req: &SearchRequest,
    ) -> SearchOutcome {
        let mut plan = resolve_plan(prefs, req);
        let mut quota_denied = false;

        // Gate the premium tier on the usage budget, once, before the first
        // premium attempt. Denial degrades this call only; nothing is cached.
        if plan.premium.is_some() {
            if let (Some(guard), Some(user)) = (self.quota.as_ref(), req.user) {
                match guard.check(&user).await {
                    Ok(decision) if !decision.can_proceed => {
                        warn!(
                            %user,
                            detail = %decision.detail,
                            "usage limit reached; dropping premium tier for this call"
                        );
                        plan.tiers.retain(|t| *t != TierId::Premium);
                        plan.premium = None;
                        quota_denied = true;
                    }
                    Ok(decision) => {
                        debug!(%user, detail = %decision.detail, "quota check passed");
                    }
                    Err(e) => {
                        // Fail open: a broken quota collaborator must not
                        // block the search pipeline.
                        warn!(%user, error = %e, "quota check failed; keeping premium tier");
                    }
                }
            }
        }

        let mut last: Option<ProviderResult> = None;
        for tier in plan.tiers.clone() {
            let Some(adapter) = self.adapter_for(tier) else {
                debug!(%tier, "tier has no configured adapter; skipping");
                continue;
            };
            info!(%tier, query = %req.query, "attempting search tier");
            let policy = RetryPolicy::for_tier(tier);
            let result = retry::run(&policy, adapter, req, &plan).await;

            if result.is_final_success() {
                let premium_was_used = tier == TierId::Premium;
                info!(%tier, premium_was_used, "search tier succeeded");
                if premium_was_used {
                    self.record_usage(req);
                }
                let mut text = result.into_text();
                if quota_denied {
                    text.push_str(QUOTA_NOTICE);
                }
                return SearchOutcome {
                    text,
                    premium_was_used,
                };
            }

            debug!(%tier, "tier produced no usable result; continuing fallback");
            last = Some(result);
        }

        // Every tier failed or came back empty: surface the last tier's
        // output verbatim rather than raising.
        let mut text = last
            .map(ProviderResult::into_text)
            .unwrap_or_else(|| NO_RESULTS.to_string());
        if quota_denied && !text.is_empty() {
            text.push_str(QUOTA_NOTICE);
        }
        SearchOutcome {
            text,
            premium_was_used: false,
        }
    }

    /// Usage is a best-effort side channel: dispatched off the request path,
    /// failures logged and dropped.
    fn record_usage(&self, req: &SearchRequest) {
        let (Some(recorder), Some(user)) = (self.usage.clone(), req.user) else {
            return;
        };
        let event = UsageEvent::premium(user);
        tokio::spawn(async move {
            if let Err(e) = recorder.record(event).await {
                warn!(error = %e, "usage recording failed; dropping event");
            }
        });
    }
}
