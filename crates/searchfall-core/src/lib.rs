use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod normalize;
pub mod plan;

pub use normalize::{SearchHit, NO_RESULTS};
pub use plan::{
    clean_handles, resolve_plan, AttemptPlan, PremiumParams, PremiumSource, UserSearchPreferences,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("quota check failed: {0}")]
    Quota(String),
    #[error("usage recording failed: {0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One ranked provider option in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierId {
    Premium,
    Primary,
    Secondary,
    Scrape,
}

/// Fixed attempt order. Later tiers exist to avoid incurring the premium
/// tier's cost, so this ordering is a correctness property, not a tuning knob.
pub const TIER_ORDER: [TierId; 4] = [
    TierId::Premium,
    TierId::Primary,
    TierId::Secondary,
    TierId::Scrape,
];

impl TierId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierId::Premium => "premium",
            TierId::Primary => "primary",
            TierId::Secondary => "secondary",
            TierId::Scrape => "scrape",
        }
    }
}

impl std::fmt::Display for TierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-call input. Dates are ISO8601 `YYYY-MM-DD` strings passed
/// through to the premium provider verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub handles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
    #[serde(default)]
    pub force_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Uuid>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            handles: Vec::new(),
            from_date: None,
            to_date: None,
            force_premium: false,
            user: None,
        }
    }
}

/// Outcome of one provider attempt. Every tier-local failure is folded into
/// this union; nothing unwinds past the retry executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    Success { text: String, citations: Vec<String> },
    Empty,
    Transient { reason: String },
    Fatal { reason: String },
}

impl ProviderResult {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderResult::Transient { .. })
    }

    /// A result only terminates the fallback chain when it carries usable text.
    /// A reachable-but-empty provider continues the chain, same as a broken one.
    pub fn is_final_success(&self) -> bool {
        match self {
            ProviderResult::Success { text, .. } => {
                !text.trim().is_empty() && !text.contains(NO_RESULTS)
            }
            _ => false,
        }
    }

    /// User-facing rendition used when this is the last attempted tier's output.
    pub fn into_text(self) -> String {
        match self {
            ProviderResult::Success { text, .. } => text,
            ProviderResult::Empty => NO_RESULTS.to_string(),
            ProviderResult::Transient { reason } | ProviderResult::Fatal { reason } => {
                format!("Search failed. {reason}")
            }
        }
    }
}

/// The only value the engine returns to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub text: String,
    pub premium_was_used: bool,
}

/// Appended to the final text when the quota guard denied the premium tier
/// but a later tier produced an answer.
pub const QUOTA_NOTICE: &str = "\n\nUsage limit reached - fell back to the standard search tiers. \
Please let the user know their premium live-search budget is exhausted for this period and that \
they can manage it in their account settings.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub can_proceed: bool,
    pub detail: String,
}

/// Fire-and-forget usage signal, emitted at most once per request and only
/// when the premium tier produced the final success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub user: Uuid,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}

impl UsageEvent {
    pub fn premium(user: Uuid) -> Self {
        Self {
            user,
            provider: "premium".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Uniform surface over the heterogeneous search backends.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn tier(&self) -> TierId;
    async fn query(&self, req: &SearchRequest, plan: &AttemptPlan) -> ProviderResult;
}

/// Pre-check gating premium eligibility. Called at most once per request;
/// an `Err` from the collaborator is fail-open.
#[async_trait::async_trait]
pub trait QuotaGuard: Send + Sync {
    async fn check(&self, user: &Uuid) -> Result<QuotaDecision>;
}

/// Usage side channel. Failures are logged and discarded, never surfaced.
#[async_trait::async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, event: UsageEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_order_is_premium_first_scrape_last() {
        assert_eq!(TIER_ORDER[0], TierId::Premium);
        assert_eq!(TIER_ORDER[3], TierId::Scrape);
        assert_eq!(TIER_ORDER.len(), 4);
    }

    #[test]
    fn success_with_no_results_marker_is_not_final() {
        let r = ProviderResult::Success {
            text: NO_RESULTS.to_string(),
            citations: vec![],
        };
        assert!(!r.is_final_success());
        let r = ProviderResult::Success {
            text: "   ".to_string(),
            citations: vec![],
        };
        assert!(!r.is_final_success());
        let r = ProviderResult::Success {
            text: "Tesla closed up 4%".to_string(),
            citations: vec![],
        };
        assert!(r.is_final_success());
    }

    #[test]
    fn failure_results_render_as_explanatory_text() {
        let r = ProviderResult::Fatal {
            reason: "bing returned HTTP 500".to_string(),
        };
        assert_eq!(r.into_text(), "Search failed. bing returned HTTP 500");
        assert_eq!(ProviderResult::Empty.into_text(), NO_RESULTS);
    }

    #[test]
    fn usage_event_is_tagged_premium() {
        let ev = UsageEvent::premium(Uuid::nil());
        assert_eq!(ev.provider, "premium");
    }
}
