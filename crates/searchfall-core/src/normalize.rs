//! Converts provider payloads into the engine's unified text shape. All four
//! tiers funnel through here so downstream consumers see one format.

use serde::{Deserialize, Serialize};

use crate::plan::PremiumParams;

/// Exact literal the hit-list tiers emit for zero hits. The orchestrator
/// treats it as a continue-the-chain signal, not a terminal success.
pub const NO_RESULTS: &str = "No results found.";

/// How many hits the hit-list tiers keep.
pub const MAX_HITS: usize = 5;

/// Unified hit shape for the primary/secondary/scrape tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Render ranked hits as `title\nsnippet\nSource: url` blocks, top
/// [`MAX_HITS`] only, joined by blank lines. Provider order is preserved.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }
    hits.iter()
        .take(MAX_HITS)
        .map(|h| format!("{}\n{}\nSource: {}", h.title, h.snippet, h.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Premium assistant text plus, when citations were requested and returned,
/// a 1-indexed `Sources:` section capped at `max_search_results`.
pub fn format_premium(content: &str, citations: &[String], params: &PremiumParams) -> String {
    let mut out = content.to_string();
    if params.return_citations && !citations.is_empty() {
        out.push_str("\n\nSources:\n");
        for (i, citation) in citations.iter().take(params.max_search_results).enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, citation));
        }
    }
    out
}
