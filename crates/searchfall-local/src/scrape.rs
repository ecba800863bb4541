//! Scrape tier: last-resort scraping of a public search-results page.
//! Already a degraded path, so it gets a single attempt and every failure
//! is terminal for the tier.

use scraper::{Html, Selector};

use searchfall_core::{
    normalize::{self, SearchHit, MAX_HITS},
    AttemptPlan, ProviderAdapter, ProviderResult, SearchRequest, TierId,
};

use crate::{percent_decode, request_timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeEngine {
    Bing,
    Yahoo,
}

impl ScrapeEngine {
    pub fn name(&self) -> &'static str {
        match self {
            ScrapeEngine::Bing => "bing",
            ScrapeEngine::Yahoo => "yahoo",
        }
    }

    /// Engine choice is explicit and seedable so tests can force either
    /// branch; without a seed it is a stable hash of the query, so the same
    /// request always scrapes the same engine.
    pub fn pick(query: &str, seed: Option<u64>) -> Self {
        let n = seed.unwrap_or_else(|| stable_hash64(query));
        if n % 2 == 0 {
            ScrapeEngine::Bing
        } else {
            ScrapeEngine::Yahoo
        }
    }

    fn search_url(&self, base: Option<&str>, query: &str) -> String {
        let q = query.replace(' ', "+");
        match base {
            Some(b) => format!("{}?q={q}", b.trim_end_matches('/')),
            None => match self {
                ScrapeEngine::Bing => format!("https://www.bing.com/search?q={q}"),
                ScrapeEngine::Yahoo => format!("https://search.yahoo.com/search?p={q}"),
            },
        }
    }

    fn result_selector(&self) -> &'static str {
        match self {
            ScrapeEngine::Bing => "li.b_algo",
            ScrapeEngine::Yahoo => "div.algo",
        }
    }

    fn title_selector(&self) -> &'static str {
        match self {
            ScrapeEngine::Bing => "h2",
            ScrapeEngine::Yahoo => "h3",
        }
    }

    fn snippet_selector(&self) -> &'static str {
        match self {
            ScrapeEngine::Bing => ".b_caption p",
            ScrapeEngine::Yahoo => "div.compText",
        }
    }

    fn link_selector(&self) -> &'static str {
        match self {
            ScrapeEngine::Bing => "h2 a",
            ScrapeEngine::Yahoo => "h3 a",
        }
    }
}

// Stable across runs (unlike HashMap's RandomState). FNV-1a over the query.
fn stable_hash64(query: &str) -> u64 {
    let mut h: u64 = 1469598103934665603;
    for b in query.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    h
}

/// Yahoo wraps result links in a redirector; the target sits in an
/// `RU=<encoded>/` segment of the path.
fn unwrap_yahoo_redirect(href: &str) -> String {
    let Some(start) = href.find("RU=") else {
        return href.to_string();
    };
    let rest = &href[start + "RU=".len()..];
    let end = rest.find('/').unwrap_or(rest.len());
    percent_decode(&rest[..end])
}

pub fn parse_hits(engine: ScrapeEngine, html: &str) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel), Ok(link_sel)) = (
        Selector::parse(engine.result_selector()),
        Selector::parse(engine.title_selector()),
        Selector::parse(engine.snippet_selector()),
        Selector::parse(engine.link_selector()),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for result in doc.select(&result_sel).take(MAX_HITS) {
        let title = result
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No title".to_string());
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No description".to_string());
        let link = result
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("#");
        let url = match engine {
            ScrapeEngine::Yahoo => unwrap_yahoo_redirect(link),
            ScrapeEngine::Bing => link.to_string(),
        };
        hits.push(SearchHit {
            title,
            snippet,
            url,
        });
    }
    hits
}

#[derive(Debug, Clone)]
pub struct ScrapeSearch {
    client: reqwest::Client,
    seed: Option<u64>,
    endpoint: Option<String>,
}

impl ScrapeSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            seed: None,
            endpoint: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScrapeSearch {
    fn tier(&self) -> TierId {
        TierId::Scrape
    }

    async fn query(&self, req: &SearchRequest, _plan: &AttemptPlan) -> ProviderResult {
        let engine = ScrapeEngine::pick(&req.query, self.seed);
        let url = engine.search_url(self.endpoint.as_deref(), &req.query);
        tracing::debug!(engine = engine.name(), "scrape tier engine selected");

        let resp = match self
            .client
            .get(&url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .header("Referer", "https://www.google.com/")
            .header("DNT", "1")
            .header("Upgrade-Insecure-Requests", "1")
            .timeout(request_timeout())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return ProviderResult::Fatal {
                    reason: format!("{} scrape failed: {e}", engine.name()),
                }
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return ProviderResult::Fatal {
                reason: format!("{} returned HTTP {status}", engine.name()),
            };
        }

        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                return ProviderResult::Fatal {
                    reason: format!("{} returned unreadable body: {e}", engine.name()),
                }
            }
        };

        let hits = parse_hits(engine, &body);
        if hits.is_empty() {
            return ProviderResult::Empty;
        }
        let citations = hits.iter().map(|h| h.url.clone()).collect();
        ProviderResult::Success {
            text: normalize::format_hits(&hits),
            citations,
        }
    }
}
