//! Primary tier: Brave web search API. Keyed, non-metered, ranked hits.

use serde::Deserialize;

use searchfall_core::{
    normalize::{self, SearchHit},
    AttemptPlan, Error, ProviderAdapter, ProviderResult, Result, SearchRequest, TierId,
};

use crate::{env_var_nonempty, request_timeout, transport_failure};

fn brave_api_key_from_env() -> Option<String> {
    env_var_nonempty("SEARCHFALL_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY")
}

fn brave_endpoint_from_env() -> String {
    // Docs: https://api.search.brave.com/res/v1/web/search
    std::env::var("SEARCHFALL_BRAVE_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string())
}

#[derive(Debug, Clone)]
pub struct BraveSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveSearch {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing SEARCHFALL_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self {
            client,
            api_key,
            endpoint: brave_endpoint_from_env(),
        })
    }

    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            endpoint: brave_endpoint_from_env(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl ProviderAdapter for BraveSearch {
    fn tier(&self) -> TierId {
        TierId::Primary
    }

    async fn query(&self, req: &SearchRequest, _plan: &AttemptPlan) -> ProviderResult {
        let resp = match self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", req.query.as_str())])
            .timeout(request_timeout())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return transport_failure("brave search", &e),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ProviderResult::Transient {
                reason: format!("brave search HTTP {status}"),
            };
        }
        if !status.is_success() {
            return ProviderResult::Fatal {
                reason: format!("brave search HTTP {status}"),
            };
        }

        let parsed: BraveWebSearchResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                return ProviderResult::Fatal {
                    reason: format!("brave search returned malformed body: {e}"),
                }
            }
        };

        let hits: Vec<SearchHit> = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                snippet: r.description.unwrap_or_default(),
                url: r.url,
            })
            .collect();

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
