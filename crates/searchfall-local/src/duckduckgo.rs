//! Secondary tier: DuckDuckGo's keyless HTML endpoint. Community
//! rate-limited, so its retry budget is wider than the keyed tiers.

use scraper::{Html, Selector};

use searchfall_core::{
    normalize::{self, SearchHit, MAX_HITS},
    AttemptPlan, ProviderAdapter, ProviderResult, SearchRequest, TierId,
};

use crate::{percent_decode, request_timeout, transport_failure};

fn ddg_endpoint_from_env() -> String {
    std::env::var("SEARCHFALL_DDG_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "https://html.duckduckgo.com/html/".to_string())
}

#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: ddg_endpoint_from_env(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// DDG result links are redirect-wrapped: `//duckduckgo.com/l/?uddg=<encoded>&rut=…`.
fn unwrap_ddg_redirect(href: &str) -> String {
    let Some(start) = href.find("uddg=") else {
        return href.to_string();
    };
    let rest = &href[start + "uddg=".len()..];
    let end = rest.find('&').unwrap_or(rest.len());
    percent_decode(&rest[..end])
}

fn parse_hits(html: &str) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for result in doc.select(&result_sel).take(MAX_HITS) {
        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        let url = anchor
            .value()
            .attr("href")
            .map(unwrap_ddg_redirect)
            .unwrap_or_default();
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if url.is_empty() {
            continue;
        }
        hits.push(SearchHit {
            title,
            snippet,
            url,
        });
    }
    hits
}

#[async_trait::async_trait]
impl ProviderAdapter for DuckDuckGoSearch {
    fn tier(&self) -> TierId {
        TierId::Secondary
    }

    async fn query(&self, req: &SearchRequest, _plan: &AttemptPlan) -> ProviderResult {
        let resp = match self
            .client
            .get(&self.endpoint)
            .query(&[("q", req.query.as_str())])
            .timeout(request_timeout())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return transport_failure("duckduckgo search", &e),
        };

        let status = resp.status();
        // DDG signals rate limiting as 202 (and occasionally 429).
        if status == reqwest::StatusCode::ACCEPTED
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return ProviderResult::Transient {
                reason: format!("duckduckgo search HTTP {status}"),
            };
        }
        if !status.is_success() {
            return ProviderResult::Fatal {
                reason: format!("duckduckgo search HTTP {status}"),
            };
        }

        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                return ProviderResult::Fatal {
                    reason: format!("duckduckgo search returned unreadable body: {e}"),
                }
            }
        };

        let hits = parse_hits(&body);
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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    const FIXTURE: &str = r#"
    <html><body>
      <div class="result">
        <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Ftesla&amp;rut=abc">Tesla News</a></h2>
        <a class="result__snippet">Shares rose on delivery numbers.</a>
      </div>
      <div class="result">
        <h2><a class="result__a" href="https://plain.example/page">Plain Link</a></h2>
        <a class="result__snippet">Unwrapped href.</a>
      </div>
    </body></html>
    "#;

    #[test]
    fn parses_results_and_unwraps_redirect_links() {
        let hits = parse_hits(FIXTURE);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Tesla News");
        assert_eq!(hits[0].url, "https://example.com/tesla");
        assert_eq!(hits[0].snippet, "Shares rose on delivery numbers.");
        assert_eq!(hits[1].url, "https://plain.example/page");
    }

    #[test]
    fn unwrap_passes_through_plain_hrefs() {
        assert_eq!(
            unwrap_ddg_redirect("https://example.com/a"),
            "https://example.com/a"
        );
        assert_eq!(
            unwrap_ddg_redirect("/l/?uddg=https%3A%2F%2Fa.example&rut=x"),
            "https://a.example"
        );
    }

    #[test]
    fn empty_page_parses_to_no_hits() {
        assert!(parse_hits("<html><body></body></html>").is_empty());
    }

    async fn spawn_fixture(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn plan() -> AttemptPlan {
        AttemptPlan {
            tiers: vec![TierId::Secondary],
            premium: None,
        }
    }

    #[tokio::test]
    async fn http_202_is_a_transient_rate_limit_signal() {
        let app = Router::new().route("/html/", get(|| async { (StatusCode::ACCEPTED, "") }));
        let addr = spawn_fixture(app).await;

        let adapter = DuckDuckGoSearch::new(reqwest::Client::new())
            .with_endpoint(format!("http://{addr}/html/"));
        let req = SearchRequest::new("q");

        assert!(adapter.query(&req, &plan()).await.is_transient());
    }

    #[tokio::test]
    async fn serves_normalized_hits_from_html() {
        let app = Router::new().route("/html/", get(|| async { axum::response::Html(FIXTURE) }));
        let addr = spawn_fixture(app).await;

        let adapter = DuckDuckGoSearch::new(reqwest::Client::new())
            .with_endpoint(format!("http://{addr}/html/"));
        let req = SearchRequest::new("Tesla stock news");

        match adapter.query(&req, &plan()).await {
            ProviderResult::Success { text, .. } => {
                assert!(text.starts_with("Tesla News\nShares rose on delivery numbers."));
                assert!(text.contains("Source: https://example.com/tesla"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}
