//! Premium tier: xAI Live Search via the chat-completions endpoint with a
//! `search_parameters` object. Realtime, citation-capable, metered.

use serde::{Deserialize, Serialize};

use searchfall_core::{
    normalize, AttemptPlan, Error, PremiumParams, ProviderAdapter, ProviderResult, Result,
    SearchRequest, TierId,
};

use crate::{env_var_nonempty, request_timeout, transport_failure};

const DEFAULT_MODEL: &str = "grok-3-latest";
const MAX_TOKENS: u64 = 4_000;
const TEMPERATURE: f64 = 0.3;

fn xai_api_key_from_env() -> Option<String> {
    env_var_nonempty("SEARCHFALL_XAI_API_KEY", "XAI_API_KEY")
}

fn xai_endpoint_from_env() -> String {
    // Docs: https://docs.x.ai/docs/guides/live-search
    //
    // Allow override for testing/debugging (do not include secrets here).
    std::env::var("SEARCHFALL_XAI_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "https://api.x.ai/v1/chat/completions".to_string())
}

#[derive(Debug, Clone)]
pub struct XaiLiveSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl XaiLiveSearch {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = xai_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing SEARCHFALL_XAI_API_KEY (or XAI_API_KEY)".to_string())
        })?;
        Ok(Self {
            client,
            api_key,
            endpoint: xai_endpoint_from_env(),
        })
    }

    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            endpoint: xai_endpoint_from_env(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'static str,
    messages: Vec<Message>,
    search_parameters: &'a PremiumParams,
    max_tokens: u64,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl ProviderAdapter for XaiLiveSearch {
    fn tier(&self) -> TierId {
        TierId::Premium
    }

    async fn query(&self, req: &SearchRequest, plan: &AttemptPlan) -> ProviderResult {
        let default_params = PremiumParams::default();
        let params = plan.premium.as_ref().unwrap_or(&default_params);

        let body = ChatCompletionsRequest {
            model: DEFAULT_MODEL,
            messages: vec![Message {
                role: "user",
                content: format!("Search for and provide information about: {}", req.query),
            }],
            search_parameters: params,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let resp = match self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(request_timeout())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return transport_failure("xai live search", &e),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ProviderResult::Transient {
                reason: format!("xai live search HTTP {status}"),
            };
        }
        if !status.is_success() {
            return ProviderResult::Fatal {
                reason: format!("xai live search HTTP {status}"),
            };
        }

        let parsed: ChatCompletionsResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                return ProviderResult::Fatal {
                    reason: format!("xai live search returned malformed body: {e}"),
                }
            }
        };

        let Some(choice) = parsed.choices.into_iter().next() else {
            return ProviderResult::Empty;
        };
        let citations = parsed.citations.unwrap_or_default();
        let text = normalize::format_premium(&choice.message.content, &citations, params);
        if text.trim().is_empty() {
            return ProviderResult::Empty;
        }
        ProviderResult::Success { text, citations }
    }
}
