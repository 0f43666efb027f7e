//! Web search tool: Brave Search or Tavily.
//!
//! The backend is picked from the key: Tavily keys start with `tvly-`,
//! anything else is treated as a Brave subscription token.

use std::time::Duration;

use async_trait::async_trait;
use domiclaw_core::error::ToolError;
use domiclaw_core::tool::{Tool, ToolContext};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::required_str;

const BRAVE_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const TAVILY_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Brave,
    Tavily,
}

impl SearchBackend {
    pub fn for_key(api_key: &str) -> Self {
        if api_key.starts_with("tvly-") {
            SearchBackend::Tavily
        } else {
            SearchBackend::Brave
        }
    }
}

pub struct WebSearchTool {
    api_key: String,
    backend: SearchBackend,
    max_results: usize,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, max_results: usize) -> Self {
        let api_key = api_key.into();
        Self {
            backend: SearchBackend::for_key(&api_key),
            api_key,
            max_results,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    pub fn backend(&self) -> SearchBackend {
        self.backend
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        let count = self.max_results.to_string();
        let request = match self.backend {
            SearchBackend::Brave => self
                .client
                .get(BRAVE_URL)
                .query(&[("q", query), ("count", count.as_str())])
                .header("Accept", "application/json")
                .header("X-Subscription-Token", &self.api_key),
            SearchBackend::Tavily => self.client.post(TAVILY_URL).json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            })),
        };

        debug!(backend = ?self.backend, query, "Web search");
        let response = request.send().await.map_err(|e| failed(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("search failed: {status} - {body}")));
        }

        let hits: Vec<Hit> = match self.backend {
            SearchBackend::Brave => {
                let parsed: BraveResponse = response
                    .json()
                    .await
                    .map_err(|e| failed(format!("failed to parse response: {e}")))?;
                parsed
                    .web
                    .results
                    .into_iter()
                    .map(|r| Hit { title: r.title, url: r.url, snippet: r.description })
                    .collect()
            }
            SearchBackend::Tavily => {
                let parsed: TavilyResponse = response
                    .json()
                    .await
                    .map_err(|e| failed(format!("failed to parse response: {e}")))?;
                parsed
                    .results
                    .into_iter()
                    .map(|r| Hit { title: r.title, url: r.url, snippet: truncate_snippet(r.content) })
                    .collect()
            }
        };

        Ok(format_hits(&hits, self.max_results))
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "web_search".into(),
        reason,
    }
}

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: BraveWeb,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

struct Hit {
    title: String,
    url: String,
    snippet: String,
}

fn truncate_snippet(content: String) -> String {
    if content.chars().count() <= 300 {
        return content;
    }
    let cut: String = content.chars().take(297).collect();
    format!("{cut}...")
}

fn format_hits(hits: &[Hit], max_results: usize) -> String {
    let mut out = String::from("Search Results:\n\n");
    if hits.is_empty() {
        out.push_str("No results found.");
        return out;
    }
    for (i, hit) in hits.iter().take(max_results).enumerate() {
        out.push_str(&format!("{}. {}\n   URL: {}\n   {}\n\n", i + 1, hit.title, hit.url, hit.snippet));
    }
    out
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns relevant snippets and URLs."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let query = required_str(arguments, "query")?;

        if self.api_key.is_empty() {
            return Ok(
                "Web search not configured. Set BRAVE_API_KEY or TAVILY_API_KEY environment variable."
                    .into(),
            );
        }

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
            res = self.search(query) => res,
        }
    }
}
