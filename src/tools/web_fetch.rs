//! `web_fetch` — retrieve content from an external URL.
//!
//! Corresponds to `kb-service/tools/web_fetch.py`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use super::{AgentTool, ToolContext};
use crate::llms::ToolSchema;

pub struct WebFetchTool;

#[derive(Deserialize)]
struct Args {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

const MAX_LEN: usize = 8000;

#[async_trait]
impl AgentTool for WebFetchTool {
    fn name(&self) -> &'static str {
        "web_fetch"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "web_fetch",
            "Fetch content from a URL. Returns the text content of the page. Use this to \
             retrieve external information, API responses, or web page content.",
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to fetch content from"
                    },
                    "method": {
                        "type": "string",
                        "description": "HTTP method (GET or POST, default: GET)",
                        "enum": ["GET", "POST"],
                        "default": "GET"
                    },
                    "headers": {
                        "type": "object",
                        "description": "Optional HTTP headers to send"
                    },
                    "body": {
                        "type": "string",
                        "description": "Optional request body for POST requests"
                    }
                },
                "required": ["url"]
            }),
        )
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext<'_>) -> String {
        let args: Args = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(_) => return "Error: url is required".to_string(),
        };
        if args.url.is_empty() {
            return "Error: url is required".to_string();
        }
        if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
            return "Error: URL must start with http:// or https://".to_string();
        }

        fetch(&args).await
    }
}

async fn fetch(args: &Args) -> String {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => return format!("Web fetch error: {e}"),
    };

    let mut header_map = reqwest::header::HeaderMap::new();
    for (k, v) in &args.headers {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(k.as_bytes()),
            reqwest::header::HeaderValue::from_str(v),
        ) {
            header_map.insert(name, value);
        }
    }

    let request = if args.method.eq_ignore_ascii_case("POST") {
        let mut req = client.post(&args.url).headers(header_map);
        if let Some(body) = &args.body {
            req = req.body(body.clone());
        }
        req
    } else {
        client.get(&args.url).headers(header_map)
    };

    let resp = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            return format!("Error: Request to {} timed out after 30 seconds", args.url)
        }
        Err(e) => return format!("Web fetch error: {e}"),
    };

    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let raw = match resp.text().await {
        Ok(t) => t,
        Err(e) => return format!("Web fetch error: {e}"),
    };
    let total_len = raw.chars().count();

    let mut text_content = if content_type.contains("json") {
        serde_json::from_str::<Value>(&raw)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or_else(|_| raw.clone())
    } else if content_type.contains("html") {
        strip_html_tags(&raw)
    } else {
        raw
    };

    if text_content.chars().count() > MAX_LEN {
        let truncated: String = text_content.chars().take(MAX_LEN).collect();
        text_content = format!("{truncated}\n\n... [truncated, total {total_len} chars]");
    }

    format!("HTTP {status} from {}\n\n{text_content}", args.url)
}

static SCRIPT_OR_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").unwrap());
static BLOCK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(br|p|div|h[1-6]|li|tr)[^>]*/?>").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn strip_html_tags(html: &str) -> String {
    let html = SCRIPT_OR_STYLE.replace_all(html, "");
    let html = BLOCK_TAG.replace_all(&html, "\n");
    let html = ANY_TAG.replace_all(&html, "");
    let html = html
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ");
    EXCESS_BLANK_LINES.replace_all(&html, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_block_tags() {
        let html = "<html><script>evil()</script><p>Hello</p><div>World</div></html>";
        assert_eq!(strip_html_tags(html), "Hello\nWorld");
    }

    #[test]
    fn decodes_common_entities() {
        assert_eq!(strip_html_tags("<p>Tom &amp; Jerry</p>"), "Tom & Jerry");
    }
}
