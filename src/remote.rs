//! External collaborators: page metadata, translation, screenshots.
//!
//! None of these touch the stores. Metadata is scraped directly; translation
//! uses the spark chat API when a key is configured, otherwise both
//! translation and screenshots are forwarded to the configured remote
//! service.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::spider::SELF_SYMBOL;

const SPARK_CHAT_URL: &str = "https://spark-api-open.xf-yun.com/v1/chat/completions";

/// Metadata scraped from a page. `message` carries the failure, if any.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WebInfo {
    pub title: String,
    pub description: String,
    /// Icon URL.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fetches title, description, and icon for `url`.
///
/// Returns empty metadata with a `message` on failure.
pub async fn fetch_web_info(client: &reqwest::Client, url: &str) -> WebInfo {
    match fetch_web_info_inner(client, url.trim_start_matches(SELF_SYMBOL)).await {
        Ok(info) => info,
        Err(e) => WebInfo {
            message: Some(e.to_string()),
            ..Default::default()
        },
    }
}

async fn fetch_web_info_inner(client: &reqwest::Client, url: &str) -> Result<WebInfo> {
    let base = Url::parse(url).with_context(|| format!("invalid url: {}", url))?;
    let response = client.get(base.clone()).send().await?;
    if !response.status().is_success() {
        bail!("HTTP {}", response.status().as_u16());
    }
    let html = response.text().await?;
    Ok(parse_web_info(&html, &base))
}

fn parse_web_info(html: &str, base: &Url) -> WebInfo {
    let document = Html::parse_document(html);
    let title = meta_content(&document, "og:title")
        .or_else(|| first_text(&document, "title"))
        .unwrap_or_default();
    let description = meta_content(&document, "description")
        .or_else(|| meta_content(&document, "og:description"))
        .unwrap_or_default();
    let icon = icon_href(&document)
        .and_then(|href| base.join(&href).ok())
        .or_else(|| base.join("/favicon.ico").ok())
        .map(|u| u.to_string())
        .unwrap_or_default();
    WebInfo {
        title,
        description,
        url: icon,
        message: None,
    }
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector =
        Selector::parse(&format!("meta[name=\"{0}\"], meta[property=\"{0}\"]", name)).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn first_text(document: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn icon_href(document: &Html) -> Option<String> {
    let selector = Selector::parse("link[rel~=\"icon\"], link[rel=\"shortcut icon\"]").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .next()
}

fn remote_endpoint(config: &Config, endpoint: &str) -> Result<String> {
    let base = config
        .remote_api
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| anyhow!("no remote service configured for {}", endpoint))?;
    Ok(format!("{}{}", base.trim_end_matches('/'), endpoint))
}

async fn forward(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

/// Translates `body.content` into `body.language`.
pub async fn translate(client: &reqwest::Client, config: &Config, body: &Value) -> Result<Value> {
    let token = config.xf_api_password.as_deref().unwrap_or_default();
    if token.is_empty() {
        let url = remote_endpoint(config, "/api/translate")?;
        return forward(client, &url, body).await;
    }

    let content = body.get("content").and_then(Value::as_str).unwrap_or_default();
    let target = match body.get("language").and_then(Value::as_str) {
        Some("zh-CN") => "中文",
        _ => "英文",
    };
    let prompt = format!(
        "{} 翻译{}，直接返回翻译的内容，如果不能翻译返回原内容",
        content, target
    );
    let response: Value = client
        .post(SPARK_CHAT_URL)
        .bearer_auth(token)
        .json(&json!({
            "model": "lite",
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let translated = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow!("unexpected translation response"))?;
    Ok(json!({ "content": translated }))
}

/// Forwards a screenshot request to the remote service.
pub async fn screenshot(client: &reqwest::Client, config: &Config, body: &Value) -> Result<Value> {
    let url = remote_endpoint(config, "/api/screenshot")?;
    forward(client, &url, body).await
}
