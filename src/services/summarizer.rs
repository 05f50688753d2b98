//! Description generation.
//!
//! Fetches the bookmarked page, reduces it to plain text and asks a local
//! Ollama model for a one-paragraph summary.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::config::OllamaSettings;
use crate::types::errors::SummarizeError;

/// System prompt sent with every request.
pub const SUMMARIZE_PROMPT: &str = "Du bist Bibliothekar und erstellst eine Zusammenfassung \
des Inhalts einer Website in einem Absatz.\n\n\
Überprüfe die Beschreibung unter DESCRIPTION und ergänze.";

/// Page text beyond this many characters is dropped before prompting.
const MAX_PAGE_CHARS: usize = 12_000;
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const MODEL_TIMEOUT: Duration = Duration::from_secs(600);

pub trait SummarizerTrait {
    /// Generates a description for the page at `url`. `existing` is the
    /// description already stored and is handed to the model for completion.
    fn summarize(&mut self, url: &str, existing: &str) -> Result<String, SummarizeError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    options: ChatOptions,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

/// Removes markup, keeping text content. `<script>` and `<style>` bodies are dropped.
pub fn strip_tags(html: &str) -> String {
    let mut cleaned = html.to_string();
    for tag in ["script", "style"] {
        while let Some(block) = find_block(&cleaned, tag) {
            cleaned.replace_range(block, " ");
        }
    }

    let mut result = String::with_capacity(cleaned.len());
    let mut in_tag = false;
    for ch in cleaned.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte range of the first `<tag ...>...</tag>` block, tags included.
fn find_block(html: &str, tag: &str) -> Option<std::ops::Range<usize>> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find(&format!("<{}", tag))?;
    let close = format!("</{}>", tag);
    let end = lower[start..]
        .find(&close)
        .map(|i| start + i + close.len())
        .unwrap_or(html.len());
    Some(start..end)
}

/// Extracts content between a given tag pair.
pub fn extract_between_tags(html: &str, tag: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let start_idx = lower.find(&open)?;
    let tag_end = lower[start_idx..].find('>')?;
    let content_start = start_idx + tag_end + 1;
    let end_idx = lower[content_start..].find(&close)?;
    Some(html[content_start..content_start + end_idx].to_string())
}

/// Builds the user message from the fetched page.
pub fn build_prompt(url: &str, html: &str, existing: &str) -> String {
    let title = extract_between_tags(html, "title")
        .map(|t| strip_tags(&t))
        .unwrap_or_default();
    let body = extract_between_tags(html, "body").unwrap_or_else(|| html.to_string());
    let text: String = strip_tags(&body).chars().take(MAX_PAGE_CHARS).collect();
    format!(
        "URL: {}\nTITEL: {}\nINHALT: {}\nDESCRIPTION: {}\n",
        url, title, text, existing
    )
}

/// Summarizer backed by Ollama's `/api/chat`.
pub struct OllamaSummarizer {
    http: Client,
    settings: OllamaSettings,
}

impl OllamaSummarizer {
    pub fn new(settings: OllamaSettings) -> Result<Self, SummarizeError> {
        let http = Client::builder()
            .timeout(MODEL_TIMEOUT)
            .build()
            .map_err(|e| SummarizeError::ModelError(e.to_string()))?;
        Ok(Self { http, settings })
    }

    fn fetch_page(&self, url: &str) -> Result<String, SummarizeError> {
        let response = self
            .http
            .get(url)
            .timeout(PAGE_TIMEOUT)
            .send()
            .map_err(|e| {
                tracing::debug!(url, error = %e, "page fetch failed");
                SummarizeError::Unreachable(None)
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SummarizeError::Unreachable(Some(status.as_u16())));
        }
        response.text().map_err(|_| SummarizeError::Unreachable(None))
    }

    fn chat(&self, prompt: &str) -> Result<String, SummarizeError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage { role: "system", content: SUMMARIZE_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            options: ChatOptions { temperature: self.settings.temperature },
            stream: false,
        };
        let endpoint = format!("{}/api/chat", self.settings.url.trim_end_matches('/'));
        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .map_err(|e| SummarizeError::ModelError(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SummarizeError::ModelError(e.to_string()))?;
        if !status.is_success() {
            return Err(SummarizeError::ModelError(format!("Ollama {}: {}", status.as_u16(), body)));
        }
        let reply: ChatReply = serde_json::from_str(&body)
            .map_err(|e| SummarizeError::ModelError(format!("Unexpected reply: {}", e)))?;
        let content = reply.message.content.trim().to_string();
        if content.is_empty() {
            return Err(SummarizeError::ModelError("empty reply".to_string()));
        }
        Ok(content)
    }
}

impl SummarizerTrait for OllamaSummarizer {
    fn summarize(&mut self, url: &str, existing: &str) -> Result<String, SummarizeError> {
        let html = self.fetch_page(url)?;
        let prompt = build_prompt(url, &html, existing);
        self.chat(&prompt)
    }
}
