//! Post copy for a single generated day, requested from an
//! OpenRouter-compatible chat completions endpoint.
//!
//! Nothing here feeds back into allocation; a failed request leaves the
//! calendar exactly as it was.

use std::env;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::calendar::GeneratedDay;
use crate::config::ContentSettings;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").expect("code fence pattern is valid")
});

/// Caption, visual direction and hashtags for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    pub caption: String,
    #[serde(rename = "visualDescription")]
    pub visual_description: String,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("environment variable {var} does not hold an API key")]
    MissingApiKey { var: String },
    #[error("content request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("content service returned no choices")]
    EmptyResponse,
    #[error("content service returned malformed content: {0}")]
    Malformed(String),
    #[error("content payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn build_prompt(day: &GeneratedDay) -> String {
    format!(
        "Act as a world-class social media strategist and copywriter.\n\
         Create a detailed Instagram post for a brand based on the following plan:\n\
         \n\
         Theme: {theme}\n\
         Core Pillar (Messaging): {pillar}\n\
         Engagement Ending: {engagement}\n\
         Format: {format}\n\
         \n\
         Reply with a single JSON object with these keys:\n\
         \"caption\": a catchy, engaging caption that fits the theme and pillar.\n\
         \"visualDescription\": what the {format} should look like.\n\
         \"hashtags\": an array of 10-15 relevant hashtags.\n\
         \n\
         Make the tone professional yet approachable and high-energy.",
        theme = day.theme,
        pillar = day.pillar,
        engagement = day.engagement,
        format = day.format,
    )
}

/// Parses a model reply into [`PostContent`], tolerating a Markdown code fence.
pub fn parse_content(raw: &str) -> Result<PostContent, ContentError> {
    let body = CODE_FENCE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw.trim(), |inner| inner.as_str());

    let mut content: PostContent = serde_json::from_str(body)?;
    content.caption = content.caption.trim().to_string();
    content.visual_description = content.visual_description.trim().to_string();
    if content.caption.is_empty() {
        return Err(ContentError::Malformed("caption is empty".to_string()));
    }
    if content.visual_description.is_empty() {
        return Err(ContentError::Malformed(
            "visual description is empty".to_string(),
        ));
    }
    content.hashtags = content
        .hashtags
        .iter()
        .filter_map(|tag| normalize_hashtag(tag))
        .collect();
    if content.hashtags.is_empty() {
        return Err(ContentError::Malformed("no usable hashtags".to_string()));
    }
    Ok(content)
}

fn normalize_hashtag(tag: &str) -> Option<String> {
    let bare = tag.trim().trim_start_matches('#').trim();
    if bare.is_empty() {
        None
    } else {
        Some(format!("#{bare}"))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// HTTP client for the content service.
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    api_key: String,
    settings: ContentSettings,
}

impl ContentClient {
    /// Builds a client whose key comes from `settings.api_key_env`.
    pub fn new(settings: &ContentSettings) -> Result<Self, ContentError> {
        let api_key = env::var(&settings.api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ContentError::MissingApiKey {
                var: settings.api_key_env.clone(),
            })?;
        Ok(Self::with_api_key(settings, api_key))
    }

    pub fn with_api_key(settings: &ContentSettings, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            settings: settings.clone(),
        }
    }

    pub async fn generate(&self, day: &GeneratedDay) -> Result<PostContent, ContentError> {
        let prompt = build_prompt(day);
        let request = CompletionRequest {
            model: &self.settings.model,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
            temperature: self.settings.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(day = %day.day, model = %self.settings.model, "Requesting post content");
        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let raw = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ContentError::EmptyResponse)?;

        let content = parse_content(&raw)?;
        info!(day = %day.day, hashtags = content.hashtags.len(), "Received post content");
        Ok(content)
    }
}
