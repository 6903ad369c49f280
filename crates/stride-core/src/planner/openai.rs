//! OpenAI-compatible chat-completions client for the habit planner.
//!
//! One request per plan call: no caching, no retry. The only resilience
//! measure is a bounded request timeout; a timeout surfaces as
//! [`PlannerError::Request`] and callers treat it as a planning failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{HabitPlanner, PlannedHabit, PlannerError, parse_planner_response};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the planner client.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Model name, e.g. `gpt-4o-mini`.
    pub model: String,
    /// API base URL without a trailing slash, e.g. `https://api.openai.com`.
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Bound on the whole request.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
}

impl PlannerConfig {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            temperature: 0.7,
        }
    }
}

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that helps users break down their goals into actionable habits.";

/// Build the user prompt for a goal description.
fn build_user_prompt(goal_description: &str) -> String {
    format!(
        "Analyze the following goal and break it down into a series of smaller, \
         actionable habits. For each habit, provide a description and a suggested \
         frequency ('daily' or 'weekly'). Return the habits as a raw JSON array of \
         objects, where each object has a 'description' and 'frequency' key. \
         Return only the JSON array, with no prose before or after it.\n\n\
         Goal: \"{goal_description}\""
    )
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Planner backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiPlanner {
    config: PlannerConfig,
    http: Client,
}

impl OpenAiPlanner {
    /// Create a client from configuration.
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlannerError::Request(e.to_string()))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl HabitPlanner for OpenAiPlanner {
    async fn plan(&self, goal_description: &str) -> Result<Vec<PlannedHabit>, PlannerError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let user_prompt = build_user_prompt(goal_description);

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, "requesting habit plan");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlannerError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PlannerError::Request(format!(
                "planner endpoint returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PlannerError::Malformed("response carried no content".to_owned()))?;

        let habits = parse_planner_response(&content)?;
        debug!(count = habits.len(), "habit plan parsed");
        Ok(habits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_goal() {
        let prompt = build_user_prompt("read more books");
        assert!(prompt.contains("Goal: \"read more books\""));
        assert!(prompt.contains("'daily' or 'weekly'"));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn config_defaults() {
        let cfg = PlannerConfig::new("gpt-4o-mini", "https://api.openai.com", "sk-test");
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn chat_response_deserializes() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "[]"}}
            ]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("[]"));
    }
}
