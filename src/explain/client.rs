use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{parse_explanation, user_message, Explainer};
use crate::error::{Error, Result};
use crate::types::anomaly::{Anomaly, Explanation};
use crate::types::config::LlmConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint (Groq by default).
pub struct ChatExplainer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    system_prompt: String,
}

impl ChatExplainer {
    pub fn new(config: &LlmConfig, api_key: Option<String>, system_prompt: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No API key configured; explanations will use the fallback payload"
            );
        }
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            system_prompt,
        })
    }

    /// Build from configuration, reading the key from the configured env var.
    pub fn from_config(config: &LlmConfig, system_prompt: String) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(config, api_key, system_prompt)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, anomaly: &Anomaly) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                Message::system(&self.system_prompt),
                Message::user(&user_message(anomaly)),
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }

    async fn complete(&self, anomaly: &Anomaly) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("API key not set".to_string()))?;

        debug!(model = %self.model, context = %anomaly.context, "Requesting explanation");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(anomaly))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Llm(format!("API returned {}: {}", status, snippet)));
        }

        let data: ChatResponse = response.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("response contained no message content".to_string()))
    }
}

impl Explainer for ChatExplainer {
    async fn explain(&self, anomaly: &Anomaly) -> Result<Explanation> {
        let content = self.complete(anomaly).await?;
        parse_explanation(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::anomaly::{AnomalyDate, AnomalyType, MetricValue};

    fn sample() -> Anomaly {
        Anomaly {
            date: AnomalyDate::Aggregate,
            context: "product: X, discount: 15%".to_string(),
            anomaly_type: AnomalyType::AbnormalDiscountUsage,
            details: "transaction volume 400.00% above normal for this discount tier".to_string(),
            metric_value: MetricValue::Integer(50),
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let mut config = LlmConfig::default();
        config.base_url = "http://localhost:8080/v1/".to_string();
        let explainer = ChatExplainer::new(&config, None, "sys".to_string()).unwrap();
        assert_eq!(explainer.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn request_body_shape() {
        let explainer =
            ChatExplainer::new(&LlmConfig::default(), Some("k".to_string()), "sys".to_string())
                .unwrap();
        let body = serde_json::to_value(explainer.request_body(&sample())).unwrap();
        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("metric value: 50"));
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let explainer = ChatExplainer::new(&LlmConfig::default(), None, "sys".to_string()).unwrap();
        let result = explainer.explain(&sample()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn choice_content_deserializes() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"{\"risk_level\":\"low\"}"}}]}"#;
        let data: ChatResponse = serde_json::from_str(json).unwrap();
        let content = data.choices[0].message.content.clone().unwrap();
        let exp = parse_explanation(&content).unwrap();
        assert_eq!(exp.risk_level, crate::types::anomaly::RiskLevel::Low);
    }
}
