//! OpenAI-compatible chat-completions backend.
//!
//! Environment:
//! - `OPENAI_API_KEY` (required)
//! - `OPENAI_BASE_URL` (optional; default `https://api.openai.com/v1`)
//! - `OPENAI_MODEL` (optional; default `gpt-4o-mini`)
//! - `CONCEPTMAP_LLM_TIMEOUT_SECS` (optional; default 120, 0 disables)

#![cfg_attr(not(feature = "llm-openai"), allow(dead_code))]

use anyhow::{anyhow, Result};
use std::time::Duration;

pub(crate) const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub(crate) const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub(crate) const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub(crate) const CONCEPTMAP_LLM_TIMEOUT_SECS_ENV: &str = "CONCEPTMAP_LLM_TIMEOUT_SECS";

const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Request timeout: the override, else the env var, else the default. 0 disables.
pub(crate) fn llm_timeout(timeout_secs_override: Option<u64>) -> Result<Option<Duration>> {
    let secs = match timeout_secs_override {
        Some(v) => v,
        None => match std::env::var(CONCEPTMAP_LLM_TIMEOUT_SECS_ENV) {
            Ok(v) => {
                let v = v.trim();
                if v.is_empty() {
                    DEFAULT_LLM_TIMEOUT_SECS
                } else {
                    v.parse::<u64>().map_err(|_| {
                        anyhow!(
                            "invalid {CONCEPTMAP_LLM_TIMEOUT_SECS_ENV}={v:?} (expected integer seconds; 0 disables)"
                        )
                    })?
                }
            }
            Err(std::env::VarError::NotPresent) => DEFAULT_LLM_TIMEOUT_SECS,
            Err(e) => {
                return Err(anyhow!(
                    "failed to read {CONCEPTMAP_LLM_TIMEOUT_SECS_ENV}: {e}"
                ))
            }
        },
    };

    Ok(if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    })
}

fn normalize_http_base_url(base_url: &str, default: &str) -> String {
    let mut host = base_url.trim().to_string();
    if host.is_empty() {
        host = default.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("https://{host}");
    }
    host.trim_end_matches('/').to_string()
}

fn chat_message_content(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

#[cfg(feature = "llm-openai")]
fn openai_api_key() -> Result<String> {
    let key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(anyhow!(
            "OpenAI backend requires {OPENAI_API_KEY_ENV} (set it in your env; do not hardcode secrets in scripts)"
        ));
    }
    Ok(key)
}

#[cfg(feature = "llm-openai")]
pub(crate) use openai::OpenAiChat;

#[cfg(feature = "llm-openai")]
mod openai {
    use super::*;
    use conceptmap_ingest::{Completion, OracleError};
    use serde_json::json;

    const SYSTEM_PROMPT: &str = "You are a careful assistant. Respond in strict JSON if asked.";

    pub(crate) struct OpenAiChat {
        client: reqwest::blocking::Client,
        url: String,
        api_key: String,
        model: String,
    }

    impl OpenAiChat {
        pub(crate) fn from_env(model: Option<&str>, timeout_secs: Option<u64>) -> Result<Self> {
            let api_key = openai_api_key()?;
            let base_url = normalize_http_base_url(
                &std::env::var(OPENAI_BASE_URL_ENV).unwrap_or_default(),
                DEFAULT_OPENAI_BASE_URL,
            );
            let model = match model {
                Some(m) if !m.trim().is_empty() => m.trim().to_string(),
                _ => std::env::var(OPENAI_MODEL_ENV)
                    .ok()
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            };

            let mut builder = reqwest::blocking::Client::builder();
            if let Some(timeout) = llm_timeout(timeout_secs)? {
                builder = builder.timeout(timeout);
            }
            let client = builder
                .build()
                .map_err(|e| anyhow!("failed to build http client: {e}"))?;

            Ok(Self {
                client,
                url: format!("{base_url}/chat/completions"),
                api_key,
                model,
            })
        }

        pub(crate) fn model(&self) -> &str {
            &self.model
        }
    }

    impl Completion for OpenAiChat {
        fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            let mut body = json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": format!("Return ONLY valid JSON. No commentary. Prompt:\n{prompt}")}
                ]
            });
            // gpt-5 models only accept the default temperature
            if !self.model.starts_with("gpt-5") {
                body["temperature"] = json!(0.2);
            }

            let resp = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .map_err(|e| OracleError::Transport(format!("failed to reach {}: {e}", self.url)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().unwrap_or_default();
                return Err(OracleError::Api(format!("{status}: {text}")));
            }

            let v: serde_json::Value = resp
                .json()
                .map_err(|e| OracleError::InvalidResponse(format!("response is not JSON: {e}")))?;
            chat_message_content(&v).ok_or_else(|| {
                OracleError::InvalidResponse("missing choices[0].message.content".to_string())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeout_override_wins_and_zero_disables() {
        assert_eq!(llm_timeout(Some(0)).unwrap(), None);
        assert_eq!(llm_timeout(Some(5)).unwrap(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn base_urls_are_normalized() {
        assert_eq!(
            normalize_http_base_url("", DEFAULT_OPENAI_BASE_URL),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            normalize_http_base_url("localhost:8080/v1/", DEFAULT_OPENAI_BASE_URL),
            "https://localhost:8080/v1"
        );
        assert_eq!(
            normalize_http_base_url("http://127.0.0.1:11434/v1", DEFAULT_OPENAI_BASE_URL),
            "http://127.0.0.1:11434/v1"
        );
    }

    #[test]
    fn message_content_is_read_from_first_choice() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "{\"concepts\": []}"}}]});
        assert_eq!(chat_message_content(&v).as_deref(), Some("{\"concepts\": []}"));
        assert_eq!(chat_message_content(&json!({"choices": []})), None);
    }
}
