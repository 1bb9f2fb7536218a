use anyhow::{bail, Context, Result};
use pulse_core::{Disabled, Enricher};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSection;

/// OpenAI-compatible chat completions client used for plan enrichment.
#[derive(Debug, Clone)]
pub struct OpenAiEnricher {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    api_key: String,
}

/// Build the enricher for this config: OpenAI when a key is available, else disabled.
pub fn enricher_from_config(cfg: &LlmSection) -> Box<dyn Enricher + Send + Sync> {
    match cfg.api_key() {
        Some(api_key) => Box::new(OpenAiEnricher {
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
            api_key,
        }),
        None => Box::new(Disabled),
    }
}

impl Enricher for OpenAiEnricher {
    fn is_enabled(&self) -> bool {
        true
    }

    fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        // The CLI runs under #[tokio::main]; a nested runtime would panic.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.complete(system, prompt)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.complete(system, prompt))
        }
    }
}

impl OpenAiEnricher {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: vec![
                Msg { role: "system", content: system },
                Msg { role: "user", content: prompt },
            ],
            temperature: self.temperature,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "chat completion request");
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("build http client")?;
        let resp = client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("openai error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse openai response")?;
        let content = out
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}
