use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use super::types::{GeneratedBatch, GenerationTask};
use super::QuestionGateway;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

/// HTTP client for the question-module service.
///
/// One attempt per call. Retrying a failed Teil means regenerating it, which
/// is the orchestrator's caller's decision, so no retry loop lives here.
#[derive(Clone)]
pub struct HttpQuestionGateway {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl HttpQuestionGateway {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QuestionGateway for HttpQuestionGateway {
    async fn generate(&self, task: &GenerationTask) -> GatewayResult<GeneratedBatch> {
        let url = format!("{}/v1/modules/{}/generate", self.base_url, task.module_id);

        debug!(
            module = %task.module_id,
            session_module = %task.session_module,
            count = task.question_count,
            "Requesting question generation"
        );

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(task)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    GatewayError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(
                module = %task.module_id,
                status = status.as_u16(),
                "Question generation failed"
            );
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let batch: GeneratedBatch =
            response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse {
                    message: format!("Failed to parse generation response: {}", e),
                })?;

        if batch.questions.is_empty() {
            return Err(GatewayError::InvalidResponse {
                message: "Module returned an empty question batch".to_string(),
            });
        }

        info!(
            module = %task.module_id,
            questions = batch.questions.len(),
            latency_ms = start.elapsed().as_millis(),
            "Question generation succeeded"
        );

        Ok(batch)
    }
}
