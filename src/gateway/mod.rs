mod client;
mod types;

pub use client::HttpQuestionGateway;
pub use types::{GeneratedBatch, GenerationTask, RawQuestion, UsageRecord};

use async_trait::async_trait;

use crate::error::GatewayResult;

/// External question-module service that generates the raw questions for one
/// Teil. Implementations must be safe to invoke concurrently; calls are not
/// idempotent.
#[async_trait]
pub trait QuestionGateway: Send + Sync {
    async fn generate(&self, task: &GenerationTask) -> GatewayResult<GeneratedBatch>;
}
