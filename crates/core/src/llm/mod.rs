pub mod anthropic;
pub mod error;
pub mod json;
pub mod summary;

use crate::domain::synthesis::SynthesisResult;

#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub title: String,
    pub body: String,
    pub comments_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
}

/// Language-model collaborator. Every call is a single attempt.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Labeled free-text summary (see [`summary::parse_summary`]).
    async fn summarize(&self, title: &str, body: &str) -> anyhow::Result<String>;

    /// Post + comments synthesis. Fails closed when a required field is missing.
    async fn synthesize(&self, input: &SynthesisInput) -> anyhow::Result<SynthesisResult>;

    async fn caption_image(&self, image_url: &str) -> anyhow::Result<String>;

    /// Daily market forecast from a block of user activity.
    async fn forecast(&self, activity: &str) -> anyhow::Result<String>;
}
