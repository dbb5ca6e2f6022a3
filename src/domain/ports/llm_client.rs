/// Completion backend used by the LLM-assisted reviewer.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a system + user prompt pair and return the raw text reply.
    async fn complete(&self, system: &str, user: &str) -> Result<String, String>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
