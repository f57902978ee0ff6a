//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use crate::config::LlmConfig;
use crate::error::{AskSqlError, Result};
use crate::llm::{LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig};

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Creates an LLM client for the given provider.
///
/// OpenAI needs `api_key`; a missing key is a configuration error, since
/// nothing can be generated without it. `OPENAI_MODEL` overrides the
/// configured model.
pub fn create_client(
    provider: LlmProvider,
    api_key: Option<String>,
    settings: &LlmConfig,
) -> Result<Box<dyn LlmClient>> {
    match provider {
        LlmProvider::OpenAi => {
            let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                AskSqlError::config(format!("{OPENAI_API_KEY_VAR} is not set"))
            })?;
            let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| settings.model.clone());
            let config = OpenAiConfig::new(key, model).with_timeout(settings.timeout_secs);
            Ok(Box::new(OpenAiClient::new(config)?))
        }
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}
