pub mod chat;
pub mod retry;

use std::sync::Arc;

use goalflow_core::config::ModelConfig;
use goalflow_core::traits::Generator;

pub use chat::ChatCompletionsClient;
pub use retry::RetryingGenerator;

/// Create a generator from config, or `None` when no API key is configured.
///
/// Groq, OpenAI, Ollama and other OpenAI-compatible endpoints share one client.
pub fn create_generator(config: &ModelConfig) -> Option<Arc<dyn Generator>> {
    if !config.is_configured() {
        return None;
    }
    let client = ChatCompletionsClient::new(config.clone());
    match &config.retry {
        Some(retry) => Some(Arc::new(RetryingGenerator::new(
            Box::new(client),
            retry.clone(),
        ))),
        None => Some(Arc::new(client)),
    }
}
