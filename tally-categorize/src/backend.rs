//! Text-generation backend seam.
//!
//! The categorizer only ever needs "prompt in, text out" plus model discovery.
//! Transport details and response-shape handling belong to implementations.

use thiserror::Error;

/// Model used when discovery finds nothing installed
pub const FALLBACK_MODEL: &str = "llama3.2";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("no model configured")]
    NoModel,
}

/// Synchronous text-generation client.
pub trait TextGenerationClient {
    /// Send one prompt to `model` and return the generated text.
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;

    /// Identifiers of the models installed on the backend.
    fn list_models(&self) -> Result<Vec<String>, GenerationError>;
}

impl<T: TextGenerationClient + ?Sized> TextGenerationClient for &T {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(model, prompt)
    }

    fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        (**self).list_models()
    }
}

impl<T: TextGenerationClient + ?Sized> TextGenerationClient for Box<T> {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(model, prompt)
    }

    fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        (**self).list_models()
    }
}

/// Client for running without a backend: every call fails as unavailable,
/// so categorization runs on rules, defaults and the deterministic pattern
/// fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl TextGenerationClient for OfflineClient {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable("offline mode".to_string()))
    }

    fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        Err(GenerationError::Unavailable("offline mode".to_string()))
    }
}

/// Model to preselect: the first llama-family model, else the first listed.
pub fn recommended_model(models: &[String]) -> Option<&str> {
    models
        .iter()
        .find(|m| m.to_lowercase().contains("llama"))
        .or_else(|| models.first())
        .map(String::as_str)
}

/// A configured model counts as installed if an installed name contains it
/// (tags like `llama3.2:latest` satisfy `llama3.2`).
pub fn is_model_available(model: &str, installed: &[String]) -> bool {
    !model.is_empty() && installed.iter().any(|name| name.contains(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recommended_prefers_llama() {
        let models = names(&["mistral:7b", "Llama3.1:8b", "llama3.2:latest"]);
        assert_eq!(recommended_model(&models), Some("Llama3.1:8b"));
    }

    #[test]
    fn test_recommended_falls_back_to_first() {
        let models = names(&["mistral:7b", "qwen2.5"]);
        assert_eq!(recommended_model(&models), Some("mistral:7b"));
        assert_eq!(recommended_model(&[]), None);
    }

    #[test]
    fn test_model_availability() {
        let installed = names(&["llama3.2:latest", "mistral:7b"]);
        assert!(is_model_available("llama3.2", &installed));
        assert!(is_model_available("mistral:7b", &installed));
        assert!(!is_model_available("qwen2.5", &installed));
        assert!(!is_model_available("", &installed));
    }

    #[test]
    fn test_offline_client_always_unavailable() {
        let c = OfflineClient;
        assert!(matches!(c.generate("m", "p"), Err(GenerationError::Unavailable(_))));
        assert!(matches!(c.list_models(), Err(GenerationError::Unavailable(_))));
    }
}
