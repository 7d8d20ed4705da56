use async_trait::async_trait;
use serde_json::Value;

use crate::llm::media::DataUrl;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("generation service is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request to {model} failed: {message}")]
    Transport { model: String, message: String },
    #[error("request to {model} timed out after {seconds}s")]
    Timeout { model: String, seconds: u64 },
    #[error("{model} returned status {status}: {detail}")]
    Status {
        model: String,
        status: u16,
        detail: String,
    },
    #[error("could not decode {model} response: {message}")]
    Decode { model: String, message: String },
}

/// Stage 1 request: prompt text, optional image part, response schema and
/// sampling temperature.
#[derive(Debug, Clone)]
pub struct ProfileRequest {
    pub prompt: String,
    pub reference_image: Option<DataUrl>,
    pub schema: Value,
    pub temperature: f32,
}

/// Outbound port to the generation service. The forge only ever talks to
/// this trait; the bot and CLI inject the concrete client.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the raw text of the structured response (possibly empty).
    async fn generate_profile(&self, request: ProfileRequest) -> Result<String, ClientError>;

    /// Returns the first inline image of the response, if any.
    async fn generate_image(&self, prompt: &str) -> Result<Option<DataUrl>, ClientError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Scripted client that records every request it receives.
    pub(crate) struct FakeClient {
        profile_reply: Result<String, ClientError>,
        image_reply: Result<Option<DataUrl>, ClientError>,
        pub profile_requests: Arc<Mutex<Vec<ProfileRequest>>>,
        pub image_prompts: Arc<Mutex<Vec<String>>>,
    }

    impl FakeClient {
        pub(crate) fn new(profile_text: &str) -> Self {
            Self {
                profile_reply: Ok(profile_text.to_string()),
                image_reply: Ok(None),
                profile_requests: Arc::new(Mutex::new(Vec::new())),
                image_prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn failing_profile(error: ClientError) -> Self {
            Self {
                profile_reply: Err(error),
                ..Self::new("")
            }
        }

        pub(crate) fn with_image(mut self, image: DataUrl) -> Self {
            self.image_reply = Ok(Some(image));
            self
        }

        pub(crate) fn with_image_error(mut self, error: ClientError) -> Self {
            self.image_reply = Err(error);
            self
        }
    }

    #[async_trait]
    impl GenerationClient for FakeClient {
        async fn generate_profile(&self, request: ProfileRequest) -> Result<String, ClientError> {
            self.profile_requests.lock().push(request);
            self.profile_reply.clone()
        }

        async fn generate_image(&self, prompt: &str) -> Result<Option<DataUrl>, ClientError> {
            self.image_prompts.lock().push(prompt.to_string());
            self.image_reply.clone()
        }
    }
}
