use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::client::{ClientError, GenerationClient, ProfileRequest};
use crate::llm::media::DataUrl;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.candidates
            .iter()
            .flatten()
            .filter_map(|candidate| candidate.content.as_ref())
            .filter_map(|content| content.parts.as_ref())
            .flatten()
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub text_model: String,
    pub image_model: String,
    pub safety_profile: String,
    pub timeout: Duration,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        GeminiSettings {
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone(),
            text_model: config.gemini_text_model.clone(),
            image_model: config.gemini_image_model.clone(),
            safety_profile: config.gemini_safety_settings.clone(),
            timeout: config.gemini_request_timeout(),
        }
    }
}

pub struct GeminiClient {
    http: Client,
    settings: GeminiSettings,
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized: Vec<Value> = contents
            .iter()
            .map(|content| {
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_gemini_parts(parts))
                    .unwrap_or_default();
                json!({ "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        let mut config = config.clone();
        // The schema is static and large; only note that one was sent.
        if let Some(object) = config.as_object_mut() {
            if object.remove("responseSchema").is_some() {
                object.insert("responseSchema".to_string(), json!("<character schema>"));
            }
        }
        summary.insert("generationConfig".to_string(), config);
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    for part in response.parts() {
        match part {
            GeminiPart::Text { text } => {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if inline_data.mime_type.starts_with("image/") {
                    image_parts += 1;
                }
            }
            GeminiPart::Other(_) => {}
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

/// Concatenates the text parts. Structured output may arrive split across
/// several parts, so no separator is inserted.
fn extract_text_from_response(response: &GeminiResponse) -> String {
    response
        .parts()
        .filter_map(|part| match part {
            GeminiPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<String>()
}

fn extract_image_from_response(response: &GeminiResponse) -> Option<DataUrl> {
    response.parts().find_map(|part| match part {
        GeminiPart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
            let image = DataUrl::from_base64(&inline_data.mime_type, inline_data.data.clone());
            match image.decode() {
                Ok(bytes) if !bytes.is_empty() => Some(image),
                _ => {
                    warn!("Skipping undecodable inline image ({})", inline_data.mime_type);
                    None
                }
            }
        }
        _ => None,
    })
}

fn build_profile_payload(request: &ProfileRequest, safety_profile: &str) -> Value {
    let mut parts = vec![json!({ "text": request.prompt })];
    if let Some(image) = &request.reference_image {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type(),
                "data": image.base64_data()
            }
        }));
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
            "temperature": request.temperature,
        },
        "safetySettings": build_safety_settings(safety_profile),
    })
}

fn build_image_payload(prompt: &str, safety_profile: &str) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"]
        },
        "safetySettings": build_safety_settings(safety_profile),
    })
}

impl GeminiClient {
    pub fn new(http: Client, settings: GeminiSettings) -> Self {
        GeminiClient { http, settings }
    }

    pub fn from_config(config: &Config) -> Self {
        GeminiClient::new(get_http_client().clone(), GeminiSettings::from_config(config))
    }

    fn redact(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn transport_error(&self, model: &str, err: &reqwest::Error) -> ClientError {
        if err.is_timeout() {
            return ClientError::Timeout {
                model: model.to_string(),
                seconds: self.settings.timeout.as_secs(),
            };
        }
        ClientError::Transport {
            model: model.to_string(),
            message: self.redact(&err.to_string()),
        }
    }

    async fn call_gemini_api(
        &self,
        model: &str,
        payload: Value,
    ) -> Result<GeminiResponse, ClientError> {
        if self.settings.api_key.trim().is_empty() {
            return Err(ClientError::NotConfigured("GEMINI_API_KEY"));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url, model
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = match self
            .http
            .post(&url)
            .timeout(self.settings.timeout)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, model={})",
                    self.redact(&err.to_string()),
                    err.is_timeout(),
                    err.is_connect(),
                    model
                );
                return Err(self.transport_error(model, &err));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&self.redact(&body));
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(ClientError::Status {
                model: model.to_string(),
                status: status.as_u16(),
                detail: message.unwrap_or(body_summary),
            });
        }

        // The request timeout also covers reading the body.
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    "Gemini response body failed: {} (timeout={}, model={})",
                    self.redact(&err.to_string()),
                    err.is_timeout(),
                    model
                );
                return Err(self.transport_error(model, &err));
            }
        };
        let value = serde_json::from_slice::<GeminiResponse>(&body).map_err(|err| {
            ClientError::Decode {
                model: model.to_string(),
                message: self.redact(&err.to_string()),
            }
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate_profile(&self, request: ProfileRequest) -> Result<String, ClientError> {
        let model = self.settings.text_model.as_str();
        let payload = build_profile_payload(&request, &self.settings.safety_profile);
        let metadata = json!({ "reference_image": request.reference_image.is_some() });

        log_llm_timing("gemini", model, "generate_profile", Some(metadata), move || async move {
            let response = self.call_gemini_api(model, payload).await?;
            Ok(extract_text_from_response(&response))
        })
        .await
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<DataUrl>, ClientError> {
        let model = self.settings.image_model.as_str();
        let payload = build_image_payload(prompt, &self.settings.safety_profile);

        log_llm_timing("gemini", model, "generate_image", None, move || async move {
            let response = self.call_gemini_api(model, payload).await?;
            Ok(extract_image_from_response(&response))
        })
        .await
    }
}
