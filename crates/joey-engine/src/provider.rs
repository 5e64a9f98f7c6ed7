use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use joey_contracts::config::JoeyConfig;
use joey_contracts::presets::PLACEHOLDER_PNG_BASE64;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::error::{truncate_text, StudioError, StudioResult};
use crate::media::{data_uri, ReferenceImage};
use crate::prompt::{build_parts, reference_is_attachable, request_aspect_ratio};
use crate::settings::ProviderSettings;

/// Turns a configuration plus optional reference into one image handle
/// (`data:image/png;base64,...`).
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(
        &self,
        config: &JoeyConfig,
        reference: Option<&ReferenceImage>,
    ) -> StudioResult<String>;
}

#[derive(Default)]
pub struct ImageProviderRegistry {
    providers: BTreeMap<String, Box<dyn ImageProvider>>,
}

impl ImageProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ImageProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    /// Removes and returns a provider so a controller can own it.
    pub fn take(&mut self, name: &str) -> Option<Box<dyn ImageProvider>> {
        self.providers.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(settings: ProviderSettings) -> Result<ImageProviderRegistry> {
    let mut providers = ImageProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(settings)?);
    Ok(providers)
}

/// Offline provider: hands the reference image back, or the placeholder PNG
/// when nothing usable was uploaded.
pub struct DryrunProvider;

impl ImageProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(
        &self,
        config: &JoeyConfig,
        reference: Option<&ReferenceImage>,
    ) -> StudioResult<String> {
        log::info!(
            "dryrun generation: action={} ratio={}",
            config.action,
            request_aspect_ratio(config)
        );
        let payload = reference
            .filter(|image| !image.data.is_empty())
            .map(|image| image.data.as_str())
            .unwrap_or(PLACEHOLDER_PNG_BASE64);
        Ok(data_uri("image/png", payload))
    }
}

pub struct GeminiProvider {
    settings: ProviderSettings,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        // Image generation regularly outlives reqwest's default 30s deadline.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub(crate) fn build_payload(
        &self,
        config: &JoeyConfig,
        reference: Option<&ReferenceImage>,
    ) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": build_parts(config, reference),
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": request_aspect_ratio(config),
                },
            },
        })
    }

    fn post(&self, api_key: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.settings.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response)
    }

    /// First non-empty inline image payload, scanning candidates and their
    /// parts in order.
    pub(crate) fn extract_first_image(response_payload: &Value) -> Option<String> {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)?;
        candidates
            .iter()
            .filter_map(|candidate| {
                candidate
                    .get("content")
                    .and_then(|content| content.get("parts"))
                    .and_then(Value::as_array)
            })
            .flatten()
            .filter_map(|part| part.get("inlineData").or_else(|| part.get("inline_data")))
            .filter_map(|inline| inline.get("data").and_then(Value::as_str))
            .find(|data| !data.is_empty())
            .map(str::to_string)
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(
        &self,
        config: &JoeyConfig,
        reference: Option<&ReferenceImage>,
    ) -> StudioResult<String> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            let err = StudioError::ProviderCallFailed(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            );
            log::error!("Error generating image: {err}");
            return Err(err);
        };

        let payload = self.build_payload(config, reference);
        log::info!(
            "Sending Gemini image request: model={} ratio={} reference_attached={}",
            self.settings.model,
            request_aspect_ratio(config),
            reference_is_attachable(reference)
        );

        let response_payload = self.post(api_key, &payload).map_err(|err| {
            log::error!("Error generating image: {err:#}");
            StudioError::provider(&err)
        })?;

        match Self::extract_first_image(&response_payload) {
            Some(image) => Ok(data_uri("image/png", &image)),
            None => {
                log::error!(
                    "Gemini returned no image parts (candidates={})",
                    response_payload
                        .get("candidates")
                        .and_then(Value::as_array)
                        .map(|rows| rows.len())
                        .unwrap_or(0)
                );
                Err(StudioError::NoImageReturned)
            }
        }
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    use joey_contracts::config::JoeyConfig;
    use joey_contracts::presets::PLACEHOLDER_PNG_BASE64;
    use serde_json::{json, Value};

    use super::{default_provider_registry, DryrunProvider, GeminiProvider, ImageProvider};
    use crate::error::StudioError;
    use crate::media::ReferenceImage;
    use crate::settings::ProviderSettings;

    fn offline_settings() -> ProviderSettings {
        ProviderSettings {
            api_base: "http://127.0.0.1:9".to_string(),
            model: "gemini-2.5-flash-image".to_string(),
            api_key: None,
        }
    }

    /// Serves one canned HTTP response on loopback and hands back the raw
    /// request it received.
    fn serve_once(status: &str, body: &str) -> anyhow::Result<(String, JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let api_base = format!("http://{}", listener.local_addr()?);
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return String::new();
            };
            let request = read_request(&mut stream);
            let _ = stream.write_all(response.as_bytes());
            request
        });
        Ok((api_base, handle))
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(read) => read,
            };
            raw.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&raw);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let body_len = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + body_len {
                break;
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn keyed_provider(api_base: String) -> anyhow::Result<GeminiProvider> {
        GeminiProvider::new(ProviderSettings {
            api_base,
            model: "gemini-2.5-flash-image".to_string(),
            api_key: Some("test-key".to_string()),
        })
    }

    fn reference() -> ReferenceImage {
        ReferenceImage::from_base64("R".repeat(160), "image/png")
    }

    #[test]
    fn gemini_returns_first_inline_image_and_sends_key_header() -> anyhow::Result<()> {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"ok"},{"inlineData":{"mimeType":"image/png","data":"AAA"}}]}}]}"#;
        let (api_base, server) = serve_once("200 OK", body)?;
        let provider = keyed_provider(api_base)?;

        let result = provider.generate(&JoeyConfig::default(), Some(&reference()));
        assert_eq!(result, Ok("data:image/png;base64,AAA".to_string()));

        let request = server.join().unwrap_or_default();
        let request_line = request.lines().next().unwrap_or_default();
        assert_eq!(
            request_line,
            "POST /models/gemini-2.5-flash-image:generateContent HTTP/1.1"
        );
        assert!(
            request.to_ascii_lowercase().contains("x-goog-api-key: test-key"),
            "{request}"
        );
        assert!(request.contains(r#""aspectRatio":"1:1""#), "{request}");
        Ok(())
    }

    #[test]
    fn gemini_http_error_becomes_provider_failure_with_status_and_body() -> anyhow::Result<()> {
        let body = r#"{"error":{"message":"quota"}}"#;
        let (api_base, server) = serve_once("429 Too Many Requests", body)?;
        let provider = keyed_provider(api_base)?;

        let result = provider.generate(&JoeyConfig::default(), Some(&reference()));
        server.join().unwrap_or_default();
        assert_eq!(
            result,
            Err(StudioError::ProviderCallFailed(format!(
                "Gemini request failed (429): {body}"
            )))
        );
        Ok(())
    }

    #[test]
    fn gemini_text_only_response_is_no_image_returned() -> anyhow::Result<()> {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"I can't draw that."}]}}]}"#;
        let (api_base, server) = serve_once("200 OK", body)?;
        let provider = keyed_provider(api_base)?;

        let result = provider.generate(&JoeyConfig::default(), None);
        server.join().unwrap_or_default();
        assert_eq!(result, Err(StudioError::NoImageReturned));
        Ok(())
    }

    #[test]
    fn payload_orders_parts_and_carries_aspect_ratio() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(offline_settings())?;
        let mut config = JoeyConfig::default();
        config.aspect_ratio = "3:4".to_string();
        let reference = ReferenceImage::from_base64("B".repeat(160), "image/jpeg");

        let payload = provider.build_payload(&config, Some(&reference));
        let parts = payload["contents"][0]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("B".repeat(160)));
        assert!(parts[1]["text"]
            .as_str()
            .unwrap_or_default()
            .contains("Action: 站立挥手."));
        assert_eq!(
            payload["generationConfig"]["imageConfig"]["aspectRatio"],
            json!("3:4")
        );
        Ok(())
    }

    #[test]
    fn payload_defaults_blank_ratio_and_skips_placeholder_reference() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(offline_settings())?;
        let mut config = JoeyConfig::default();
        config.aspect_ratio = String::new();
        let placeholder = ReferenceImage::from_base64(PLACEHOLDER_PNG_BASE64, "image/png");

        let payload = provider.build_payload(&config, Some(&placeholder));
        assert_eq!(payload["contents"][0]["parts"].as_array().map(Vec::len), Some(1));
        assert_eq!(
            payload["generationConfig"]["imageConfig"]["aspectRatio"],
            json!("1:1")
        );
        Ok(())
    }

    #[test]
    fn extract_first_image_scans_in_order() {
        let payload = json!({
            "candidates": [
                {"content": {"parts": [{"text": "here you go"}]}},
                {"content": {"parts": [
                    {"inlineData": {"mimeType": "image/png", "data": ""}},
                    {"inline_data": {"mime_type": "image/png", "data": "FIRST"}},
                    {"inlineData": {"mimeType": "image/png", "data": "SECOND"}},
                ]}},
            ]
        });
        assert_eq!(
            GeminiProvider::extract_first_image(&payload).as_deref(),
            Some("FIRST")
        );
    }

    #[test]
    fn extract_first_image_handles_text_only_and_empty_payloads() {
        let text_only = json!({
            "candidates": [{"content": {"parts": [{"text": "I can't draw that."}]}}]
        });
        assert!(GeminiProvider::extract_first_image(&text_only).is_none());
        assert!(GeminiProvider::extract_first_image(&json!({})).is_none());
        assert!(GeminiProvider::extract_first_image(&json!({"candidates": []})).is_none());
        assert!(GeminiProvider::extract_first_image(&Value::Null).is_none());
    }

    #[test]
    fn missing_api_key_is_a_provider_failure() -> anyhow::Result<()> {
        let provider = GeminiProvider::new(offline_settings())?;
        let result = provider.generate(&JoeyConfig::default(), None);
        assert_eq!(
            result,
            Err(StudioError::ProviderCallFailed(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string()
            ))
        );
        Ok(())
    }

    #[test]
    fn dryrun_echoes_reference_or_placeholder() {
        let config = JoeyConfig::default();
        let reference = ReferenceImage::from_base64("QUJD", "image/jpeg");
        assert_eq!(
            DryrunProvider.generate(&config, Some(&reference)),
            Ok("data:image/png;base64,QUJD".to_string())
        );
        assert_eq!(
            DryrunProvider.generate(&config, None),
            Ok(format!("data:image/png;base64,{PLACEHOLDER_PNG_BASE64}"))
        );
    }

    #[test]
    fn default_registry_lists_dryrun_and_gemini() -> anyhow::Result<()> {
        let mut registry = default_provider_registry(offline_settings())?;
        assert_eq!(registry.names(), vec!["dryrun".to_string(), "gemini".to_string()]);
        assert!(registry.get("gemini").is_some());
        let taken = registry.take("dryrun");
        assert_eq!(taken.as_ref().map(|p| p.name().to_string()).as_deref(), Some("dryrun"));
        assert!(registry.get("dryrun").is_none());
        Ok(())
    }
}
