use joey_contracts::config::JoeyConfig;
use joey_contracts::presets::JOEY_STYLE_PROMPT;
use serde_json::{json, Value};

use crate::media::ReferenceImage;

/// Encoded payloads at or below this length are treated as placeholders and
/// never attached to a request.
pub const REFERENCE_MIN_ENCODED_LEN: usize = 100;

pub const DEFAULT_SCENE: &str = "Simple solid light colored background";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

pub fn build_prompt(config: &JoeyConfig) -> String {
    let style = non_empty(&config.style_description).unwrap_or("None");
    let scene = non_empty(&config.scene).unwrap_or(DEFAULT_SCENE);
    [
        "Generate a new illustration of the character Joey.".to_string(),
        "Character Identity: Joey the Schnauzer dog.".to_string(),
        format!("Base Style: {JOEY_STYLE_PROMPT}."),
        format!("Additional Style Details: {style}."),
        format!("Action: {}.", config.action),
        format!("Clothing: {}.", config.clothing),
        format!("Accessory: {}.", config.accessory),
        format!("Scene: {scene}."),
        "Maintain high consistency with the character's facial features and proportions from the reference image.".to_string(),
        "Ensure thick, clean black outlines and vibrant flat colors.".to_string(),
    ]
    .join("\n")
}

pub(crate) fn reference_is_attachable(reference: Option<&ReferenceImage>) -> bool {
    reference
        .map(|image| image.data.len() > REFERENCE_MIN_ENCODED_LEN)
        .unwrap_or(false)
}

/// Ordered request parts: the reference image (when attachable) first, then
/// the text instruction.
pub(crate) fn build_parts(config: &JoeyConfig, reference: Option<&ReferenceImage>) -> Vec<Value> {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = reference.filter(|image| reference_is_attachable(Some(*image))) {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.data,
            }
        }));
    }
    parts.push(json!({ "text": build_prompt(config) }));
    parts
}

pub(crate) fn request_aspect_ratio(config: &JoeyConfig) -> String {
    non_empty(&config.aspect_ratio)
        .unwrap_or(DEFAULT_ASPECT_RATIO)
        .to_string()
}

/// Only an empty string counts as unset; whitespace is sent as typed.
fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
