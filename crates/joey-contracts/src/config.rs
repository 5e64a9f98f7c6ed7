use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::presets::{ASPECT_RATIOS, PRESET_ACCESSORIES, PRESET_ACTIONS, PRESET_CLOTHING};

/// Generation parameters for one Joey illustration.
///
/// Every field is always present. Free-text fields may be empty: an empty
/// `scene` means a plain background and an empty `style_description` means
/// no extra modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoeyConfig {
    pub action: String,
    pub clothing: String,
    pub accessory: String,
    #[serde(default)]
    pub scene: String,
    #[serde(default)]
    pub style_description: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

impl Default for JoeyConfig {
    fn default() -> Self {
        Self {
            action: PRESET_ACTIONS[0].to_string(),
            clothing: PRESET_CLOTHING[0].to_string(),
            accessory: PRESET_ACCESSORIES[0].to_string(),
            scene: String::new(),
            style_description: String::new(),
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

fn default_aspect_ratio() -> String {
    ASPECT_RATIOS[0].value.to_string()
}

impl JoeyConfig {
    pub fn get(&self, field: ConfigField) -> &str {
        match field {
            ConfigField::Action => &self.action,
            ConfigField::Clothing => &self.clothing,
            ConfigField::Accessory => &self.accessory,
            ConfigField::Scene => &self.scene,
            ConfigField::StyleDescription => &self.style_description,
            ConfigField::AspectRatio => &self.aspect_ratio,
        }
    }

    pub fn set(&mut self, field: ConfigField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ConfigField::Action => self.action = value,
            ConfigField::Clothing => self.clothing = value,
            ConfigField::Accessory => self.accessory = value,
            ConfigField::Scene => self.scene = value,
            ConfigField::StyleDescription => self.style_description = value,
            ConfigField::AspectRatio => self.aspect_ratio = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Action,
    Clothing,
    Accessory,
    Scene,
    StyleDescription,
    AspectRatio,
}

impl ConfigField {
    pub const ALL: [ConfigField; 6] = [
        ConfigField::Action,
        ConfigField::Clothing,
        ConfigField::Accessory,
        ConfigField::Scene,
        ConfigField::StyleDescription,
        ConfigField::AspectRatio,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ConfigField::Action => "action",
            ConfigField::Clothing => "clothing",
            ConfigField::Accessory => "accessory",
            ConfigField::Scene => "scene",
            ConfigField::StyleDescription => "styleDescription",
            ConfigField::AspectRatio => "aspectRatio",
        }
    }

    /// Preset values offered for this field. Empty for pure free-text fields.
    pub fn suggestions(self) -> Vec<&'static str> {
        match self {
            ConfigField::Action => PRESET_ACTIONS.to_vec(),
            ConfigField::Clothing => PRESET_CLOTHING.to_vec(),
            ConfigField::Accessory => PRESET_ACCESSORIES.to_vec(),
            ConfigField::AspectRatio => ASPECT_RATIOS.iter().map(|option| option.value).collect(),
            ConfigField::Scene | ConfigField::StyleDescription => Vec::new(),
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ConfigField {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', '_'], "");
        let field = match normalized.as_str() {
            "action" | "pose" => ConfigField::Action,
            "clothing" | "clothes" | "outfit" => ConfigField::Clothing,
            "accessory" | "accessories" => ConfigField::Accessory,
            "scene" | "background" => ConfigField::Scene,
            "style" | "styledescription" => ConfigField::StyleDescription,
            "ratio" | "aspect" | "aspectratio" => ConfigField::AspectRatio,
            _ => return Err(format!("Unknown configuration field '{}'.", raw.trim())),
        };
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConfigField, JoeyConfig};

    #[test]
    fn default_uses_first_presets_and_empty_free_text() {
        let config = JoeyConfig::default();
        assert_eq!(config.action, "站立挥手");
        assert_eq!(config.clothing, "经典蓝色卫衣");
        assert_eq!(config.accessory, "无");
        assert_eq!(config.scene, "");
        assert_eq!(config.style_description, "");
        assert_eq!(config.aspect_ratio, "1:1");
    }

    #[test]
    fn set_accepts_values_outside_presets() {
        let mut config = JoeyConfig::default();
        config.set(ConfigField::Action, "在月球上放风筝");
        config.set(ConfigField::AspectRatio, "");
        assert_eq!(config.get(ConfigField::Action), "在月球上放风筝");
        assert_eq!(config.aspect_ratio, "");
    }

    #[test]
    fn field_names_parse_with_aliases() {
        assert_eq!("style".parse::<ConfigField>(), Ok(ConfigField::StyleDescription));
        assert_eq!("aspect_ratio".parse::<ConfigField>(), Ok(ConfigField::AspectRatio));
        assert_eq!("Background".parse::<ConfigField>(), Ok(ConfigField::Scene));
        assert!("mood".parse::<ConfigField>().is_err());
    }

    #[test]
    fn serializes_with_camel_case_keys() -> anyhow::Result<()> {
        let value = serde_json::to_value(JoeyConfig::default())?;
        assert_eq!(value["styleDescription"], json!(""));
        assert_eq!(value["aspectRatio"], json!("1:1"));

        let parsed: JoeyConfig = serde_json::from_value(json!({
            "action": "跳舞",
            "clothing": "睡衣",
            "accessory": "墨镜",
        }))?;
        assert_eq!(parsed.scene, "");
        assert_eq!(parsed.aspect_ratio, "1:1");
        Ok(())
    }

    #[test]
    fn free_text_fields_have_no_suggestions() {
        assert!(ConfigField::Scene.suggestions().is_empty());
        assert_eq!(ConfigField::AspectRatio.suggestions().len(), 5);
        assert_eq!(ConfigField::ALL.len(), 6);
    }
}
