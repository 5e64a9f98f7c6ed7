use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, FieldCommandSpec, FIELD_COMMANDS, INDEX_COMMANDS, NO_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};
use crate::config::ConfigField;

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    fn set_field(raw: &str, field: ConfigField, value: &str) -> Self {
        Self::new("set_field", raw)
            .with_arg("field", Value::String(field.key().to_string()))
            .with_arg("value", Value::String(value.to_string()))
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn find_field(command: &str, specs: &[FieldCommandSpec]) -> Option<ConfigField> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.field)
}

fn parse_single_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    let parts: Vec<String> = match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    parts.join(" ")
}

/// Parses a 1-based list position. Anything else becomes `null`.
fn parse_index_arg(arg: &str) -> Value {
    arg.trim()
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .map(|value| Value::Number(value.into()))
        .unwrap_or(Value::Null)
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return Intent::new("unknown", text)
            .with_arg("command", Value::Null)
            .with_arg("arg", Value::String(raw_trimmed.to_string()));
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return Intent::new("unknown", text)
            .with_arg("command", Value::Null)
            .with_arg("arg", Value::String(raw_trimmed.to_string()));
    }

    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(field) = find_field(&command, FIELD_COMMANDS) {
        return Intent::set_field(text, field, arg);
    }

    if command == "set" {
        let (name, value) = arg
            .split_once(char::is_whitespace)
            .map(|(name, value)| (name, value.trim()))
            .unwrap_or((arg, ""));
        return match name.parse::<ConfigField>() {
            Ok(field) => Intent::set_field(text, field, value),
            Err(_) => Intent::new("unknown", text)
                .with_arg("command", Value::String(command))
                .with_arg("arg", Value::String(arg.to_string())),
        };
    }

    if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
        return Intent::new(action, text)
            .with_arg("path", Value::String(parse_single_path_arg(arg)));
    }

    if let Some(action) = find_action(&command, INDEX_COMMANDS) {
        return Intent::new(action, text).with_arg("index", parse_index_arg(arg));
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return Intent::new(action, text);
    }

    Intent::new("unknown", text)
        .with_arg("command", Value::String(command))
        .with_arg("arg", Value::String(arg.to_string()))
}
