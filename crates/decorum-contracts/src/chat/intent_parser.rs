use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, DESIGN_FIELD_COMMANDS, ID_COMMANDS, ITEM_COMMAND, NO_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS, VIDEO_COMMAND, VIDEO_FIELD_COMMANDS,
};

/// One parsed line of shell input.
///
/// Field edits land in `settings_update` (keyed by the field name), every
/// other argument in `command_args`. Values are left as text; the caller
/// validates them against the typed design model.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub settings_update: BTreeMap<String, Value>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            settings_update: BTreeMap::new(),
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Splits `path rest of the line` where the path may be quoted.
fn parse_path_and_text(arg: &str) -> (String, String) {
    let trimmed = arg.trim();
    if let Some(quote) = trimmed.chars().next().filter(|ch| *ch == '"' || *ch == '\'') {
        let body = &trimmed[1..];
        if let Some(end) = body.find(quote) {
            return (body[..end].to_string(), body[end + 1..].trim().to_string());
        }
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((path, rest)) => (path.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let remainder = &slash_tail[command_len..];
            let arg = if remainder.is_empty() {
                ""
            } else {
                remainder.trim()
            };

            if let Some(field) = find_action(&command, DESIGN_FIELD_COMMANDS) {
                let mut intent = Intent::new("set_design", text);
                intent
                    .settings_update
                    .insert(field.to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(field) = find_action(&command, VIDEO_FIELD_COMMANDS) {
                let mut intent = Intent::new("set_video", text);
                intent
                    .settings_update
                    .insert(field.to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, ID_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("id".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == ITEM_COMMAND.command {
                let (path, instruction) = parse_path_and_text(arg);
                let mut intent = Intent::new(ITEM_COMMAND.action, text);
                intent
                    .command_args
                    .insert("path".to_string(), Value::String(path));
                intent
                    .command_args
                    .insert("instruction".to_string(), Value::String(instruction));
                return intent;
            }

            if command == VIDEO_COMMAND.command {
                let mut intent = Intent::new(VIDEO_COMMAND.action, text);
                if !arg.is_empty() {
                    intent.prompt = Some(arg.to_string());
                }
                return intent;
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}
