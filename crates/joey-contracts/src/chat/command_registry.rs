use crate::config::ConfigField;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct FieldCommandSpec {
    pub command: &'static str,
    pub field: ConfigField,
}

pub(crate) const FIELD_COMMANDS: &[FieldCommandSpec] = &[
    FieldCommandSpec {
        command: "action",
        field: ConfigField::Action,
    },
    FieldCommandSpec {
        command: "clothing",
        field: ConfigField::Clothing,
    },
    FieldCommandSpec {
        command: "accessory",
        field: ConfigField::Accessory,
    },
    FieldCommandSpec {
        command: "scene",
        field: ConfigField::Scene,
    },
    FieldCommandSpec {
        command: "style",
        field: ConfigField::StyleDescription,
    },
    FieldCommandSpec {
        command: "ratio",
        field: ConfigField::AspectRatio,
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "upload",
    action: "upload_reference",
}];

pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "select",
        action: "select_history",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "show",
        action: "show",
    },
    CommandSpec {
        command: "presets",
        action: "presets",
    },
    CommandSpec {
        command: "dismiss",
        action: "dismiss_error",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/action",
    "/clothing",
    "/accessory",
    "/scene",
    "/style",
    "/ratio",
    "/set",
    "/upload",
    "/generate",
    "/history",
    "/select",
    "/download",
    "/show",
    "/presets",
    "/dismiss",
    "/help",
    "/quit",
];
