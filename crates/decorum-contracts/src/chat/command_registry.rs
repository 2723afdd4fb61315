#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands that write one field of the design form; `action` is the field.
pub(crate) const DESIGN_FIELD_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "room",
        action: "room_type",
    },
    CommandSpec {
        command: "style",
        action: "style",
    },
    CommandSpec {
        command: "budget",
        action: "budget",
    },
    CommandSpec {
        command: "mood",
        action: "mood",
    },
    CommandSpec {
        command: "instructions",
        action: "instructions",
    },
    CommandSpec {
        command: "lock",
        action: "locked_elements",
    },
];

/// Commands that write one field of the video parameters.
pub(crate) const VIDEO_FIELD_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "motion",
        action: "motion_intensity",
    },
    CommandSpec {
        command: "resolution",
        action: "resolution",
    },
    CommandSpec {
        command: "aspect",
        action: "aspect_ratio",
    },
    CommandSpec {
        command: "video_style",
        action: "style",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "inspiration",
        action: "set_inspiration",
    },
    CommandSpec {
        command: "transcribe",
        action: "transcribe",
    },
    CommandSpec {
        command: "new",
        action: "new_project",
    },
];

pub(crate) const ID_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "select",
        action: "select",
    },
    CommandSpec {
        command: "delete",
        action: "delete",
    },
    CommandSpec {
        command: "regenerate",
        action: "regenerate",
    },
    CommandSpec {
        command: "diff",
        action: "diff",
    },
    CommandSpec {
        command: "export",
        action: "export",
    },
    CommandSpec {
        command: "unitem",
        action: "remove_item",
    },
    CommandSpec {
        command: "unvideo",
        action: "remove_video",
    },
    CommandSpec {
        command: "export_video",
        action: "export_video",
    },
    CommandSpec {
        command: "preset",
        action: "toggle_preset",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "undo",
        action: "undo",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "videos",
        action: "videos",
    },
    CommandSpec {
        command: "design",
        action: "show_design",
    },
    CommandSpec {
        command: "cancel",
        action: "cancel_video",
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

pub(crate) const ITEM_COMMAND: CommandSpec = CommandSpec {
    command: "item",
    action: "add_item",
};

pub(crate) const VIDEO_COMMAND: CommandSpec = CommandSpec {
    command: "video",
    action: "generate_video",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/room",
    "/style",
    "/budget",
    "/mood",
    "/instructions",
    "/lock",
    "/preset",
    "/inspiration",
    "/item",
    "/unitem",
    "/design",
    "/generate",
    "/regenerate",
    "/history",
    "/select",
    "/undo",
    "/delete",
    "/diff",
    "/export",
    "/video",
    "/motion",
    "/resolution",
    "/aspect",
    "/video_style",
    "/videos",
    "/unvideo",
    "/cancel",
    "/export_video",
    "/transcribe",
    "/new",
    "/help",
    "/quit",
];
