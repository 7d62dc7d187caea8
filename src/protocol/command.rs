use std::fmt;

/// Which routing tier a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Only acted upon while a session is focused and routing to it is enabled
    FocusedOnly,
    /// Acted upon regardless of focus state
    Always,
}

/// Inbound commands understood by the bridge.
///
/// Recognition is a prefix match of the message's first line against the
/// literal keywords; when several literals prefix the line the longest one
/// wins, so `im_change_this_text_area_only` is never mistaken for a shorter
/// keyword that happens to share its beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PropListGet,
    PropLabelGet,
    PropActivate,
    ImListGet,
    CommitString,
    FocusIn,
    ImChangeThisTextAreaOnly,
    ImChangeWholeDesktop,
    ImChangeThisApplicationOnly,
    PropUpdateCustom,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::PropListGet,
        Command::PropLabelGet,
        Command::PropActivate,
        Command::ImListGet,
        Command::CommitString,
        Command::FocusIn,
        Command::ImChangeThisTextAreaOnly,
        Command::ImChangeWholeDesktop,
        Command::ImChangeThisApplicationOnly,
        Command::PropUpdateCustom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::PropListGet => "prop_list_get",
            Command::PropLabelGet => "prop_label_get",
            Command::PropActivate => "prop_activate",
            Command::ImListGet => "im_list_get",
            Command::CommitString => "commit_string",
            Command::FocusIn => "focus_in",
            Command::ImChangeThisTextAreaOnly => "im_change_this_text_area_only",
            Command::ImChangeWholeDesktop => "im_change_whole_desktop",
            Command::ImChangeThisApplicationOnly => "im_change_this_application_only",
            Command::PropUpdateCustom => "prop_update_custom",
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            Command::PropListGet
            | Command::PropLabelGet
            | Command::PropActivate
            | Command::ImListGet
            | Command::CommitString
            | Command::FocusIn => Tier::FocusedOnly,
            Command::ImChangeThisTextAreaOnly
            | Command::ImChangeWholeDesktop
            | Command::ImChangeThisApplicationOnly
            | Command::PropUpdateCustom => Tier::Always,
        }
    }

    /// Recognize the command keyword at the start of `line`
    pub fn parse(line: &str) -> Option<Command> {
        Self::ALL
            .into_iter()
            .filter(|command| line.starts_with(command.as_str()))
            .max_by_key(|command| command.as_str().len())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
