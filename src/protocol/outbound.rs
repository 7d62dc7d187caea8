use crate::config::InputMethodInfo;
use crate::error::{BridgeError, Result};

const CHARSET_LINE: &str = "charset=UTF-8";

/// A message the bridge sends to the helper daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Every catalog entry, with `selected` marking the focused session's
    /// active input method
    ImList {
        entries: Vec<InputMethodInfo>,
        selected: Option<String>,
    },
    /// Raw property list payload from a session
    PropListUpdate(String),
    /// Raw property label payload from a session
    PropLabelUpdate(String),
    FocusIn,
    FocusOut,
    Raw { command: String, args: Vec<String> },
}

impl OutboundMessage {
    pub fn im_list(entries: Vec<InputMethodInfo>, selected: Option<&str>) -> Self {
        OutboundMessage::ImList {
            entries,
            selected: selected.map(str::to_string),
        }
    }

    /// Build an arbitrary message; every part has to stay on one line and
    /// the keyword must not be empty.
    pub fn raw(command: &str, args: &[String]) -> Result<Self> {
        if command.trim().is_empty() {
            return Err(BridgeError::ProtocolError(
                "Command keyword must not be empty".to_string(),
            ));
        }

        if let Some(part) = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .find(|part| part.contains('\n') || part.is_empty())
        {
            return Err(BridgeError::ProtocolError(format!(
                "Message lines must be non-empty and single-line: {part:?}"
            )));
        }

        Ok(OutboundMessage::Raw {
            command: command.to_string(),
            args: args.to_vec(),
        })
    }

    pub fn command(&self) -> &str {
        match self {
            OutboundMessage::ImList { .. } => "im_list",
            OutboundMessage::PropListUpdate(_) => "prop_list_update",
            OutboundMessage::PropLabelUpdate(_) => "prop_label_update",
            OutboundMessage::FocusIn => "focus_in",
            OutboundMessage::FocusOut => "focus_out",
            OutboundMessage::Raw { command, .. } => command,
        }
    }

    /// Message body without the record terminator
    pub fn encode(&self) -> String {
        let mut body = format!("{}\n", self.command());

        match self {
            OutboundMessage::ImList { entries, selected } => {
                body.push_str(CHARSET_LINE);
                body.push('\n');
                for entry in entries {
                    body.push_str(&format!(
                        "{}\t{}\t{}\t",
                        entry.name, entry.language, entry.description
                    ));
                    if selected.as_deref() == Some(entry.name.as_str()) {
                        body.push_str("selected");
                    }
                    body.push('\n');
                }
            }
            OutboundMessage::PropListUpdate(payload) | OutboundMessage::PropLabelUpdate(payload) => {
                body.push_str(CHARSET_LINE);
                body.push('\n');
                body.push_str(payload);
            }
            OutboundMessage::FocusIn | OutboundMessage::FocusOut => {}
            OutboundMessage::Raw { args, .. } => {
                for arg in args {
                    body.push_str(arg);
                    body.push('\n');
                }
            }
        }

        body
    }
}
