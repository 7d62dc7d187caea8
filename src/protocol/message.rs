use crate::protocol::command::Command;

/// One complete record received from the helper daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    raw: String,
    lines: Vec<String>,
    command: Option<Command>,
}

impl InboundMessage {
    /// Split a record into its non-empty lines and recognize the command
    /// keyword at the very start of the record.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        // A record with a leading newline names no command
        let command = raw.split('\n').next().and_then(Command::parse);
        let lines: Vec<String> = raw
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            raw,
            lines,
            command,
        }
    }

    pub fn command(&self) -> Option<Command> {
        self.command
    }

    /// Argument line `index`, counting the keyword line as 0
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// First raw line for log output
    pub fn keyword_line(&self) -> &str {
        self.raw.split('\n').next().unwrap_or("")
    }
}
