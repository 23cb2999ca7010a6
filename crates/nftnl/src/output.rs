//! Output format selection and command framing.
//!
//! Every render entry point threads a [`Format`] through; ruleset-level
//! rendering additionally wraps each object in a command header/footer pair
//! produced here.

/// Output and document format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Plain text.
    #[default]
    Text,
    /// XML markup.
    Xml,
    /// JSON markup.
    Json,
}

/// Operation a rendered or parsed object is subject to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// No operation; header/footer rendering emits nothing.
    #[default]
    Unspec,
    Add,
    Insert,
    Delete,
    Replace,
}

impl Command {
    /// Markup tag for this command.
    pub fn tag(self) -> &'static str {
        match self {
            Command::Unspec => "unspec",
            Command::Add => "add",
            Command::Insert => "insert",
            Command::Delete => "delete",
            Command::Replace => "replace",
        }
    }

    /// Parse a markup tag back into a command.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "add" => Some(Command::Add),
            "insert" => Some(Command::Insert),
            "delete" => Some(Command::Delete),
            "replace" => Some(Command::Replace),
            _ => None,
        }
    }
}

/// Opening marker written before an object's body.
///
/// Markup formats open a container keyed by the command tag; plain text uses
/// a fixed-width command tag. An unspecified command emits nothing at all.
pub fn cmd_header(cmd: Command, format: Format) -> String {
    if cmd == Command::Unspec {
        return String::new();
    }
    match format {
        Format::Xml => format!("<{}>", cmd.tag()),
        Format::Json => format!("{{\"{}\":[", cmd.tag()),
        Format::Text => match cmd {
            Command::Add => "   [ADD] ".into(),
            Command::Delete => "[DELETE] ".into(),
            _ => "[unknown] ".into(),
        },
    }
}

/// Closing marker matching [`cmd_header`]. Plain text has none.
pub fn cmd_footer(cmd: Command, format: Format) -> String {
    if cmd == Command::Unspec {
        return String::new();
    }
    match format {
        Format::Xml => format!("</{}>", cmd.tag()),
        Format::Json => "]}".into(),
        Format::Text => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_tags_are_fixed_width() {
        assert_eq!(cmd_header(Command::Add, Format::Text), "   [ADD] ");
        assert_eq!(cmd_header(Command::Delete, Format::Text), "[DELETE] ");
        assert_eq!(cmd_header(Command::Insert, Format::Text), "[unknown] ");
        assert_eq!(cmd_footer(Command::Add, Format::Text), "");
    }

    #[test]
    fn markup_markers_match() {
        assert_eq!(cmd_header(Command::Add, Format::Xml), "<add>");
        assert_eq!(cmd_footer(Command::Add, Format::Xml), "</add>");
        assert_eq!(cmd_header(Command::Delete, Format::Json), "{\"delete\":[");
        assert_eq!(cmd_footer(Command::Delete, Format::Json), "]}");
    }

    #[test]
    fn unspec_emits_nothing() {
        for format in [Format::Text, Format::Xml, Format::Json] {
            assert_eq!(cmd_header(Command::Unspec, format), "");
            assert_eq!(cmd_footer(Command::Unspec, format), "");
        }
    }
}
