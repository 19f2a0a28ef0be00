use colored::Colorize;
use stagetree::sink::{ConflictKind, EventKind, SinkEvent};
use supports_color::Stream;

/// Prints sink events one per line, colored when stdout supports it.
#[derive(Debug, Clone, Copy)]
pub struct EventPrinter {
    colored: bool,
}

impl EventPrinter {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn for_stdout() -> Self {
        Self::new(supports_color::on(Stream::Stdout).is_some())
    }

    pub fn format(&self, event: &SinkEvent) -> String {
        let (label, detail) = match event {
            SinkEvent::Create { path, content } => {
                ("CREATE", format!("{} ({} bytes)", path, content.len()))
            }
            SinkEvent::Update { path, content } => {
                ("UPDATE", format!("{} ({} bytes)", path, content.len()))
            }
            SinkEvent::Delete { path } => ("DELETE", path.to_string()),
            SinkEvent::Rename { from, to } => ("RENAME", format!("{} => {}", from, to)),
            SinkEvent::Error { path, description } => {
                let reason = match description {
                    ConflictKind::AlreadyExist => "already exists",
                    ConflictKind::DoesNotExist => "does not exist",
                };
                ("ERROR", format!("{} {}", path, reason))
            }
        };

        if !self.colored {
            return format!("{} {}", label, detail);
        }
        let label = match event.kind() {
            EventKind::Create => label.green(),
            EventKind::Update => label.cyan(),
            EventKind::Delete => label.yellow(),
            EventKind::Rename => label.blue(),
            EventKind::Error => label.red().bold(),
        };
        format!("{} {}", label, detail)
    }

    pub fn print(&self, event: &SinkEvent) {
        println!("{}", self.format(event));
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::*;
    use stagetree::path::TreePath;

    use super::*;

    fn path(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    #[rstest]
    #[case(
        SinkEvent::Create { path: path("/a.txt"), content: Bytes::from("hello") },
        "CREATE /a.txt (5 bytes)"
    )]
    #[case(
        SinkEvent::Update { path: path("/a.txt"), content: Bytes::new() },
        "UPDATE /a.txt (0 bytes)"
    )]
    #[case(SinkEvent::Delete { path: path("/old") }, "DELETE /old")]
    #[case(
        SinkEvent::Rename { from: path("/a"), to: path("/b/c") },
        "RENAME /a => /b/c"
    )]
    #[case(
        SinkEvent::Error { path: path("/x"), description: ConflictKind::DoesNotExist },
        "ERROR /x does not exist"
    )]
    fn formats_events(#[case] event: SinkEvent, #[case] expected: &str) {
        assert_eq!(EventPrinter::new(false).format(&event), expected);
    }
}
