//! ANSI formatting for the startup banner

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";

/// Arrow color of a banner line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Yellow,
    /// Whole line greyed out
    Dim,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Dim => "\x1b[90m",
        }
    }
}

/// Cyan URL, clickable (OSC 8) on terminals that support hyperlinks
pub fn terminal_link(url: &str) -> String {
    format_link(
        url,
        supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout),
    )
}

fn format_link(url: &str, hyperlink: bool) -> String {
    let text = format!("{}{}{}", CYAN, url, RESET);
    if hyperlink {
        format!("\x1b]8;;{}\x07{}\x1b]8;;\x07", url, text)
    } else {
        text
    }
}

/// `  ➜  Label:   value` with the label left-aligned to `width`
pub fn arrow_line(tone: Tone, label: &str, value: &str, width: usize) -> String {
    match tone {
        Tone::Dim => format!("  {}➜  {:<width$} {}{}", tone.code(), label, value, RESET),
        _ => format!(
            "  {}➜{}  {}{:<width$}{} {}",
            tone.code(),
            RESET,
            BOLD,
            label,
            RESET,
            value
        ),
    }
}
