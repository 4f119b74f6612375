//! Sanitisation of untrusted model text before it reaches the terminal.

use once_cell::sync::Lazy;
use regex::Regex;

// CSI sequences, OSC sequences (BEL or ST terminated), and bare two-byte escapes.
static ESCAPE_SEQUENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b[@-_]")
        .expect("escape sequence pattern is valid")
});

/// Strip terminal escape sequences and control characters other than
/// newline and tab.
pub fn sanitize_model_text(text: &str) -> String {
    ESCAPE_SEQUENCES
        .replace_all(text, "")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}
