//! Shell quoting and output scrubbing

use once_cell::sync::Lazy;
use regex::Regex;

/// CSI sequences (colors, cursor movement) and OSC sequences (titles).
static ANSI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07]*\x07)").expect("valid ANSI pattern")
});

/// Quote a string for a POSIX shell: wrap in single quotes, with embedded
/// single quotes escaped as `'\''`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Remove ANSI escape sequences from command output.
pub fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("ls -la"), "'ls -la'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_shell_quote_single_quote() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_shell_quote_multiple_quotes() {
        assert_eq!(shell_quote("a'b'c"), "'a'\\''b'\\''c'");
    }

    #[test]
    fn test_shell_quote_metacharacters_inert() {
        assert_eq!(shell_quote("$HOME; rm -rf *"), "'$HOME; rm -rf *'");
    }

    #[test]
    fn test_strip_ansi_colors() {
        assert_eq!(
            strip_ansi("\x1b[32mgreen\x1b[0m and \x1b[1;31mred\x1b[0m"),
            "green and red"
        );
    }

    #[test]
    fn test_strip_ansi_cursor_and_clear() {
        assert_eq!(strip_ansi("\x1b[2J\x1b[1;1Hprompt"), "prompt");
    }

    #[test]
    fn test_strip_ansi_osc_title() {
        assert_eq!(strip_ansi("\x1b]0;window title\x07body"), "body");
    }

    #[test]
    fn test_strip_ansi_plain_passthrough() {
        assert_eq!(strip_ansi("no escapes here"), "no escapes here");
    }
}
