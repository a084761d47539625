//! # Output Configuration
//!
//! Controls the appearance of CLI output: emoji-decorated progress lines
//! on capable terminals, plain ASCII tags otherwise. Respects `--color`
//! and the `NO_COLOR` convention (<https://no-color.org/>).

use std::env;

use console::Term;

/// Output appearance for a command invocation.
#[derive(Debug, Clone, Copy)]
pub struct OutputStyle {
    /// Whether emoji and color decorations are used.
    pub decorated: bool,
}

impl OutputStyle {
    /// Build from the global `--color` flag: `always`, `never`, or `auto`.
    ///
    /// In auto mode, decorations are off when `NO_COLOR` is set, when
    /// `TERM=dumb`, or when stdout is not a terminal.
    pub fn from_flag(color_flag: &str) -> Self {
        let decorated = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => {
                env::var_os("NO_COLOR").is_none()
                    && env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
                    && Term::stdout().is_term()
            }
        };
        OutputStyle { decorated }
    }

    /// Pick the emoji or its ASCII fallback.
    pub fn tag<'a>(&self, emoji: &'a str, ascii: &'a str) -> &'a str {
        if self.decorated {
            emoji
        } else {
            ascii
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_flags_override_detection() {
        assert!(OutputStyle::from_flag("always").decorated);
        assert!(!OutputStyle::from_flag("never").decorated);
        assert!(OutputStyle::from_flag("ALWAYS").decorated);
    }

    #[test]
    fn test_tag_selection() {
        let decorated = OutputStyle { decorated: true };
        let plain = OutputStyle { decorated: false };
        assert_eq!(decorated.tag("🚀", "[RUN]"), "🚀");
        assert_eq!(plain.tag("🚀", "[RUN]"), "[RUN]");
    }
}
