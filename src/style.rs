//! ANSI terminal color styling for diagnostics.
//!
//! Simple escape-code wrappers used by the diagnostic renderers. All colors
//! reset at the end of the styled fragment. Styling is disabled when the
//! `NO_COLOR` environment variable is set.

/// ANSI escape code styling utilities.
pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const BLUE: &'static str = "\x1b[34m";
    pub const CYAN: &'static str = "\x1b[36m";

    fn enabled() -> bool {
        std::env::var_os("NO_COLOR").is_none()
    }

    fn wrap(code: &str, s: &str) -> String {
        if Self::enabled() {
            format!("{}{}{}", code, s, Self::RESET)
        } else {
            s.to_string()
        }
    }

    pub fn red(s: &str) -> String {
        Self::wrap(Self::RED, s)
    }

    pub fn blue(s: &str) -> String {
        Self::wrap(Self::BLUE, s)
    }

    pub fn cyan(s: &str) -> String {
        Self::wrap(Self::CYAN, s)
    }

    pub fn yellow(s: &str) -> String {
        Self::wrap(Self::YELLOW, s)
    }

    pub fn green(s: &str) -> String {
        Self::wrap(Self::GREEN, s)
    }

    pub fn bold(s: &str) -> String {
        Self::wrap(Self::BOLD, s)
    }

    pub fn bold_red(s: &str) -> String {
        if Self::enabled() {
            format!("{}{}{}{}", Self::BOLD, Self::RED, s, Self::RESET)
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_wraps_string() {
        let result = Style::red("error");
        assert!(result.contains("error"));
    }

    #[test]
    fn bold_red_keeps_content() {
        let result = Style::bold_red("Error");
        assert!(result.contains("Error"));
    }
}
