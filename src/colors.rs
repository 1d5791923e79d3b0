//! Color utilities for request log lines.

use axum::http::StatusCode;
use owo_colors::{AnsiColors, DynColors, OwoColorize, Style};

/// Distinct ANSI colors used for request IDs.
const ID_COLORS: [AnsiColors; 12] = [
    AnsiColors::Red,
    AnsiColors::Green,
    AnsiColors::Yellow,
    AnsiColors::Blue,
    AnsiColors::Magenta,
    AnsiColors::Cyan,
    AnsiColors::BrightRed,
    AnsiColors::BrightGreen,
    AnsiColors::BrightYellow,
    AnsiColors::BrightBlue,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightCyan,
];

/// Deterministically maps a request ID to one of the palette colors, so both
/// log lines of a request share a color.
fn color_for_id(id: &str) -> AnsiColors {
    let hash = id
        .chars()
        .fold(0u32, |acc, c| acc.wrapping_mul(31).wrapping_add(c as u32));
    ID_COLORS[hash as usize % ID_COLORS.len()]
}

/// Formats a request ID as `[id]` with its color.
pub fn colored_id(id: &str) -> String {
    let style = Style::new().color(DynColors::Ansi(color_for_id(id)));
    format!("[{id}]").style(style).to_string()
}

/// Formats a response status colored by class.
pub fn colored_status(status: StatusCode) -> String {
    let color = if status.is_server_error() {
        AnsiColors::Red
    } else if status.is_client_error() {
        AnsiColors::Yellow
    } else if status.is_redirection() {
        AnsiColors::Cyan
    } else {
        AnsiColors::Green
    };
    status.as_u16().color(color).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_id_same_color() {
        assert_eq!(colored_id("abc12"), colored_id("abc12"));
        assert!(colored_id("abc12").contains("[abc12]"));
    }

    #[test]
    fn status_keeps_code() {
        assert!(colored_status(StatusCode::NOT_FOUND).contains("404"));
    }
}
