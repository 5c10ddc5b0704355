//! CLI command implementations.

pub mod cleanup;
pub mod comments;
pub mod resync;
pub mod search;
pub mod status;
pub mod sync;
pub mod watch;

use chrono::{DateTime, Utc};

/// Render an optional timestamp for humans.
pub fn format_time(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}

/// First line of `text`, cut to `max` characters.
pub fn snippet(text: &str, max: usize) -> String {
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_time_renders_never() {
        assert_eq!(format_time(None), "never");
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_time(Some(at)), "2024-01-02 03:04:05 UTC");
    }

    #[test]
    fn snippet_skips_blank_lines_and_truncates() {
        assert_eq!(snippet("\n\n  hello world\nmore", 80), "hello world");
        assert_eq!(snippet("abcdefghij", 8), "abcde...");
        assert_eq!(snippet("", 8), "");
        assert_eq!(snippet("héllo wörld", 8), "héllo...");
    }
}
