//! Display helpers shared by front ends
//!
//! Stateless formatting of core data: shortened addresses, content
//! previews, relative dates and the small markdown subset notes support.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::contract::Account;
use crate::view::ViewState;

/// Characters of content shown on a note card
pub const PREVIEW_LEN: usize = 150;

/// `0x1234...abcd` form of an account
pub fn short_address(account: &Account) -> String {
    let address = account.as_str();
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// First `max_len` characters of `content`, with `...` when cut
pub fn preview(content: &str, max_len: usize) -> String {
    match content.char_indices().nth(max_len) {
        None => content.to_string(),
        Some((cut, _)) => format!("{}...", &content[..cut]),
    }
}

/// Age of a note relative to `now`, e.g. `5m ago` or `Mar 3`
///
/// Older than a week shows the date, with the year only when it differs
/// from `now`'s. Dates are rendered in UTC.
pub fn relative_time(timestamp: i64, now: DateTime<Utc>) -> String {
    let elapsed = now.timestamp() - timestamp;
    let minutes = elapsed.div_euclid(60);
    let hours = elapsed.div_euclid(3600);
    let days = elapsed.div_euclid(86_400);

    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    if days < 7 {
        return format!("{}d ago", days);
    }

    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(date) if date.year() == now.year() => date.format("%b %-d").to_string(),
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => timestamp.to_string(),
    }
}

/// Full timestamp for a detail view
pub fn full_time(timestamp: i64) -> String {
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(date) => date.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => timestamp.to_string(),
    }
}

/// Heading shown when the visible list is empty
pub fn empty_state(view: &ViewState) -> &'static str {
    if view.is_searching() {
        "No notes found"
    } else {
        "No notes yet"
    }
}

struct MarkdownRules {
    h3: Regex,
    h2: Regex,
    h1: Regex,
    bold: Regex,
    italic: Regex,
    code: Regex,
}

fn rules() -> &'static MarkdownRules {
    static RULES: OnceLock<MarkdownRules> = OnceLock::new();
    RULES.get_or_init(|| MarkdownRules {
        h3: Regex::new(r"(?m)^### (.*)$").expect("valid regex"),
        h2: Regex::new(r"(?m)^## (.*)$").expect("valid regex"),
        h1: Regex::new(r"(?m)^# (.*)$").expect("valid regex"),
        bold: Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"),
        italic: Regex::new(r"\*(.*?)\*").expect("valid regex"),
        code: Regex::new(r"`([^`]+)`").expect("valid regex"),
    })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// HTML for the supported markdown subset
///
/// Headers (`#`, `##`, `###`), `**bold**`, `*italic*`, `` `code` `` and
/// line breaks. Everything else is escaped text.
pub fn render_markdown(text: &str) -> String {
    let rules = rules();
    let html = escape_html(text);
    let html = rules.h3.replace_all(&html, "<h3>$1</h3>");
    let html = rules.h2.replace_all(&html, "<h2>$1</h2>");
    let html = rules.h1.replace_all(&html, "<h1>$1</h1>");
    let html = rules.bold.replace_all(&html, "<strong>$1</strong>");
    let html = rules.italic.replace_all(&html, "<em>$1</em>");
    let html = rules.code.replace_all(&html, "<code>$1</code>");
    html.replace('\n', "<br />")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::SortKey;

    fn at(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).single().unwrap()
    }

    #[test]
    fn test_short_address() {
        let account = Account::new("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(short_address(&account), "0xf39F...2266");
        assert_eq!(short_address(&Account::new("0xabc")), "0xabc");
    }

    #[test]
    fn test_preview_cuts_on_characters() {
        assert_eq!(preview("short", 150), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview(&"x".repeat(150), 150), "x".repeat(150));
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = at(1_700_000_000);
        assert_eq!(relative_time(1_700_000_000 - 30, now), "Just now");
        assert_eq!(relative_time(1_700_000_000 + 120, now), "Just now");
        assert_eq!(relative_time(1_700_000_000 - 5 * 60, now), "5m ago");
        assert_eq!(relative_time(1_700_000_000 - 3 * 3600, now), "3h ago");
        assert_eq!(relative_time(1_700_000_000 - 2 * 86_400, now), "2d ago");
    }

    #[test]
    fn test_relative_time_dates() {
        // 2023-11-14T22:13:20Z
        let now = at(1_700_000_000);
        // 2023-11-01T00:00:00Z
        assert_eq!(relative_time(1_698_796_800, now), "Nov 1");
        // 2022-03-05T00:00:00Z
        assert_eq!(relative_time(1_646_438_400, now), "Mar 5, 2022");
    }

    #[test]
    fn test_full_time() {
        assert_eq!(full_time(1_000), "1970-01-01 00:16:40 UTC");
    }

    #[test]
    fn test_empty_state() {
        assert_eq!(empty_state(&ViewState::default()), "No notes yet");
        assert_eq!(
            empty_state(&ViewState::new("x", SortKey::Newest)),
            "No notes found"
        );
    }

    #[test]
    fn test_render_markdown_subset() {
        let html = render_markdown("# Title\n## Sub\n**b** and *i* with `c`");
        assert_eq!(
            html,
            "<h1>Title</h1><br /><h2>Sub</h2><br /><strong>b</strong> and <em>i</em> with <code>c</code>"
        );
    }

    #[test]
    fn test_render_markdown_escapes_html() {
        assert_eq!(
            render_markdown("<script>alert(\"x\")</script> & more"),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; more"
        );
    }
}
