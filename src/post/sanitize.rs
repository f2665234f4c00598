//! Post text cleanup.
//!
//! Output files hold one post per line, so line breaks inside a post are
//! written as the two characters `\n`.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Line break as it appears inside a one-line post.
pub const ESCAPED_NEWLINE: &str = "\\n";

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w/:%#$&?()~.=+\-]+").expect("Invalid regex")
});

// Whitespace (including the ideographic space) in front of a hashtag.
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[ \t\u{3000}]*#").expect("Invalid regex"));

/// Remove every http(s) URL and trim the result.
pub fn strip_urls(text: &str) -> String {
    URL_RE.replace_all(text, "").trim().to_string()
}

/// Replace real line breaks with `\n`.
pub fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', ESCAPED_NEWLINE)
}

/// Put each hashtag on its own (escaped) line.
///
/// `Nice find ☕ #coffee #beans` becomes `Nice find ☕\n#coffee\n#beans`.
/// A hashtag at the very start, or already after `\n`, is left alone.
pub fn hashtags_on_own_line(text: &str) -> String {
    if !text.contains('#') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;

    for m in HASHTAG_RE.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        if !out.is_empty() && !out.ends_with(ESCAPED_NEWLINE) {
            out.push_str(ESCAPED_NEWLINE);
        }
        out.push('#');
        last = m.end();
    }
    out.push_str(&text[last..]);

    out
}
