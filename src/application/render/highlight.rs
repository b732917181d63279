//! Search keyword highlighting over rendered HTML.
//!
//! Keywords are applied one after another, each over the output of the
//! previous one. A match is skipped when a double quote appears later on the
//! same line, which keeps quoted phrase segments (and attribute values)
//! untouched. Because the inserted marker itself carries a quoted class
//! attribute, later keywords never match earlier on a line that already holds
//! a highlight.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

pub const DEFAULT_HIGHLIGHT_CLASS: &str = "highlighted";

const KEYWORD_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, Error)]
pub enum HighlightError {
    #[error("cannot build matcher for keyword `{keyword}`: {message}")]
    Matcher { keyword: String, message: String },
}

/// Wraps search keyword occurrences in `<em class="…">` markers.
#[derive(Debug, Clone)]
pub struct KeywordHighlighter {
    open_tag: String,
}

impl Default for KeywordHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_CLASS)
    }
}

impl KeywordHighlighter {
    pub fn new(class: &str) -> Self {
        Self {
            open_tag: format!("<em class=\"{}\">", escape_attribute(class)),
        }
    }

    pub fn highlight(&self, html: &str, query: &str) -> Result<String, HighlightError> {
        let mut output = html.to_string();
        for keyword in keywords(query) {
            let matcher = keyword_matcher(&keyword)?;
            output = self.wrap_matches(&output, &matcher);
        }
        Ok(output)
    }

    fn wrap_matches(&self, text: &str, matcher: &Regex) -> String {
        let mut output = String::with_capacity(text.len());
        let mut copied = 0;
        let mut search_from = 0;

        while let Some(found) = matcher.find_at(text, search_from) {
            if quote_follows_on_line(&text[found.end()..]) {
                // Retry from the next character, as a look-ahead rejection would.
                search_from = next_char_boundary(text, found.start());
                continue;
            }

            output.push_str(&text[copied..found.start()]);
            output.push_str(&self.open_tag);
            output.push_str(found.as_str());
            output.push_str("</em>");
            copied = found.end();
            search_from = found.end();
        }

        output.push_str(&text[copied..]);
        output
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn keywords(query: &str) -> Vec<String> {
    query
        .replace('"', "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn keyword_matcher(keyword: &str) -> Result<Regex, HighlightError> {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .size_limit(KEYWORD_SIZE_LIMIT)
        .build()
        .map_err(|err| HighlightError::Matcher {
            keyword: keyword.to_string(),
            message: err.to_string(),
        })
}

fn quote_follows_on_line(rest: &str) -> bool {
    for ch in rest.chars() {
        match ch {
            '"' => return true,
            '\n' | '\r' | '\u{2028}' | '\u{2029}' => return false,
            _ => {}
        }
    }
    false
}

fn next_char_boundary(text: &str, index: usize) -> usize {
    text[index..]
        .chars()
        .next()
        .map_or(text.len(), |ch| index + ch.len_utf8())
}
