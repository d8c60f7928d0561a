use regex::Regex;
use serde_json::Value;

use crate::config::SanitizeConfig;

/// Recursive input sanitizer for JSON payloads
///
/// Strings are trimmed, stripped of script blocks, `javascript:` URI
/// prefixes and inline event-handler attributes, then truncated to the
/// configured length. Objects and arrays are cleaned element by element,
/// keys untouched; numbers, booleans and null pass through.
///
/// This is a mitigation layer, not an HTML sanitizer. Output rendered as
/// raw HTML elsewhere still needs escaping at the render site.
#[derive(Debug)]
pub struct Sanitizer {
    script_blocks: Regex,
    js_scheme: Regex,
    event_handlers: Regex,
    max_field_len: usize,
}

impl Sanitizer {
    pub fn new(cfg: &SanitizeConfig) -> Self {
        Self {
            // (?is): case-insensitive, dot matches newline; non-greedy body
            script_blocks: Regex::new(r"(?is)<script[^>]*>.*?</script>")
                .expect("static pattern is valid"),
            js_scheme: Regex::new(r"(?i)javascript:").expect("static pattern is valid"),
            event_handlers: Regex::new(r"(?i)\bon\w+\s*=").expect("static pattern is valid"),
            max_field_len: cfg.max_field_len,
        }
    }

    /// Clean a JSON value, recursing through objects and arrays
    pub fn clean(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.clean_text(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.clean(v)).collect())
            }
            Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, self.clean(v))).collect())
            }
            other => other,
        }
    }

    /// Clean one string field.
    ///
    /// Stripping runs to a fixpoint: removing one payload can splice the
    /// surrounding text into a new one (`<scr<script>..</script>ipt>`),
    /// so a single pass is not idempotent but the loop is.
    pub fn clean_text(&self, raw: &str) -> String {
        let mut cleaned = raw.trim().to_string();

        loop {
            // re-trim per pass: stripping can expose whitespace at the edges
            let pass = self.strip_once(&cleaned).trim().to_string();
            if pass == cleaned {
                break;
            }
            cleaned = pass;
        }

        // truncation is the last step; a cap landing on whitespace still
        // yields exactly max_field_len characters
        if cleaned.chars().count() > self.max_field_len {
            cleaned = cleaned.chars().take(self.max_field_len).collect();
        }

        cleaned
    }

    fn strip_once(&self, s: &str) -> String {
        let s = self.script_blocks.replace_all(s, "");
        let s = self.js_scheme.replace_all(&s, "");
        let s = self.event_handlers.replace_all(&s, "");
        s.into_owned()
    }
}
